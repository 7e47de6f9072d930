use std::cell::RefCell;
use std::rc::Rc;

use cim_axiom::{
    listener, AxiomError, ClassRegistry, Context, Export, Import, Method, Model, Property,
    PropertyType, Topic, Value, PROPERTY_CHANGE,
};
use pretty_assertions::assert_eq;

fn bank() -> (ClassRegistry, Context) {
    let registry = ClassRegistry::new();
    registry
        .build(
            Model::new("demo.bank.Account")
                .property(Property::typed("owner", PropertyType::String).required(true))
                .property(Property::typed("balance", PropertyType::Float))
                .property(("interestRate", 0.008))
                .topic(Topic::new("audit"))
                .method(Method::new("deposit", |obj, args, _| {
                    let amount = args.first().and_then(Value::as_f64).unwrap_or(0.0);
                    if amount <= 0.0 {
                        return Err(AxiomError::AssertionFailed("deposit must be positive".into()));
                    }
                    let balance = obj.get("balance")?.as_f64().unwrap_or(0.0) + amount;
                    obj.set("balance", balance)?;
                    obj.topic("audit")?.publish(vec![Value::from("deposit"), Value::from(amount)])?;
                    Ok(Value::from(balance))
                }))
                .method(Method::new("accrue", |obj, _, _| {
                    let balance = obj.get("balance")?.as_f64().unwrap_or(0.0);
                    let rate = obj.get("interestRate")?.as_f64().unwrap_or(0.0);
                    let interest = balance * rate;
                    obj.set("balance", balance + interest)?;
                    Ok(Value::from(interest))
                })),
        )
        .unwrap();
    registry
        .build(
            Model::new("demo.bank.SavingsAccount")
                .extends("demo.bank.Account")
                .property(("interestRate", 0.012)),
        )
        .unwrap();
    let ctx = Context::new(registry.clone());
    (registry, ctx)
}

#[test]
fn savings_account_overrides_only_the_rate() {
    let (registry, ctx) = bank();
    let savings = registry.require("demo.bank.SavingsAccount").unwrap();
    let account = registry.require("demo.bank.Account").unwrap();

    let obj = savings.create_in(Vec::<(&str, Value)>::new(), &ctx).unwrap();

    assert_eq!(obj.get("interestRate").unwrap(), Value::from(0.012));
    assert!(savings.is_sub_class(&account));
    assert!(account.is_instance(&obj));
    assert!(!savings.has_own_axiom("owner"));

    // inherited pipeline: typed String coercion and the required check
    assert!(matches!(obj.set("owner", ""), Err(AxiomError::RequiredProperty { .. })));
    obj.set("owner", 42).unwrap();
    assert_eq!(obj.get("owner").unwrap(), Value::from("42"));
}

#[test]
fn deposit_then_accrue_uses_the_subclass_rate() {
    let (registry, ctx) = bank();
    let savings = registry.require("demo.bank.SavingsAccount").unwrap();
    let obj = savings.create_in([("owner", "ada")], &ctx).unwrap();

    let audit = Rc::new(RefCell::new(Vec::new()));
    let log = audit.clone();
    obj.on_detach(obj.topic("audit").unwrap().sub(listener(move |_, event| {
        log.borrow_mut().push(event.arg(0).to_string());
        Ok(())
    })));

    assert_eq!(obj.call("deposit", &[Value::from(1000.0)]).unwrap(), Value::from(1000.0));
    let interest = obj.call("accrue", &[]).unwrap().as_f64().unwrap();

    assert!((interest - 12.0).abs() < 1e-9);
    assert!((obj.get("balance").unwrap().as_f64().unwrap() - 1012.0).abs() < 1e-9);
    assert_eq!(*audit.borrow(), vec!["deposit".to_string()]);
    assert!(obj.call("deposit", &[Value::from(-5.0)]).is_err());
}

#[test]
fn balance_changes_are_observable() {
    let (registry, ctx) = bank();
    let account = registry.require("demo.bank.Account").unwrap();
    let obj = account.create_in([("owner", "bob")], &ctx).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    obj.on_detach(obj.sub(
        &[PROPERTY_CHANGE],
        listener(move |_, event| {
            sink.borrow_mut().push(event.topic_str());
            Ok(())
        }),
    ));

    obj.call("deposit", &[Value::from(10.0)]).unwrap();
    obj.set("owner", "carol").unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![
            "propertyChange.balance".to_string(),
            "propertyChange.owner".to_string(),
        ]
    );
}

#[test]
fn copies_compare_equal_until_they_diverge() {
    let (registry, ctx) = bank();
    let account = registry.require("demo.bank.Account").unwrap();
    let original = account
        .create_in([("owner", Value::from("dee")), ("balance", Value::from(5.0))], &ctx)
        .unwrap();

    let copy = original.clone_obj().unwrap();
    assert!(original.equals(&copy));
    assert!(!original.ptr_eq(&copy));

    copy.set("balance", 7.5).unwrap();
    assert!(!original.equals(&copy));
    let diff = original.diff(&copy).unwrap();
    assert_eq!(diff.get("balance"), Some(&Value::from(7.5)));
    assert_eq!(diff.len(), 1);

    assert_eq!(
        original.to_json(),
        serde_json::json!({"class": "demo.bank.Account", "owner": "dee", "balance": 5.0})
    );
}

#[test]
fn children_import_what_the_owner_exports() {
    let (registry, ctx) = bank();
    let teller = registry
        .build(
            Model::new("demo.bank.Teller")
                .import(Import::new("branch"))
                .import(Import::aliased("bank", "bankName").optional())
                .property("name"),
        )
        .unwrap();
    let branch = registry
        .build(
            Model::new("demo.bank.Branch")
                .property("code")
                .export(Export::aliased("code", "branch")),
        )
        .unwrap();

    let office = branch.create_in([("code", "NYC-1")], &ctx).unwrap();
    let clerk = teller.create_child([("name", "eve")], &office).unwrap();

    assert_eq!(clerk.import("branch").unwrap(), Value::from("NYC-1"));
    assert!(clerk.import("bank").unwrap().is_undefined());

    office.set("code", "NYC-2").unwrap();
    assert_eq!(clerk.import("branch").unwrap(), Value::from("NYC-2"), "exports are live");

    let orphan = teller.create_in([("name", "frank")], &ctx).unwrap();
    assert!(matches!(orphan.import("branch"), Err(AxiomError::UnknownImport(_))));
}

#[test]
fn detached_instances_refuse_calls_and_drop_listeners() {
    let (registry, ctx) = bank();
    let account = registry.require("demo.bank.Account").unwrap();
    let obj = account.create_in([("owner", "gil")], &ctx).unwrap();
    let sub = obj.sub(&[PROPERTY_CHANGE], listener(|_, _| Ok(())));

    obj.detach();
    obj.detach();

    assert!(sub.is_detached());
    assert!(obj.is_detached());
    assert!(matches!(obj.call("accrue", &[]), Err(AxiomError::InstanceDetached(_))));
    assert!(obj.sub(&["audit"], listener(|_, _| Ok(()))).is_detached());
}
