use std::cell::Cell;
use std::rc::Rc;

use cim_axiom::{
    listener, AxiomError, Class, ClassRegistry, Context, ExpressionSlot, Model, Obj, Property,
    PropertyType, RuntimeConfig, Slot, Value,
};
use pretty_assertions::assert_eq;

struct Fixture {
    cell: Class,
    holder: Class,
    ctx: Context,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    fn with_config(config: RuntimeConfig) -> Self {
        let registry = ClassRegistry::with_config(config);
        let cell = registry
            .build(
                Model::new("demo.Cell")
                    .property("v")
                    .property(Property::typed("n", PropertyType::Int)),
            )
            .unwrap();
        let holder = registry
            .build(Model::new("demo.Holder").property("target"))
            .unwrap();
        Self {
            cell,
            holder,
            ctx: Context::new(registry),
        }
    }

    fn cell(&self, v: impl Into<Value>) -> Obj {
        self.cell.create_in([("v", v.into())], &self.ctx).unwrap()
    }
}

fn int(slot: &Slot) -> i64 {
    slot.get().unwrap().as_i64().unwrap()
}

#[test]
fn link_from_copies_then_tracks_both_ways() {
    let fx = Fixture::new();
    let (a, b) = (fx.cell(1), fx.cell(2));
    let (sa, sb) = (a.slot("v").unwrap(), b.slot("v").unwrap());

    let binding = sa.link_from(&sb).unwrap();
    assert_eq!(a.get("v").unwrap(), Value::from(2));

    a.set("v", 10).unwrap();
    assert_eq!(b.get("v").unwrap(), Value::from(10));
    b.set("v", 20).unwrap();
    assert_eq!(a.get("v").unwrap(), Value::from(20));

    binding.detach();
    b.set("v", 30).unwrap();
    assert_eq!(a.get("v").unwrap(), Value::from(20));
}

#[test]
fn link_settles_on_the_adapted_value() {
    let fx = Fixture::new();
    let (a, b) = (fx.cell(Value::Undefined), fx.cell(Value::Undefined));
    let loose = a.slot("v").unwrap();
    let typed = b.slot("n").unwrap();

    let _binding = typed.link_from(&loose).unwrap();
    a.set("v", "7").unwrap();

    assert_eq!(b.get("n").unwrap(), Value::from(7));
    assert_eq!(a.get("v").unwrap(), Value::from(7), "coerced value is copied back");
}

#[test]
fn follow_is_one_way() {
    let fx = Fixture::new();
    let (leader, follower) = (fx.cell("x"), fx.cell("y"));
    let binding = follower
        .slot("v")
        .unwrap()
        .follow(&leader.slot("v").unwrap())
        .unwrap();

    assert_eq!(follower.get("v").unwrap(), Value::from("x"));
    leader.set("v", "z").unwrap();
    assert_eq!(follower.get("v").unwrap(), Value::from("z"));
    follower.set("v", "w").unwrap();
    assert_eq!(leader.get("v").unwrap(), Value::from("z"));
    binding.detach();
}

#[test]
fn map_from_applies_the_transform() {
    let fx = Fixture::new();
    let (source, target) = (fx.cell(3), fx.cell(0));
    let _binding = target
        .slot("v")
        .unwrap()
        .map_from(&source.slot("v").unwrap(), |v| {
            Value::from(v.as_i64().unwrap_or(0) * 10)
        })
        .unwrap();

    assert_eq!(target.get("v").unwrap(), Value::from(30));
    source.set("v", 4).unwrap();
    assert_eq!(target.get("v").unwrap(), Value::from(40));
}

#[test]
fn expression_slot_is_lazy_and_notifies() {
    let fx = Fixture::new();
    let (first, last) = (fx.cell("Ada"), fx.cell("Lovelace"));
    let full = ExpressionSlot::new(
        vec![first.slot("v").unwrap(), last.slot("v").unwrap()],
        |args| Value::from(format!("{} {}", args[0], args[1])),
    );
    let slot = full.slot();
    let pings = Rc::new(Cell::new(0));
    let p = pings.clone();
    let _sub = slot.sub(listener(move |_, _| {
        p.set(p.get() + 1);
        Ok(())
    }));

    assert_eq!(slot.get().unwrap(), Value::from("Ada Lovelace"));
    assert_eq!(full.computations(), 1);

    first.set("v", "Augusta").unwrap();
    assert_eq!(full.computations(), 1);
    assert_eq!(pings.get(), 1);

    assert_eq!(slot.get().unwrap(), Value::from("Augusta Lovelace"));
    assert_eq!(full.computations(), 2);
    assert!(matches!(slot.set("nope"), Err(AxiomError::ImmutableSlot(_))));

    full.detach();
    first.set("v", "Ada").unwrap();
    assert_eq!(pings.get(), 1);
}

#[test]
fn map_derives_a_read_only_slot() {
    let fx = Fixture::new();
    let a = fx.cell(5);
    let squared = a.slot("v").unwrap().map(|v| {
        let n = v.as_i64().unwrap_or(0);
        Value::from(n * n)
    });
    assert_eq!(int(&squared), 25);
    a.set("v", 6).unwrap();
    assert_eq!(int(&squared), 36);
}

#[test]
fn constant_slots_reject_writes() {
    let slot = Slot::constant(42);
    assert_eq!(int(&slot), 42);
    assert!(matches!(slot.set(1), Err(AxiomError::ImmutableSlot(_))));
    let sub = slot.sub(listener(|_, _| Ok(())));
    sub.detach();
}

#[test]
fn relate_to_keeps_invertible_pairs_consistent() {
    let fx = Fixture::new();
    let (celsius, doubled) = (fx.cell(10), fx.cell(0));
    let (left, right) = (celsius.slot("v").unwrap(), doubled.slot("v").unwrap());

    let _binding = left
        .relate_to(
            &right,
            |v| Value::from(v.as_i64().unwrap_or(0) * 2),
            |v| Value::from(v.as_i64().unwrap_or(0) / 2),
            false,
        )
        .unwrap();
    assert_eq!(int(&right), 20);

    celsius.set("v", 4).unwrap();
    assert_eq!(int(&right), 8);
    doubled.set("v", 12).unwrap();
    assert_eq!(int(&left), 6);
}

fn drifting(left: &Slot, right: &Slot, expect_unstable: bool) -> cim_axiom::Subscription {
    // f(x) = x + 1 and f'(y) = y never reproduce the source value
    left.relate_to(
        right,
        |v| Value::from(v.as_i64().unwrap_or(0) + 1),
        |v| v.clone(),
        expect_unstable,
    )
    .unwrap()
}

#[test]
fn relate_to_reports_divergence_past_the_threshold() {
    let fx = Fixture::new();
    let (a, b) = (fx.cell(0), fx.cell(0));
    let _binding = drifting(&a.slot("v").unwrap(), &b.slot("v").unwrap(), false);

    let err = a.set("v", 1).unwrap_err();
    assert!(matches!(err, AxiomError::Divergence { depth: 6 }), "got {err:?}");
}

#[test]
fn divergence_threshold_is_configurable() {
    let fx = Fixture::with_config(RuntimeConfig {
        divergence_threshold: 2,
        ..RuntimeConfig::default()
    });
    let (a, b) = (fx.cell(0), fx.cell(0));
    let _binding = drifting(&a.slot("v").unwrap(), &b.slot("v").unwrap(), false);

    let err = a.set("v", 1).unwrap_err();
    assert!(matches!(err, AxiomError::Divergence { depth: 3 }), "got {err:?}");
}

#[test]
fn expect_unstable_lets_both_sides_settle() {
    let fx = Fixture::new();
    let (a, b) = (fx.cell(0), fx.cell(0));
    let _binding = drifting(&a.slot("v").unwrap(), &b.slot("v").unwrap(), true);

    a.set("v", 1).unwrap();
    assert_eq!(a.get("v").unwrap(), Value::from(1));
    assert_eq!(b.get("v").unwrap(), Value::from(2));
}

#[test]
fn dot_follows_whichever_object_the_parent_holds() {
    let fx = Fixture::new();
    let (first, second) = (fx.cell("one"), fx.cell("two"));
    let holder = fx
        .holder
        .create_in([("target", Value::from(first.clone()))], &fx.ctx)
        .unwrap();
    let inner = holder.slot("target").unwrap().dot("v");

    let pings = Rc::new(Cell::new(0));
    let p = pings.clone();
    let _sub = inner.sub(listener(move |_, _| {
        p.set(p.get() + 1);
        Ok(())
    }));

    assert_eq!(inner.get().unwrap(), Value::from("one"));
    first.set("v", "uno").unwrap();
    assert_eq!(pings.get(), 1);

    holder.set("target", second.clone()).unwrap();
    assert_eq!(pings.get(), 2);
    assert_eq!(inner.get().unwrap(), Value::from("two"));

    first.set("v", "ignored").unwrap();
    assert_eq!(pings.get(), 2, "old target no longer watched");

    inner.set("dos").unwrap();
    assert_eq!(second.get("v").unwrap(), Value::from("dos"));
}

#[test]
fn detaching_an_instance_releases_its_bindings() {
    let fx = Fixture::new();
    let (a, b) = (fx.cell(1), fx.cell(2));
    let binding = a.slot("v").unwrap().link_from(&b.slot("v").unwrap()).unwrap();
    a.on_detach(binding.clone());

    a.detach();
    assert!(binding.is_detached());
    b.set("v", 99).unwrap();
    assert_eq!(a.get("v").unwrap(), Value::from(2));
}
