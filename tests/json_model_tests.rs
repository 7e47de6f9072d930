use cim_axiom::{
    AxiomError, AxiomKind, ClassRegistry, Context, ModelSpec, PropertyType, RuntimeConfig, Value,
};
use pretty_assertions::assert_eq;

const ACCOUNT: &str = r#"{
    "name": "demo.bank.Account",
    "documentation": "A bank account",
    "properties": [
        {"name": "owner", "type": "String", "required": true},
        {"name": "balance", "type": "Float"},
        ["interestRate", 0.008]
    ],
    "constants": {"CURRENCY": "USD"},
    "topics": ["saved", {"name": "io", "topics": ["read", "write"]}]
}"#;

const SAVINGS: &str = r#"{
    "name": "demo.bank.SavingsAccount",
    "extends": "demo.bank.Account",
    "properties": [["interestRate", 0.012]]
}"#;

#[test]
fn json_models_build_a_hierarchy() {
    let registry = ClassRegistry::new();
    let account = registry.build_json(ACCOUNT).unwrap();
    let savings = registry.build_json(SAVINGS).unwrap();

    assert_eq!(account.property("owner").unwrap().property_type(), PropertyType::String);
    assert!(account.property("owner").unwrap().is_required());
    assert_eq!(account.constant("CURRENCY"), Some(Value::from("USD")));
    assert_eq!(account.axioms_by_kind(AxiomKind::Topic).len(), 2);
    assert_eq!(savings.parent().map(|p| p.name().to_string()), Some(account.name().to_string()));

    let ctx = Context::new(registry);
    let obj = savings.create_in(Vec::<(&str, Value)>::new(), &ctx).unwrap();
    assert_eq!(obj.get("interestRate").unwrap(), Value::from(0.012));
    assert!(obj.topic("io").unwrap().child("write").is_ok());
}

#[test]
fn instances_round_trip_through_json() {
    let registry = ClassRegistry::new();
    let account = registry.build_json(ACCOUNT).unwrap();
    let ctx = Context::new(registry);

    let obj = account
        .create_from_json(
            &serde_json::json!({"class": "demo.bank.Account", "owner": "ada", "balance": 12.5}),
            &ctx,
        )
        .unwrap();
    assert_eq!(obj.get("owner").unwrap(), Value::from("ada"));

    let copy = account.create_from_json(&obj.to_json(), &ctx).unwrap();
    assert!(obj.equals(&copy));

    let err = account
        .create_from_json(&serde_json::json!([1, 2]), &ctx)
        .unwrap_err();
    assert!(matches!(err, AxiomError::Serialization(_)));
}

#[test]
fn refinement_documents_extend_existing_classes() {
    let registry = ClassRegistry::new();
    let account = registry.build_json(ACCOUNT).unwrap();
    registry
        .build_json(r#"{"name": "demo.bank.AccountAudit", "refines": "demo.bank.Account", "properties": ["auditor"]}"#)
        .unwrap();

    assert!(account.accessor("auditor").is_some());
    assert!(!registry.contains("demo.bank.AccountAudit"));
}

#[test]
fn malformed_documents_are_rejected() {
    let registry = ClassRegistry::new();
    assert!(matches!(
        registry.build_json(r#"{"properties": []}"#),
        Err(AxiomError::Serialization(_))
    ));
    assert!(matches!(
        registry.build_json(r#"{"name": "demo.X", "extends": "demo.Missing"}"#),
        Err(AxiomError::ClassNotFound(_))
    ));
    assert!(matches!(
        registry.build_json(r#"{"name": "demo.Y", "extends": "demo.A", "refines": "demo.A"}"#),
        Err(AxiomError::ConflictingModel(_))
    ));
}

#[test]
fn spec_documents_serialize_back() {
    let spec: ModelSpec = serde_json::from_str(SAVINGS).unwrap();
    let json = serde_json::to_value(&spec).unwrap();
    assert_eq!(json["extends"], "demo.bank.Account");
    let again: ModelSpec = serde_json::from_value(json).unwrap();
    assert_eq!(again, spec);
}

#[test]
fn runtime_config_loads_from_json() {
    let config = RuntimeConfig::from_json(r#"{"divergence_threshold": 8}"#).unwrap();
    assert_eq!(config.divergence_threshold, 8);
    assert_eq!(config.default_merge_delay_ms, RuntimeConfig::default().default_merge_delay_ms);
    assert!(RuntimeConfig::json_schema()["properties"]
        .get("divergence_threshold")
        .is_some());
}
