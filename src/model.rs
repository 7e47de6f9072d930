// Copyright 2025 Cowboy AI, LLC.

//! Models: declarative class descriptions
//!
//! A [`Model`] is an ordered list of axioms plus metadata (name, parent,
//! interfaces, requirements, inner classes). [`ModelSpec`] is the data-only
//! form that can be loaded from JSON; it covers properties, constants,
//! topics, interfaces and requirements.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::axiom::{Axiom, AxiomRef};
use crate::class::{Class, UnknownArgHook};
use crate::context::{Export, Import};
use crate::errors::AxiomResult;
use crate::instance::Obj;
use crate::markers::Constant;
use crate::method::{ListenerAxiom, Method};
use crate::property::{Property, PropertyType};
use crate::topic::Topic;
use crate::value::Value;

#[derive(Clone)]
pub(crate) enum ParentRef {
    Name(String),
    Class(Class),
}

/// Declarative description of a class
#[derive(Clone)]
pub struct Model {
    pub(crate) name: String,
    pub(crate) extends: Option<ParentRef>,
    pub(crate) refines: Option<String>,
    pub(crate) axioms: Vec<AxiomRef>,
    pub(crate) implements: Vec<String>,
    pub(crate) requires: Vec<String>,
    pub(crate) inner: Vec<Model>,
    pub(crate) unknown_arg_hook: Option<UnknownArgHook>,
    pub(crate) documentation: Option<String>,
}

impl Model {
    /// Model for the class `name` (fully-qualified, dotted)
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
            refines: None,
            axioms: Vec::new(),
            implements: Vec::new(),
            requires: Vec::new(),
            inner: Vec::new(),
            unknown_arg_hook: None,
            documentation: None,
        }
    }

    /// Qualified class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inherit from the registered class `parent`
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(ParentRef::Name(parent.into()));
        self
    }

    /// Inherit from an existing class handle
    pub fn extends_class(mut self, parent: &Class) -> Self {
        self.extends = Some(ParentRef::Class(parent.clone()));
        self
    }

    /// Add the axioms to an already registered class instead of creating one
    pub fn refines(mut self, class: impl Into<String>) -> Self {
        self.refines = Some(class.into());
        self
    }

    /// Declare a property (`"name"`, `("name", default)` or a [`Property`])
    pub fn property(self, property: impl Into<Property>) -> Self {
        self.axiom(property.into())
    }

    /// Declare several properties
    pub fn properties<P: Into<Property>>(self, properties: impl IntoIterator<Item = P>) -> Self {
        properties.into_iter().fold(self, |model, p| model.property(p))
    }

    /// Declare a method
    pub fn method(self, method: Method) -> Self {
        self.axiom(method)
    }

    /// Declare a listener
    pub fn listener(self, listener: ListenerAxiom) -> Self {
        self.axiom(listener)
    }

    /// Declare a constant
    pub fn constant(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.axiom(Constant::new(name, value))
    }

    /// Declare a topic
    pub fn topic(self, topic: Topic) -> Self {
        self.axiom(topic)
    }

    /// Declare a context import
    pub fn import(self, import: Import) -> Self {
        self.axiom(import)
    }

    /// Declare a context export
    pub fn export(self, export: Export) -> Self {
        self.axiom(export)
    }

    /// Require another class to be registered
    pub fn requires(mut self, class: impl Into<String>) -> Self {
        self.requires.push(class.into());
        self
    }

    /// Implement an interface class
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }

    /// Nest a class; it is registered as `<this>.<short name>`
    pub fn inner_class(mut self, model: Model) -> Self {
        self.inner.push(model);
        self
    }

    /// Add any axiom
    pub fn axiom(mut self, axiom: impl Axiom + 'static) -> Self {
        self.axioms.push(Rc::new(axiom));
        self
    }

    /// Add an already shared axiom
    pub fn axiom_ref(mut self, axiom: AxiomRef) -> Self {
        self.axioms.push(axiom);
        self
    }

    /// Receive constructor arguments that match no property
    pub fn on_unknown_arg(
        mut self,
        hook: impl Fn(&Obj, &str, &Value) -> AxiomResult<()> + 'static,
    ) -> Self {
        self.unknown_arg_hook = Some(Rc::new(hook));
        self
    }

    /// Attach documentation
    pub fn documentation(mut self, doc: impl Into<String>) -> Self {
        self.documentation = Some(doc.into());
        self
    }

    /// Parse a data-only model from JSON
    pub fn from_json(json: &str) -> AxiomResult<Self> {
        let spec: ModelSpec = serde_json::from_str(json)?;
        Ok(spec.into_model())
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parent = match &self.extends {
            Some(ParentRef::Name(name)) => Some(name.as_str()),
            Some(ParentRef::Class(class)) => Some(class.name()),
            None => None,
        };
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("extends", &parent)
            .field("refines", &self.refines)
            .field("axioms", &self.axioms.iter().map(|a| a.name()).collect::<Vec<_>>())
            .field("implements", &self.implements)
            .field("requires", &self.requires)
            .field("inner", &self.inner.len())
            .finish()
    }
}

/// Data-only model document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelSpec {
    /// Qualified class name
    #[serde(alias = "id")]
    pub name: String,
    /// Parent class name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Class to refine instead of creating a new one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refines: Option<String>,
    /// Property declarations
    #[serde(default)]
    pub properties: Vec<PropertySpec>,
    /// Class constants
    #[serde(default)]
    pub constants: BTreeMap<String, serde_json::Value>,
    /// Topic declarations
    #[serde(default)]
    pub topics: Vec<TopicSpec>,
    /// Implemented interface classes
    #[serde(default)]
    pub implements: Vec<String>,
    /// Classes that must be registered first
    #[serde(default)]
    pub requires: Vec<String>,
    /// Documentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

/// Property declaration forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PropertySpec {
    /// `"owner"`
    Name(String),
    /// `["interestRate", 0.008]`
    Pair(String, serde_json::Value),
    /// `{"name": "balance", "type": "Float", "value": 0}`
    Descriptor(PropertyDescriptor),
}

/// Full property descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PropertyDescriptor {
    /// Property name
    pub name: String,
    /// Value type
    #[serde(default, rename = "type", alias = "class", skip_serializing_if = "Option::is_none")]
    pub property_type: Option<PropertyType>,
    /// Static default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Reject empty values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Documentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

/// Topic declaration forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TopicSpec {
    /// `"saved"`
    Name(String),
    /// `{"name": "io", "topics": ["read", "write"]}`
    Nested {
        /// Topic name
        name: String,
        /// Nested topics
        #[serde(default)]
        topics: Vec<TopicSpec>,
    },
}

impl PropertySpec {
    fn into_property(self) -> Property {
        match self {
            PropertySpec::Name(name) => Property::new(name),
            PropertySpec::Pair(name, value) => Property::new(name).value(Value::from_json(&value)),
            PropertySpec::Descriptor(desc) => {
                let mut property = Property::new(desc.name);
                if let Some(ty) = desc.property_type {
                    property = property.of_type(ty);
                }
                if let Some(value) = desc.value {
                    property = property.value(Value::from_json(&value));
                }
                if let Some(required) = desc.required {
                    property = property.required(required);
                }
                if let Some(doc) = desc.documentation {
                    property = property.documentation(doc);
                }
                property
            }
        }
    }
}

impl TopicSpec {
    fn into_topic(self) -> Topic {
        match self {
            TopicSpec::Name(name) => Topic::new(name),
            TopicSpec::Nested { name, topics } => topics
                .into_iter()
                .fold(Topic::new(name), |topic, child| topic.with(child.into_topic())),
        }
    }
}

impl ModelSpec {
    /// Convert into a [`Model`]
    pub fn into_model(self) -> Model {
        let mut model = Model::new(self.name);
        if let Some(parent) = self.extends {
            model = model.extends(parent);
        }
        if let Some(target) = self.refines {
            model = model.refines(target);
        }
        for property in self.properties {
            model = model.property(property.into_property());
        }
        for (name, value) in self.constants {
            model = model.constant(name, Value::from_json(&value));
        }
        for topic in self.topics {
            model = model.topic(topic.into_topic());
        }
        for interface in self.implements {
            model = model.implements(interface);
        }
        for class in self.requires {
            model = model.requires(class);
        }
        if let Some(doc) = self.documentation {
            model = model.documentation(doc);
        }
        model
    }

    /// JSON schema of the model document
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(ModelSpec)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axiom::AxiomKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_property_forms_parse() {
        let spec: ModelSpec = serde_json::from_str(
            r#"{
                "id": "demo.Account",
                "properties": [
                    "owner",
                    ["interestRate", 0.008],
                    {"name": "balance", "type": "Float", "required": true}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(spec.name, "demo.Account");
        assert_eq!(spec.properties[0], PropertySpec::Name("owner".to_string()));
        assert!(matches!(&spec.properties[1], PropertySpec::Pair(name, _) if name == "interestRate"));
        assert!(matches!(
            &spec.properties[2],
            PropertySpec::Descriptor(PropertyDescriptor {
                property_type: Some(PropertyType::Float),
                required: Some(true),
                ..
            })
        ));
    }

    #[test]
    fn test_nested_topics_become_axioms() {
        let model = Model::from_json(
            r#"{"name": "demo.Io", "topics": ["saved", {"name": "io", "topics": ["read"]}]}"#,
        )
        .unwrap();
        let kinds: Vec<AxiomKind> = model.axioms.iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec![AxiomKind::Topic, AxiomKind::Topic]);
    }

    #[test]
    fn test_schema_mentions_properties() {
        let schema = ModelSpec::json_schema();
        assert!(schema["properties"].get("properties").is_some());
        assert!(schema["properties"].get("name").is_some());
    }
}
