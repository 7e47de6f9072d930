// Copyright 2025 Cowboy AI, LLC.

//! Property axiom: a named, typed instance field
//!
//! A `Property` is a declaration. Installing it on a class registers the
//! derived class constant (`firstName` → `FIRST_NAME`) and synthesizes the
//! accessor pair used by every instance (see [`crate::accessor`]).
//!
//! Every field except the name is optional so that a subclass can redeclare
//! a property with only the fields it wants to change; the composer overlays
//! the redeclaration onto the inherited property with
//! [`Property::inherit_from`].

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::accessor;
use crate::axiom::{Axiom, AxiomKind};
use crate::class::Class;
use crate::errors::AxiomResult;
use crate::instance::Obj;
use crate::slot::Slot;
use crate::value::Value;

/// `adapt(obj, old, new) -> new'` and `preSet(obj, old, new) -> new'`
pub type TransformHook = Rc<dyn Fn(&Obj, &Value, Value) -> Value>;
/// `assertValue(obj, new)`; an error aborts the write
pub type AssertHook = Rc<dyn Fn(&Obj, &Value) -> AxiomResult<()>>;
/// `postSet(obj, old, new)`
pub type PostSetHook = Rc<dyn Fn(&Obj, &Value, &Value) -> AxiomResult<()>>;
/// Lazy default constructor
pub type FactoryHook = Rc<dyn Fn(&Obj) -> Value>;
/// Read override
pub type GetterHook = Rc<dyn Fn(&Obj) -> AxiomResult<Value>>;
/// Write override
pub type SetterHook = Rc<dyn Fn(&Obj, Value) -> AxiomResult<()>>;
/// Expression body, called with the dependency values in declaration order
pub type ExpressionCode = Rc<dyn Fn(&[Value]) -> Value>;

/// Value type of a property; selects the default adapt and default value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum PropertyType {
    /// Untyped
    Any,
    /// String
    String,
    /// Integer
    Int,
    /// Float
    Float,
    /// Boolean
    Boolean,
    /// Array
    Array,
    /// Instance of a composed class
    Object,
}

impl PropertyType {
    /// Label used as the axiom subtype
    pub fn label(self) -> &'static str {
        match self {
            PropertyType::Any => "Property",
            PropertyType::String => "String",
            PropertyType::Int => "Int",
            PropertyType::Float => "Float",
            PropertyType::Boolean => "Boolean",
            PropertyType::Array => "Array",
            PropertyType::Object => "Object",
        }
    }

    /// Default used when neither value, factory nor expression is declared
    pub fn default_value(self) -> Value {
        match self {
            PropertyType::String => Value::str(""),
            PropertyType::Int => Value::Int(0),
            PropertyType::Float => Value::Float(0.0),
            PropertyType::Boolean => Value::Bool(false),
            PropertyType::Any | PropertyType::Array | PropertyType::Object => Value::Undefined,
        }
    }

    /// Coerce `value` into this type; idempotent on its own output
    pub fn adapt(self, value: Value) -> Value {
        match self {
            PropertyType::Any | PropertyType::Object => value,
            PropertyType::String => match value {
                Value::Str(_) => value,
                Value::Undefined | Value::Null => Value::str(""),
                other => Value::str(other.to_string()),
            },
            PropertyType::Int => match value {
                Value::Int(_) => value,
                Value::Float(f) => Value::Int(if f.is_finite() { f.trunc() as i64 } else { 0 }),
                Value::Bool(b) => Value::Int(b as i64),
                Value::Str(s) => Value::Int(s.trim().parse::<i64>().unwrap_or_else(|_| {
                    s.trim().parse::<f64>().map(|f| f.trunc() as i64).unwrap_or(0)
                })),
                _ => Value::Int(0),
            },
            PropertyType::Float => match value {
                Value::Float(_) => value,
                Value::Int(i) => Value::Float(i as f64),
                Value::Bool(b) => Value::Float(if b { 1.0 } else { 0.0 }),
                Value::Str(s) => Value::Float(s.trim().parse::<f64>().unwrap_or(0.0)),
                _ => Value::Float(0.0),
            },
            PropertyType::Boolean => match value {
                Value::Bool(_) => value,
                other => Value::Bool(other.truthy()),
            },
            PropertyType::Array => match value {
                Value::Array(_) => value,
                Value::Undefined | Value::Null => Value::array(Vec::new()),
                other => Value::array(vec![other]),
            },
        }
    }
}

/// Dependency-derived default
#[derive(Clone)]
pub struct Expression {
    /// Sibling property names, in the order passed to `code`
    pub args: Vec<String>,
    /// Body
    pub code: ExpressionCode,
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression").field("args", &self.args).finish()
    }
}

/// A property declaration
#[derive(Clone)]
pub struct Property {
    name: String,
    pub(crate) property_type: Option<PropertyType>,
    pub(crate) value: Option<Value>,
    pub(crate) factory: Option<FactoryHook>,
    pub(crate) expression: Option<Expression>,
    pub(crate) adapt: Option<TransformHook>,
    pub(crate) pre_set: Option<TransformHook>,
    pub(crate) assert_value: Option<AssertHook>,
    pub(crate) post_set: Option<PostSetHook>,
    pub(crate) getter: Option<GetterHook>,
    pub(crate) setter: Option<SetterHook>,
    pub(crate) required: Option<bool>,
    pub(crate) documentation: Option<String>,
}

impl Property {
    /// Untyped property with no hooks
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: None,
            value: None,
            factory: None,
            expression: None,
            adapt: None,
            pre_set: None,
            assert_value: None,
            post_set: None,
            getter: None,
            setter: None,
            required: None,
            documentation: None,
        }
    }

    /// Typed property
    pub fn typed(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self::new(name).of_type(property_type)
    }

    /// Set the value type
    pub fn of_type(mut self, property_type: PropertyType) -> Self {
        self.property_type = Some(property_type);
        self
    }

    /// Static default
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Lazy default computed once per instance
    pub fn factory(mut self, factory: impl Fn(&Obj) -> Value + 'static) -> Self {
        self.factory = Some(Rc::new(factory));
        self
    }

    /// Default derived from sibling properties
    pub fn expression<I, S>(mut self, args: I, code: impl Fn(&[Value]) -> Value + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expression = Some(Expression {
            args: args.into_iter().map(Into::into).collect(),
            code: Rc::new(code),
        });
        self
    }

    /// Coercion applied first on every write
    pub fn adapt(mut self, hook: impl Fn(&Obj, &Value, Value) -> Value + 'static) -> Self {
        self.adapt = Some(Rc::new(hook));
        self
    }

    /// Transform applied after adapt; returning the old value vetoes the change
    pub fn pre_set(mut self, hook: impl Fn(&Obj, &Value, Value) -> Value + 'static) -> Self {
        self.pre_set = Some(Rc::new(hook));
        self
    }

    /// Validation run before the value is committed
    pub fn assert_value(mut self, hook: impl Fn(&Obj, &Value) -> AxiomResult<()> + 'static) -> Self {
        self.assert_value = Some(Rc::new(hook));
        self
    }

    /// Hook run after the change notification
    pub fn post_set(
        mut self,
        hook: impl Fn(&Obj, &Value, &Value) -> AxiomResult<()> + 'static,
    ) -> Self {
        self.post_set = Some(Rc::new(hook));
        self
    }

    /// Replace the read path
    pub fn getter(mut self, hook: impl Fn(&Obj) -> AxiomResult<Value> + 'static) -> Self {
        self.getter = Some(Rc::new(hook));
        self
    }

    /// Replace the write path (adapt, preSet, assertValue and postSet are skipped)
    pub fn setter(mut self, hook: impl Fn(&Obj, Value) -> AxiomResult<()> + 'static) -> Self {
        self.setter = Some(Rc::new(hook));
        self
    }

    /// Reject empty values on write
    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Attach documentation
    pub fn documentation(mut self, doc: impl Into<String>) -> Self {
        self.documentation = Some(doc.into());
        self
    }

    /// Property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type, `Any` when untyped
    pub fn property_type(&self) -> PropertyType {
        self.property_type.unwrap_or(PropertyType::Any)
    }

    /// Whether writes of empty values are rejected
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    /// Declared expression, if any
    pub fn expression_decl(&self) -> Option<&Expression> {
        self.expression.as_ref()
    }

    /// Documentation text
    pub fn doc(&self) -> Option<&str> {
        self.documentation.as_deref()
    }

    /// Whether a factory or expression produces the default lazily
    pub fn has_lazy_default(&self) -> bool {
        self.factory.is_some() || self.expression.is_some()
    }

    /// Whether the property declares any value-producing strategy
    fn declares_default(&self) -> bool {
        self.value.is_some() || self.factory.is_some() || self.expression.is_some()
    }

    /// Static default: the declared value, else the type default
    pub fn default_value(&self) -> Value {
        match &self.value {
            Some(value) => value.clone(),
            None => self.property_type().default_value(),
        }
    }

    /// Run the adapt stage: the declared hook, else the type coercion
    pub(crate) fn run_adapt(&self, obj: &Obj, old: &Value, value: Value) -> Value {
        match &self.adapt {
            Some(adapt) => adapt(obj, old, value),
            None => self.property_type().adapt(value),
        }
    }

    /// Derive the effective property for a subclass redeclaration: fields set
    /// on `self` win, everything else is inherited from `parent`. A
    /// redeclaration that names any of value/factory/expression replaces all
    /// three.
    pub fn inherit_from(&self, parent: &Property) -> Property {
        let own_default = self.declares_default();
        Property {
            name: self.name.clone(),
            property_type: self.property_type.or(parent.property_type),
            value: if own_default { self.value.clone() } else { parent.value.clone() },
            factory: if own_default { self.factory.clone() } else { parent.factory.clone() },
            expression: if own_default {
                self.expression.clone()
            } else {
                parent.expression.clone()
            },
            adapt: self.adapt.clone().or_else(|| parent.adapt.clone()),
            pre_set: self.pre_set.clone().or_else(|| parent.pre_set.clone()),
            assert_value: self
                .assert_value
                .clone()
                .or_else(|| parent.assert_value.clone()),
            post_set: self.post_set.clone().or_else(|| parent.post_set.clone()),
            getter: self.getter.clone().or_else(|| parent.getter.clone()),
            setter: self.setter.clone().or_else(|| parent.setter.clone()),
            required: self.required.or(parent.required),
            documentation: self
                .documentation
                .clone()
                .or_else(|| parent.documentation.clone()),
        }
    }

    /// Read this property from `obj`
    pub fn get(&self, obj: &Obj) -> AxiomResult<Value> {
        obj.get(&self.name)
    }

    /// Write this property on `obj`
    pub fn set(&self, obj: &Obj, value: impl Into<Value>) -> AxiomResult<()> {
        obj.set(&self.name, value)
    }

    /// Reset this property on `obj`
    pub fn clear(&self, obj: &Obj) -> AxiomResult<()> {
        obj.clear_property(&self.name)
    }

    /// Whether `obj` holds an explicit value
    pub fn is_set(&self, obj: &Obj) -> bool {
        obj.has_own_property(&self.name)
    }

    /// Slot over this property of `obj`
    pub fn slot(&self, obj: &Obj) -> Slot {
        Slot::property(obj.clone(), self.name.clone())
    }

    /// Compare this property's values on two instances
    pub fn compare(&self, a: &Obj, b: &Obj) -> AxiomResult<Ordering> {
        Ok(self.get(a)?.compare(&self.get(b)?))
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("type", &self.property_type)
            .field("value", &self.value)
            .field("factory", &self.factory.is_some())
            .field("expression", &self.expression)
            .field("adapt", &self.adapt.is_some())
            .field("pre_set", &self.pre_set.is_some())
            .field("assert_value", &self.assert_value.is_some())
            .field("post_set", &self.post_set.is_some())
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .field("required", &self.required)
            .finish()
    }
}

impl From<&str> for Property {
    fn from(name: &str) -> Self {
        Property::new(name)
    }
}

impl From<String> for Property {
    fn from(name: String) -> Self {
        Property::new(name)
    }
}

impl<V: Into<Value>> From<(&str, V)> for Property {
    fn from((name, value): (&str, V)) -> Self {
        Property::new(name).value(value)
    }
}

impl Axiom for Property {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AxiomKind {
        AxiomKind::Property
    }

    fn subtype(&self) -> Option<&str> {
        self.property_type.map(PropertyType::label)
    }

    fn install_in_class(&self, class: &Class) -> AxiomResult<()> {
        let property = Rc::new(self.clone());
        class.define_property_constant(&property)?;
        class.insert_property(property);
        Ok(())
    }

    fn install_in_proto(&self, class: &Class) -> AxiomResult<()> {
        let property = class
            .own_property(&self.name)
            .unwrap_or_else(|| Rc::new(self.clone()));
        class.insert_accessor(accessor::synthesize(property));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
