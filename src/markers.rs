// Copyright 2025 Cowboy AI, LLC.

//! Declarative axioms with little or no install behaviour: constants,
//! interface markers, class requirements and inner classes

use std::any::Any;

use crate::axiom::{Axiom, AxiomKind};
use crate::class::Class;
use crate::errors::AxiomResult;
use crate::value::Value;

/// Class constant
#[derive(Debug, Clone)]
pub struct Constant {
    name: String,
    value: Value,
}

impl Constant {
    /// Declare `name = value`
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Declared value
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Axiom for Constant {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AxiomKind {
        AxiomKind::Constant
    }

    fn install_in_class(&self, class: &Class) -> AxiomResult<()> {
        class.define_constant(&self.name, self.value.clone());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Marks a class as implementing an interface class; `is_sub_class`
/// honours the marker.
#[derive(Debug, Clone)]
pub struct Implements {
    axiom_name: String,
    interface: Class,
}

impl Implements {
    /// Marker for `interface`
    pub fn new(interface: Class) -> Self {
        Self {
            axiom_name: Self::axiom_name(interface.name()),
            interface,
        }
    }

    /// Axiom-table name of the marker for `interface`
    pub fn axiom_name(interface: &str) -> String {
        format!("implements.{interface}")
    }

    /// Implemented interface
    pub fn interface(&self) -> &Class {
        &self.interface
    }
}

impl Axiom for Implements {
    fn name(&self) -> &str {
        &self.axiom_name
    }

    fn kind(&self) -> AxiomKind {
        AxiomKind::Implements
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Records that the class depends on another registered class
#[derive(Debug, Clone)]
pub struct Requires {
    axiom_name: String,
    class_name: String,
}

impl Requires {
    /// Requirement on `class_name`
    pub fn new(class_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        Self {
            axiom_name: format!("requires.{class_name}"),
            class_name,
        }
    }

    /// Required class
    pub fn class_name(&self) -> &str {
        &self.class_name
    }
}

impl Axiom for Requires {
    fn name(&self) -> &str {
        &self.axiom_name
    }

    fn kind(&self) -> AxiomKind {
        AxiomKind::Requires
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Nested class, reachable through `Class::inner_class`
#[derive(Debug, Clone)]
pub struct InnerClass {
    name: String,
    class: Class,
}

impl InnerClass {
    /// Nest `class` under its short name
    pub fn new(class: Class) -> Self {
        Self {
            name: class.short_name().to_string(),
            class,
        }
    }

    /// Nested class
    pub fn class(&self) -> &Class {
        &self.class
    }
}

impl Axiom for InnerClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AxiomKind {
        AxiomKind::InnerClass
    }

    fn install_in_class(&self, class: &Class) -> AxiomResult<()> {
        class.add_inner_class(&self.name, self.class.clone());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
