// Copyright 2025 Cowboy AI, LLC.

//! Axiom trait: the smallest self-installing unit of class behaviour

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::class::Class;
use crate::errors::{AxiomError, AxiomResult};

/// Kinds of axioms known to the composer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxiomKind {
    /// Typed instance field with synthesized accessors
    Property,
    /// Instance method
    Method,
    /// Instance-bound event listener
    Listener,
    /// Class constant
    Constant,
    /// Named event channel
    Topic,
    /// Context import
    Import,
    /// Context export
    Export,
    /// Class dependency check
    Requires,
    /// Nested class
    InnerClass,
    /// Interface marker
    Implements,
    /// User-defined axiom
    Custom,
}

impl AxiomKind {
    /// Label used in messages and warnings
    pub fn label(self) -> &'static str {
        match self {
            AxiomKind::Property => "Property",
            AxiomKind::Method => "Method",
            AxiomKind::Listener => "Listener",
            AxiomKind::Constant => "Constant",
            AxiomKind::Topic => "Topic",
            AxiomKind::Import => "Import",
            AxiomKind::Export => "Export",
            AxiomKind::Requires => "Requires",
            AxiomKind::InnerClass => "InnerClass",
            AxiomKind::Implements => "Implements",
            AxiomKind::Custom => "Axiom",
        }
    }
}

impl fmt::Display for AxiomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named unit of behaviour that installs itself on a class.
///
/// Installation runs in two passes: every axiom of a model is first entered
/// into the class's axiom table, then each axiom's
/// [`install_in_class`](Axiom::install_in_class) and
/// [`install_in_proto`](Axiom::install_in_proto) hooks run in declaration
/// order, so a hook can see its siblings.
///
/// # Example
///
/// ```
/// use cim_axiom::{Axiom, AxiomKind, AxiomResult, Class};
/// use std::any::Any;
///
/// #[derive(Debug)]
/// struct Tag(&'static str);
///
/// impl Axiom for Tag {
///     fn name(&self) -> &str { self.0 }
///     fn kind(&self) -> AxiomKind { AxiomKind::Custom }
///     fn install_in_class(&self, _class: &Class) -> AxiomResult<()> { Ok(()) }
///     fn as_any(&self) -> &dyn Any { self }
/// }
/// ```
pub trait Axiom: Any + fmt::Debug {
    /// Unique name within a class
    fn name(&self) -> &str;

    /// Kind used for override compatibility and `axioms_by_kind`
    fn kind(&self) -> AxiomKind;

    /// Finer classification (e.g. a Property's value type); `None` when untyped
    fn subtype(&self) -> Option<&str> {
        None
    }

    /// Check the declaration before it enters the axiom table
    fn validate(&self) -> AxiomResult<()> {
        if self.name().is_empty() {
            return Err(AxiomError::MissingMetadata(format!(
                "{} axiom without a name",
                self.kind()
            )));
        }
        Ok(())
    }

    /// Class-level installation hook
    fn install_in_class(&self, _class: &Class) -> AxiomResult<()> {
        Ok(())
    }

    /// Instance-template installation hook
    fn install_in_proto(&self, _class: &Class) -> AxiomResult<()> {
        Ok(())
    }

    /// Downcasting support
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to an installed axiom
pub type AxiomRef = Rc<dyn Axiom>;

/// Downcast an axiom handle to a concrete axiom type
pub fn downcast_axiom<T: Axiom>(axiom: &AxiomRef) -> Option<&T> {
    axiom.as_any().downcast_ref::<T>()
}

type ClassHook = Rc<dyn Fn(&Class) -> AxiomResult<()>>;

/// A user axiom assembled from closures
#[derive(Clone)]
pub struct CustomAxiom {
    name: String,
    on_class: Option<ClassHook>,
    on_proto: Option<ClassHook>,
}

impl CustomAxiom {
    /// Create a custom axiom with no hooks yet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on_class: None,
            on_proto: None,
        }
    }

    /// Hook run against the class
    pub fn on_class(mut self, hook: impl Fn(&Class) -> AxiomResult<()> + 'static) -> Self {
        self.on_class = Some(Rc::new(hook));
        self
    }

    /// Hook run against the instance template
    pub fn on_proto(mut self, hook: impl Fn(&Class) -> AxiomResult<()> + 'static) -> Self {
        self.on_proto = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for CustomAxiom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAxiom")
            .field("name", &self.name)
            .field("on_class", &self.on_class.is_some())
            .field("on_proto", &self.on_proto.is_some())
            .finish()
    }
}

impl Axiom for CustomAxiom {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AxiomKind {
        AxiomKind::Custom
    }

    fn validate(&self) -> AxiomResult<()> {
        if self.name.is_empty() && self.on_class.is_none() && self.on_proto.is_none() {
            return Err(AxiomError::MissingMetadata(
                "unnamed axiom without install hooks".to_string(),
            ));
        }
        if self.name.is_empty() {
            return Err(AxiomError::MissingMetadata("custom axiom without a name".to_string()));
        }
        if self.on_class.is_none() && self.on_proto.is_none() {
            return Err(AxiomError::MissingMetadata(format!(
                "axiom '{}' has no install hook",
                self.name
            )));
        }
        Ok(())
    }

    fn install_in_class(&self, class: &Class) -> AxiomResult<()> {
        match &self.on_class {
            Some(hook) => hook(class),
            None => Ok(()),
        }
    }

    fn install_in_proto(&self, class: &Class) -> AxiomResult<()> {
        match &self.on_proto {
            Some(hook) => hook(class),
            None => Ok(()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_axiom_requires_a_hook() {
        let bare = CustomAxiom::new("bare");
        assert!(matches!(bare.validate(), Err(AxiomError::MissingMetadata(_))));

        let unnamed = CustomAxiom::new("");
        assert!(unnamed.validate().unwrap_err().is_definition_error());

        let ok = CustomAxiom::new("tagged").on_class(|_| Ok(()));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_downcast() {
        let axiom: AxiomRef = Rc::new(CustomAxiom::new("x").on_proto(|_| Ok(())));
        assert!(downcast_axiom::<CustomAxiom>(&axiom).is_some());
        assert_eq!(axiom.kind().label(), "Axiom");
    }
}
