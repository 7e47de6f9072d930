// Copyright 2025 Cowboy AI, LLC.

//! Error types for class composition and instance operations

use thiserror::Error;

/// Errors raised by the composer, the accessor pipeline and the slot graph
#[derive(Debug, Clone, Error)]
pub enum AxiomError {
    /// Two axioms with the same name were declared in one model
    #[error("Duplicate axiom '{name}' in model {class}")]
    DuplicateAxiom {
        /// Class being composed
        class: String,
        /// Offending axiom name
        name: String,
    },

    /// Property name is empty or uses a reserved prefix/suffix
    #[error("Illegal property name '{name}': {reason}")]
    IllegalPropertyName {
        /// Offending property name
        name: String,
        /// Why the name was rejected
        reason: String,
    },

    /// A subclass redeclared an inherited axiom with an incompatible kind
    #[error("Incompatible override of '{name}' in {class}: {inherited} cannot become {declared}")]
    IncompatibleOverride {
        /// Class being composed
        class: String,
        /// Axiom name
        name: String,
        /// Kind on the ancestor
        inherited: String,
        /// Kind on the new declaration
        declared: String,
    },

    /// Model or axiom lacks metadata needed for installation
    #[error("Missing metadata: {0}")]
    MissingMetadata(String),

    /// Two properties derive the same class constant name
    #[error("Constant {constant} derived from '{property}' collides with '{existing}'")]
    ConstantCollision {
        /// Derived constant name (e.g. `FIRST_NAME`)
        constant: String,
        /// Property being installed
        property: String,
        /// Property that already owns the constant
        existing: String,
    },

    /// Model declares both `extends` and `refines`
    #[error("Model {0} cannot both extend and refine a class")]
    ConflictingModel(String),

    /// Class lookup by qualified name failed
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// Class already registered under this name
    #[error("Class already registered: {0}")]
    AlreadyRegistered(String),

    /// Axiom lookup by name failed
    #[error("Unknown axiom '{name}' on {class}")]
    UnknownAxiom {
        /// Class searched
        class: String,
        /// Axiom name
        name: String,
    },

    /// Import could not be resolved from the context
    #[error("Unknown import '{0}'")]
    UnknownImport(String),

    /// A required property was written with an empty value
    #[error("Property {class}.{property} is required")]
    RequiredProperty {
        /// Class of the instance
        class: String,
        /// Property name
        property: String,
    },

    /// `clear_property` was called on something that is not a Property
    #[error("Cannot clear '{0}': not a property")]
    ClearNonProperty(String),

    /// `assert_value` rejected a write
    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    /// Write attempted on a read-only slot
    #[error("Slot is immutable: {0}")]
    ImmutableSlot(String),

    /// relate_to/relate_from feedback exceeded the configured depth
    #[error("Slot relation diverged after {depth} feedback iterations")]
    Divergence {
        /// Feedback depth reached
        depth: usize,
    },

    /// An expression property depends on itself, directly or through siblings
    #[error("Expression {class}.{property} depends on itself")]
    CyclicExpression {
        /// Class of the instance
        class: String,
        /// Property whose evaluation re-entered
        property: String,
    },

    /// Operation on an instance that has been detached
    #[error("Instance detached: {0}")]
    InstanceDetached(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("Axiom error: {0}")]
    Generic(String),
}

/// Result type for axiom operations
pub type AxiomResult<T> = Result<T, AxiomError>;

impl From<serde_json::Error> for AxiomError {
    fn from(err: serde_json::Error) -> Self {
        AxiomError::Serialization(err.to_string())
    }
}

impl AxiomError {
    /// Create a generic error
    pub fn generic(msg: impl Into<String>) -> Self {
        AxiomError::Generic(msg.into())
    }

    /// Raised while composing a class (fatal at definition time)
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            AxiomError::DuplicateAxiom { .. }
                | AxiomError::IllegalPropertyName { .. }
                | AxiomError::IncompatibleOverride { .. }
                | AxiomError::MissingMetadata(_)
                | AxiomError::ConstantCollision { .. }
                | AxiomError::ConflictingModel(_)
        )
    }

    /// Raised while operating on an instance
    pub fn is_runtime_assertion(&self) -> bool {
        matches!(
            self,
            AxiomError::RequiredProperty { .. }
                | AxiomError::ClearNonProperty(_)
                | AxiomError::AssertionFailed(_)
                | AxiomError::UnknownImport(_)
                | AxiomError::UnknownAxiom { .. }
                | AxiomError::Divergence { .. }
                | AxiomError::CyclicExpression { .. }
                | AxiomError::ImmutableSlot(_)
        )
    }

    /// Lookup failures
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AxiomError::ClassNotFound(_) | AxiomError::UnknownAxiom { .. } | AxiomError::UnknownImport(_)
        )
    }
}
