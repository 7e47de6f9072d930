// Copyright 2025 Cowboy AI, LLC.

//! Class registry: qualified name → class
//!
//! Each thread has a global registry, empty at startup. Tests and embedders
//! that need isolation create their own with [`ClassRegistry::new`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::axiom::AxiomRef;
use crate::class::Class;
use crate::config::RuntimeConfig;
use crate::errors::{AxiomError, AxiomResult};
use crate::markers::{Implements, InnerClass, Requires};
use crate::model::{Model, ParentRef};
use crate::naming;

struct RegistryInner {
    classes: RefCell<IndexMap<String, Class>>,
    config: RuntimeConfig,
}

/// Registry of composed classes
#[derive(Clone)]
pub struct ClassRegistry {
    inner: Rc<RegistryInner>,
}

thread_local! {
    static GLOBAL: ClassRegistry = ClassRegistry::new();
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    /// Empty registry with the default configuration
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Empty registry composing classes with `config`
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                classes: RefCell::new(IndexMap::new()),
                config,
            }),
        }
    }

    /// The thread's global registry
    pub fn global() -> Self {
        GLOBAL.with(Clone::clone)
    }

    /// Configuration used for composition
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Register a composed class under its name
    pub fn register(&self, class: Class) -> AxiomResult<()> {
        let mut classes = self.inner.classes.borrow_mut();
        if classes.contains_key(class.name()) {
            return Err(AxiomError::AlreadyRegistered(class.name().to_string()));
        }
        debug!(class = class.name(), "class registered");
        classes.insert(class.name().to_string(), class);
        Ok(())
    }

    /// Class registered under `name`
    pub fn lookup(&self, name: &str) -> Option<Class> {
        self.inner.classes.borrow().get(name).cloned()
    }

    /// Class registered under `name`, or `ClassNotFound`
    pub fn require(&self, name: &str) -> AxiomResult<Class> {
        self.lookup(name)
            .ok_or_else(|| AxiomError::ClassNotFound(name.to_string()))
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.inner.classes.borrow().contains_key(name)
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<String> {
        self.inner.classes.borrow().keys().cloned().collect()
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.inner.classes.borrow().len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compose and register the class described by `model`, or install its
    /// axioms into an existing class when the model refines one.
    pub fn build(&self, model: Model) -> AxiomResult<Class> {
        if model.extends.is_some() && model.refines.is_some() {
            return Err(AxiomError::ConflictingModel(model.name));
        }
        if model.name.is_empty() {
            return Err(AxiomError::MissingMetadata("model without a name".to_string()));
        }

        let mut axioms: Vec<AxiomRef> = Vec::new();
        for required in &model.requires {
            self.require(required)?;
            axioms.push(Rc::new(Requires::new(required.clone())));
        }
        for interface in &model.implements {
            axioms.push(Rc::new(Implements::new(self.require(interface)?)));
        }

        if let Some(target) = &model.refines {
            let class = self.require(target)?;
            for inner in model.inner {
                axioms.push(self.build_inner(class.name(), inner)?);
            }
            axioms.extend(model.axioms);
            class.install(axioms)?;
            if let Some(hook) = model.unknown_arg_hook {
                class.set_unknown_arg_hook(hook);
            }
            debug!(class = class.name(), "class refined");
            return Ok(class);
        }

        if self.contains(&model.name) {
            return Err(AxiomError::AlreadyRegistered(model.name));
        }
        let parent = match model.extends {
            Some(ParentRef::Name(name)) => Some(self.require(&name)?),
            Some(ParentRef::Class(class)) => Some(class),
            None => None,
        };
        for inner in model.inner {
            axioms.push(self.build_inner(&model.name, inner)?);
        }
        axioms.extend(model.axioms);

        let class = Class::compose(&model.name, parent, self.inner.config.clone(), axioms)?;
        if let Some(hook) = model.unknown_arg_hook {
            class.set_unknown_arg_hook(hook);
        }
        self.register(class.clone())?;
        Ok(class)
    }

    fn build_inner(&self, outer: &str, mut inner: Model) -> AxiomResult<AxiomRef> {
        inner.name = format!("{outer}.{}", naming::short_name(&inner.name));
        let class = self.build(inner)?;
        Ok(Rc::new(InnerClass::new(class)))
    }

    /// Parse a JSON model document and build it
    pub fn build_json(&self, json: &str) -> AxiomResult<Class> {
        self.build(Model::from_json(json)?)
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.names())
            .finish()
    }
}
