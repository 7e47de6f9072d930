// Copyright 2025 Cowboy AI, LLC.

//! Contexts and the Import/Export axioms
//!
//! A [`Context`] is a chain of key/value scopes shared by the instances
//! created in it. It also carries the runtime configuration, the class
//! registry and the scheduler used for merged listeners. Instances read
//! imported keys from their context and publish exported members into a
//! child context handed to the objects they create.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use crate::axiom::{Axiom, AxiomKind};
use crate::class::{Class, CompositionWarning};
use crate::config::RuntimeConfig;
use crate::errors::AxiomResult;
use crate::instance::WeakObj;
use crate::registry::ClassRegistry;
use crate::scheduler::{ManualScheduler, Scheduler};
use crate::value::Value;

#[derive(Clone)]
enum Entry {
    Value(Value),
    // Live view of a member of the exporting instance
    Export { owner: WeakObj, member: String },
}

struct ContextInner {
    parent: Option<Context>,
    entries: RefCell<HashMap<String, Entry>>,
    config: RuntimeConfig,
    registry: ClassRegistry,
    scheduler: Rc<dyn Scheduler>,
}

/// Scoped key/value environment for instances
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

thread_local! {
    static GLOBAL: Context = Context::new(ClassRegistry::global());
}

impl Context {
    /// Root context over `registry`, using its configuration and a
    /// [`ManualScheduler`]
    pub fn new(registry: ClassRegistry) -> Self {
        let config = registry.config().clone();
        Self::with_parts(registry, config, Rc::new(ManualScheduler::new()))
    }

    /// Root context with explicit configuration and scheduler
    pub fn with_parts(
        registry: ClassRegistry,
        config: RuntimeConfig,
        scheduler: Rc<dyn Scheduler>,
    ) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                parent: None,
                entries: RefCell::new(HashMap::new()),
                config,
                registry,
                scheduler,
            }),
        }
    }

    /// Root context over `registry` with a different scheduler
    pub fn with_scheduler(registry: ClassRegistry, scheduler: Rc<dyn Scheduler>) -> Self {
        let config = registry.config().clone();
        Self::with_parts(registry, config, scheduler)
    }

    /// The thread's default context, backed by the global registry
    pub fn global() -> Self {
        GLOBAL.with(Clone::clone)
    }

    /// Child scope; lookups fall back to `self`
    pub fn child(&self) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                parent: Some(self.clone()),
                entries: RefCell::new(HashMap::new()),
                config: self.inner.config.clone(),
                registry: self.inner.registry.clone(),
                scheduler: self.inner.scheduler.clone(),
            }),
        }
    }

    /// Child scope pre-populated with `values`
    pub fn sub_context<K, V>(&self, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let child = self.child();
        for (key, value) in values {
            child.register(key, value);
        }
        child
    }

    /// Bind `key` in this scope
    pub fn register(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .entries
            .borrow_mut()
            .insert(key.into(), Entry::Value(value.into()));
    }

    pub(crate) fn register_export(&self, key: impl Into<String>, owner: WeakObj, member: String) {
        self.inner
            .entries
            .borrow_mut()
            .insert(key.into(), Entry::Export { owner, member });
    }

    /// Resolve `key` in this scope or the nearest ancestor that binds it
    pub fn lookup(&self, key: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(ctx) = scope {
            let entry = ctx.inner.entries.borrow().get(key).cloned();
            match entry {
                Some(Entry::Value(value)) => return Some(value),
                Some(Entry::Export { owner, member }) => {
                    let value = owner.upgrade().and_then(|obj| obj.member_value(&member));
                    if value.is_some() {
                        return value;
                    }
                }
                None => {}
            }
            scope = ctx.inner.parent.as_ref();
        }
        None
    }

    /// Whether `key` resolves
    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Class registry
    pub fn registry(&self) -> &ClassRegistry {
        &self.inner.registry
    }

    /// Scheduler for merged listeners
    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        self.inner.scheduler.clone()
    }

    /// Parent scope
    pub fn parent(&self) -> Option<&Context> {
        self.inner.parent.as_ref()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.inner.entries.borrow().keys().cloned().collect();
        keys.sort();
        f.debug_struct("Context")
            .field("keys", &keys)
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

/// Declares a context key the class reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    name: String,
    key: String,
    optional: bool,
}

impl Import {
    /// Import `key` under the same name
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            optional: false,
        }
    }

    /// Import `key` under a local name
    pub fn aliased(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            optional: false,
        }
    }

    /// Resolve to `Undefined` instead of failing when the key is absent
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Context key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether a missing key is tolerated
    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

impl Axiom for Import {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AxiomKind {
        AxiomKind::Import
    }

    fn install_in_class(&self, class: &Class) -> AxiomResult<()> {
        let inherited = class
            .parent()
            .and_then(|parent| parent.axiom(&self.name))
            .filter(|axiom| axiom.as_any().downcast_ref::<Import>() == Some(self));
        let earlier = class
            .axioms_by_kind(AxiomKind::Import)
            .into_iter()
            .take_while(|axiom| axiom.name() != self.name)
            .find_map(|axiom| {
                axiom
                    .as_any()
                    .downcast_ref::<Import>()
                    .filter(|other| other.key == self.key && other.optional == self.optional)
                    .map(|other| other.name.clone())
            });

        let message = match (inherited, earlier) {
            (Some(_), _) => format!("'{}' redeclares the inherited import of '{}'", self.name, self.key),
            (None, Some(other)) => {
                format!("'{}' and '{other}' both import '{}'", self.name, self.key)
            }
            (None, None) => return Ok(()),
        };
        warn!(class = class.name(), %message, "duplicate import");
        class.record_warning(CompositionWarning::new(class.name(), &self.name, message));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Publishes a member of the instance into its sub-context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    axiom_name: String,
    member: String,
    key: String,
}

impl Export {
    /// Export `member` under its own name
    pub fn new(member: impl Into<String>) -> Self {
        let member = member.into();
        Self::aliased(member.clone(), member)
    }

    /// Export `member` as `key`
    pub fn aliased(member: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            axiom_name: format!("exports.{key}"),
            member: member.into(),
            key,
        }
    }

    /// Exported member
    pub fn member(&self) -> &str {
        &self.member
    }

    /// Key in the sub-context
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Axiom for Export {
    fn name(&self) -> &str {
        &self.axiom_name
    }

    fn kind(&self) -> AxiomKind {
        AxiomKind::Export
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_parent_scopes() {
        let root = Context::new(ClassRegistry::new());
        root.register("currency", "EUR");
        let child = root.sub_context([("locale", "de")]);

        assert_eq!(child.lookup("currency"), Some(Value::str("EUR")));
        assert_eq!(child.lookup("locale"), Some(Value::str("de")));
        assert_eq!(root.lookup("locale"), None);
    }

    #[test]
    fn test_child_shadows_parent() {
        let root = Context::new(ClassRegistry::new());
        root.register("mode", "live");
        let child = root.sub_context([("mode", "test")]);
        assert_eq!(child.lookup("mode"), Some(Value::str("test")));
        assert_eq!(root.lookup("mode"), Some(Value::str("live")));
    }

    #[test]
    fn test_child_inherits_config() {
        let registry = ClassRegistry::with_config(RuntimeConfig {
            divergence_threshold: 9,
            ..RuntimeConfig::default()
        });
        let root = Context::new(registry);
        assert_eq!(root.child().config().divergence_threshold, 9);
    }
}
