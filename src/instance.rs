// Copyright 2025 Cowboy AI, LLC.

//! Instances of composed classes
//!
//! An [`Obj`] holds two stores. The instance store contains only properties
//! that were explicitly set or materialized by a factory; `has_own_property`
//! reads it. The private side table holds runtime bookkeeping (expression
//! caches and their dependency subscriptions, factory re-entrancy guards,
//! pending merged-listener events, the exported sub-context) and is never
//! visible as a property.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::accessor;
use crate::axiom::{downcast_axiom, AxiomKind};
use crate::class::Class;
use crate::context::{Context, Export, Import};
use crate::errors::{AxiomError, AxiomResult};
use crate::observer_bus::{Event, Listener, ObserverBus};
use crate::slot::Slot;
use crate::subscription::Subscription;
use crate::topic::TopicHandle;
use crate::value::Value;

#[derive(Default)]
pub(crate) struct PrivateState {
    pub(crate) expression_cache: HashMap<String, Value>,
    pub(crate) expression_subs: HashMap<String, Subscription>,
    pub(crate) factory_in_progress: HashSet<String>,
    pub(crate) expression_in_progress: HashSet<String>,
    pub(crate) merged_pending: HashMap<String, Event>,
    pub(crate) on_detach: Vec<Subscription>,
    pub(crate) subcontext: Option<Context>,
    pub(crate) values: HashMap<String, Value>,
}

pub(crate) struct ObjInner {
    id: Uuid,
    class: Class,
    context: Context,
    instance: RefCell<IndexMap<String, Value>>,
    private: RefCell<PrivateState>,
    bus: ObserverBus,
    detached: Cell<bool>,
}

/// Instance handle; clones share the same instance
#[derive(Clone)]
pub struct Obj {
    inner: Rc<ObjInner>,
}

/// Non-owning instance handle
#[derive(Clone)]
pub struct WeakObj(Weak<ObjInner>);

impl WeakObj {
    /// Recover the instance if it is still alive
    pub fn upgrade(&self) -> Option<Obj> {
        self.0.upgrade().map(|inner| Obj { inner })
    }
}

impl fmt::Debug for WeakObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObj")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}

impl Obj {
    pub(crate) fn new(class: Class, context: Context) -> Self {
        Self {
            inner: Rc::new(ObjInner {
                id: Uuid::new_v4(),
                class,
                context,
                instance: RefCell::new(IndexMap::new()),
                private: RefCell::new(PrivateState::default()),
                bus: ObserverBus::new(),
                detached: Cell::new(false),
            }),
        }
    }

    /// Instance identity
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Class of the instance
    pub fn class(&self) -> &Class {
        &self.inner.class
    }

    /// Context the instance was created in
    pub fn context(&self) -> &Context {
        &self.inner.context
    }

    /// Whether both handles point at the same instance
    pub fn ptr_eq(&self, other: &Obj) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Non-owning handle
    pub fn downgrade(&self) -> WeakObj {
        WeakObj(Rc::downgrade(&self.inner))
    }

    fn unknown(&self, name: &str) -> AxiomError {
        AxiomError::UnknownAxiom {
            class: self.class().name().to_string(),
            name: name.to_string(),
        }
    }

    // ---- properties ----

    /// Read a property
    pub fn get(&self, name: &str) -> AxiomResult<Value> {
        let accessor = self.class().accessor(name).ok_or_else(|| self.unknown(name))?;
        accessor.read(self)
    }

    /// Write a property through its write pipeline
    pub fn set(&self, name: &str, value: impl Into<Value>) -> AxiomResult<()> {
        let accessor = self.class().accessor(name).ok_or_else(|| self.unknown(name))?;
        accessor.write(self, value.into())
    }

    /// Reset a property to its default, notifying listeners
    pub fn clear_property(&self, name: &str) -> AxiomResult<()> {
        let axiom = self.class().axiom(name).ok_or_else(|| self.unknown(name))?;
        if axiom.kind() != AxiomKind::Property {
            return Err(AxiomError::ClearNonProperty(name.to_string()));
        }
        let accessor = self.class().accessor(name).ok_or_else(|| self.unknown(name))?;
        accessor::clear(self, accessor.property())
    }

    /// Whether the property holds an explicit (or factory-made) value
    pub fn has_own_property(&self, name: &str) -> bool {
        self.inner.instance.borrow().contains_key(name)
    }

    /// Explicitly set properties in the order they were first set
    pub fn own_properties(&self) -> Vec<(String, Value)> {
        self.inner
            .instance
            .borrow()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Slot over a property
    pub fn slot(&self, name: &str) -> AxiomResult<Slot> {
        if self.class().accessor(name).is_none() {
            return Err(self.unknown(name));
        }
        Ok(Slot::property(self.clone(), name))
    }

    pub(crate) fn stored(&self, name: &str) -> Option<Value> {
        self.inner.instance.borrow().get(name).cloned()
    }

    pub(crate) fn store(&self, name: &str, value: Value) {
        self.inner.instance.borrow_mut().insert(name.to_string(), value);
    }

    pub(crate) fn unstore(&self, name: &str) -> Option<Value> {
        self.inner.instance.borrow_mut().shift_remove(name)
    }

    pub(crate) fn private(&self) -> Ref<'_, PrivateState> {
        self.inner.private.borrow()
    }

    pub(crate) fn private_mut(&self) -> RefMut<'_, PrivateState> {
        self.inner.private.borrow_mut()
    }

    /// Runtime value kept outside the property store
    pub fn private_value(&self, key: &str) -> Option<Value> {
        self.private().values.get(key).cloned()
    }

    /// Store a runtime value outside the property store
    pub fn set_private_value(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.private_mut().values.insert(key.into(), value.into());
    }

    /// Drop a runtime value
    pub fn clear_private_value(&self, key: &str) -> Option<Value> {
        self.private_mut().values.remove(key)
    }

    // ---- events ----

    /// Subscribe to `topic` on this instance
    pub fn sub(&self, topic: &[&str], callback: Listener) -> Subscription {
        if self.is_detached() {
            debug!(class = self.class().name(), "subscription on detached instance ignored");
            let sub = Subscription::noop();
            sub.detach();
            return sub;
        }
        self.inner.bus.sub(topic, callback)
    }

    /// Publish on `topic`; returns how many listeners ran
    pub fn publish(&self, topic: &[&str], args: Vec<Value>) -> AxiomResult<usize> {
        self.inner.bus.publish(topic, args)
    }

    /// Whether publishing on `topic` would reach a listener
    pub fn has_listeners(&self, topic: &[&str]) -> bool {
        self.inner.bus.has_listeners(topic)
    }

    /// Topic handle for a declared topic or `propertyChange`
    pub fn topic(&self, name: &str) -> AxiomResult<TopicHandle> {
        TopicHandle::resolve(self, name)
    }

    /// Bound form of a Listener axiom, suitable for `sub`
    pub fn listener(&self, name: &str) -> AxiomResult<Listener> {
        let decl = self.class().find_listener(name).ok_or_else(|| self.unknown(name))?;
        Ok(decl.bind(self))
    }

    /// Release `sub` when this instance is detached
    pub fn on_detach(&self, sub: Subscription) {
        if self.is_detached() {
            sub.detach();
            return;
        }
        self.private_mut().on_detach.push(sub);
    }

    /// Release every subscription owned by or registered on this instance
    pub fn detach(&self) {
        if self.inner.detached.replace(true) {
            return;
        }
        let owned: Vec<Subscription> = {
            let mut private = self.private_mut();
            private.expression_cache.clear();
            private.merged_pending.clear();
            private.subcontext = None;
            let mut owned: Vec<Subscription> = private.on_detach.drain(..).collect();
            owned.extend(private.expression_subs.drain().map(|(_, sub)| sub));
            owned
        };
        for sub in owned {
            sub.detach();
        }
        self.inner.bus.detach_all();
        debug!(class = self.class().name(), id = %self.id(), "instance detached");
    }

    /// Whether `detach` has run
    pub fn is_detached(&self) -> bool {
        self.inner.detached.get()
    }

    // ---- behaviour ----

    /// Invoke a method
    pub fn call(&self, name: &str, args: &[Value]) -> AxiomResult<Value> {
        if self.is_detached() {
            return Err(AxiomError::InstanceDetached(format!(
                "{}.{name}",
                self.class().name()
            )));
        }
        let method = self.class().find_method(name).ok_or_else(|| self.unknown(name))?;
        method.call(self, args)
    }

    /// Class constant
    pub fn constant(&self, name: &str) -> Option<Value> {
        self.class().constant(name)
    }

    // ---- context ----

    /// Resolve an Import axiom against the instance's context
    pub fn import(&self, name: &str) -> AxiomResult<Value> {
        let axiom = self.class().axiom(name).ok_or_else(|| self.unknown(name))?;
        let import = downcast_axiom::<Import>(&axiom).ok_or_else(|| self.unknown(name))?;
        match self.context().lookup(import.key()) {
            Some(value) => Ok(value),
            None if import.is_optional() => Ok(Value::Undefined),
            None => Err(AxiomError::UnknownImport(import.key().to_string())),
        }
    }

    /// Child context carrying this instance's exports
    pub fn subcontext(&self) -> Context {
        if let Some(existing) = self.private().subcontext.clone() {
            return existing;
        }
        let exports = self.class().axioms_by_kind(AxiomKind::Export);
        let context = self.context().child();
        for axiom in &exports {
            if let Some(export) = downcast_axiom::<Export>(axiom) {
                context.register_export(export.key(), self.downgrade(), export.member().to_string());
            }
        }
        if !exports.is_empty() && !self.is_detached() {
            self.private_mut().subcontext = Some(context.clone());
        }
        context
    }

    /// Value of a property or constant, used for exports
    pub(crate) fn member_value(&self, name: &str) -> Option<Value> {
        if self.class().accessor(name).is_some() {
            return match self.get(name) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(member = name, error = %err, "exported member could not be read");
                    None
                }
            };
        }
        self.constant(name)
    }

    // ---- utilities ----

    /// Copy every explicitly set property of `other` that this class also
    /// declares
    pub fn copy_from(&self, other: &Obj) -> AxiomResult<()> {
        for (name, value) in other.own_properties() {
            if self.class().accessor(&name).is_some() {
                self.set(&name, value)?;
            }
        }
        Ok(())
    }

    /// New instance of the same class with the same explicit values
    pub fn clone_obj(&self) -> AxiomResult<Obj> {
        self.class().create_in(self.own_properties(), self.context())
    }

    /// Order by class name, then by each declared property in turn
    pub fn compare_to(&self, other: &Obj) -> Ordering {
        if self.ptr_eq(other) {
            return Ordering::Equal;
        }
        let by_class = self.class().name().cmp(other.class().name());
        if by_class != Ordering::Equal {
            return by_class;
        }
        for property in self.class().properties() {
            let ord = property.compare(self, other).unwrap_or_else(|err| {
                warn!(property = property.name(), error = %err, "comparison read failed");
                Ordering::Equal
            });
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Whether `compare_to` finds no difference
    pub fn equals(&self, other: &Obj) -> bool {
        self.compare_to(other) == Ordering::Equal
    }

    /// Properties whose values differ, mapped to `other`'s value
    pub fn diff(&self, other: &Obj) -> AxiomResult<BTreeMap<String, Value>> {
        let mut changes = BTreeMap::new();
        for property in self.class().properties() {
            let name = property.name();
            if other.class().accessor(name).is_none() {
                continue;
            }
            let (mine, theirs) = (self.get(name)?, other.get(name)?);
            if mine != theirs {
                changes.insert(name.to_string(), theirs);
            }
        }
        Ok(changes)
    }

    /// JSON object with the class name and every explicitly set property
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(
            "class".to_string(),
            serde_json::Value::String(self.class().name().to_string()),
        );
        for (name, value) in self.own_properties() {
            map.insert(name, value.to_json());
        }
        serde_json::Value::Object(map)
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Obj")
            .field("class", &self.class().name())
            .field("id", &self.inner.id)
            .field("detached", &self.is_detached())
            .finish()
    }
}
