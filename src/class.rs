// Copyright 2025 Cowboy AI, LLC.

//! Classes and the axiom composer
//!
//! A [`Class`] owns an ordered axiom table whose lookups fall back to the
//! parent class, plus the per-class tables the axioms install into: property
//! accessors, methods, listeners and constants.
//!
//! ## Composition
//!
//! ```mermaid
//! graph TD
//!     M[Model axioms] --> V[validate + duplicate check]
//!     V --> R[resolve redeclarations against ancestors]
//!     R --> P1[pass 1: enter every axiom in the table]
//!     P1 --> P2[pass 2: install_in_class + install_in_proto in order]
//! ```
//!
//! A Property redeclared in a subclass is merged with the inherited one
//! (only the fields the subclass sets are replaced). Turning a Property into
//! any other kind of axiom, or the reverse, is rejected; other kind changes
//! and property type changes are accepted with a [`CompositionWarning`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::accessor::PropertyAccessor;
use crate::axiom::{downcast_axiom, Axiom, AxiomKind, AxiomRef};
use crate::config::RuntimeConfig;
use crate::context::Context;
use crate::errors::{AxiomError, AxiomResult};
use crate::instance::Obj;
use crate::method::{InstalledMethod, ListenerAxiom};
use crate::naming;
use crate::property::Property;
use crate::value::Value;

/// Numeric class identity
pub type ClassId = u64;

/// Hook receiving constructor arguments that match no property
pub type UnknownArgHook = Rc<dyn Fn(&Obj, &str, &Value) -> AxiomResult<()>>;

static NEXT_CLASS_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static INSTALL_EPOCH: Cell<u64> = const { Cell::new(0) };
}

fn install_epoch() -> u64 {
    INSTALL_EPOCH.with(Cell::get)
}

fn bump_install_epoch() {
    INSTALL_EPOCH.with(|epoch| epoch.set(epoch.get() + 1));
}

/// Non-fatal finding recorded while composing a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionWarning {
    /// Class being composed
    pub class: String,
    /// Axiom the warning is about
    pub axiom: String,
    /// Human readable description
    pub message: String,
}

impl CompositionWarning {
    /// Create a warning
    pub fn new(class: &str, axiom: &str, message: impl Into<String>) -> Self {
        Self {
            class: class.to_string(),
            axiom: axiom.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for CompositionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.class, self.axiom, self.message)
    }
}

#[derive(Clone)]
enum ClassConstant {
    Value(Value),
    Property(Rc<Property>),
}

struct Cache<K, V> {
    epoch: u64,
    entries: HashMap<K, V>,
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self {
            epoch: 0,
            entries: HashMap::new(),
        }
    }
}

impl<K: std::hash::Hash + Eq, V: Clone> Cache<K, V> {
    fn get(&mut self, key: &K) -> Option<V> {
        let epoch = install_epoch();
        if self.epoch != epoch {
            self.entries.clear();
            self.epoch = epoch;
        }
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }
}

struct ClassInner {
    id: ClassId,
    name: String,
    parent: Option<Class>,
    config: RuntimeConfig,
    axioms: RefCell<IndexMap<String, AxiomRef>>,
    properties: RefCell<IndexMap<String, Rc<Property>>>,
    accessors: RefCell<HashMap<String, PropertyAccessor>>,
    methods: RefCell<HashMap<String, InstalledMethod>>,
    listeners: RefCell<HashMap<String, Rc<ListenerAxiom>>>,
    constants: RefCell<IndexMap<String, ClassConstant>>,
    inner_classes: RefCell<IndexMap<String, Class>>,
    by_kind: RefCell<Cache<AxiomKind, Vec<AxiomRef>>>,
    sub_class_of: RefCell<Cache<ClassId, bool>>,
    count: Cell<u64>,
    warnings: RefCell<Vec<CompositionWarning>>,
    unknown_arg_hook: RefCell<Option<UnknownArgHook>>,
}

/// Class tables as they were before an install, restored if it fails
struct TableSnapshot {
    axioms: IndexMap<String, AxiomRef>,
    properties: IndexMap<String, Rc<Property>>,
    accessors: HashMap<String, PropertyAccessor>,
    methods: HashMap<String, InstalledMethod>,
    listeners: HashMap<String, Rc<ListenerAxiom>>,
    constants: IndexMap<String, ClassConstant>,
    inner_classes: IndexMap<String, Class>,
    unknown_arg_hook: Option<UnknownArgHook>,
}

/// A composed class
#[derive(Clone)]
pub struct Class {
    inner: Rc<ClassInner>,
}

impl Class {
    pub(crate) fn new(name: impl Into<String>, parent: Option<Class>, config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(ClassInner {
                id: NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed),
                name: name.into(),
                parent,
                config,
                axioms: RefCell::new(IndexMap::new()),
                properties: RefCell::new(IndexMap::new()),
                accessors: RefCell::new(HashMap::new()),
                methods: RefCell::new(HashMap::new()),
                listeners: RefCell::new(HashMap::new()),
                constants: RefCell::new(IndexMap::new()),
                inner_classes: RefCell::new(IndexMap::new()),
                by_kind: RefCell::new(Cache::default()),
                sub_class_of: RefCell::new(Cache::default()),
                count: Cell::new(0),
                warnings: RefCell::new(Vec::new()),
                unknown_arg_hook: RefCell::new(None),
            }),
        }
    }

    /// Compose a new class from `axioms` on top of `parent`
    pub(crate) fn compose(
        name: &str,
        parent: Option<Class>,
        config: RuntimeConfig,
        axioms: Vec<AxiomRef>,
    ) -> AxiomResult<Class> {
        let class = Class::new(name, parent, config);
        class.install(axioms)?;
        debug!(
            class = name,
            parent = class.parent().map(Class::name),
            axioms = class.inner.axioms.borrow().len(),
            "class composed"
        );
        Ok(class)
    }

    /// Install the axioms of one model: validate, resolve redeclarations,
    /// enter them all, then run their hooks in declaration order.
    pub(crate) fn install(&self, axioms: Vec<AxiomRef>) -> AxiomResult<()> {
        let mut seen = std::collections::HashSet::new();
        let mut prepared = Vec::with_capacity(axioms.len());
        for axiom in axioms {
            axiom.validate()?;
            if axiom.kind() == AxiomKind::Property {
                naming::validate_property_name(axiom.name(), &self.inner.config.reserved_name_suffix)?;
            }
            if !seen.insert(axiom.name().to_string()) {
                return Err(AxiomError::DuplicateAxiom {
                    class: self.name().to_string(),
                    name: axiom.name().to_string(),
                });
            }
            prepared.push(self.resolve_redeclaration(axiom)?);
        }

        let snapshot = self.snapshot();
        {
            let mut table = self.inner.axioms.borrow_mut();
            for axiom in &prepared {
                table.insert(axiom.name().to_string(), axiom.clone());
            }
        }
        bump_install_epoch();

        let installed = prepared.iter().try_for_each(|axiom| {
            axiom.install_in_class(self)?;
            axiom.install_in_proto(self)
        });
        if let Err(ref err) = installed {
            debug!(class = self.name(), error = %err, "install failed, restoring tables");
            self.restore(snapshot);
        }
        bump_install_epoch();
        installed
    }

    fn snapshot(&self) -> TableSnapshot {
        let inner = &self.inner;
        TableSnapshot {
            axioms: inner.axioms.borrow().clone(),
            properties: inner.properties.borrow().clone(),
            accessors: inner.accessors.borrow().clone(),
            methods: inner.methods.borrow().clone(),
            listeners: inner.listeners.borrow().clone(),
            constants: inner.constants.borrow().clone(),
            inner_classes: inner.inner_classes.borrow().clone(),
            unknown_arg_hook: inner.unknown_arg_hook.borrow().clone(),
        }
    }

    fn restore(&self, snapshot: TableSnapshot) {
        let inner = &self.inner;
        *inner.axioms.borrow_mut() = snapshot.axioms;
        *inner.properties.borrow_mut() = snapshot.properties;
        *inner.accessors.borrow_mut() = snapshot.accessors;
        *inner.methods.borrow_mut() = snapshot.methods;
        *inner.listeners.borrow_mut() = snapshot.listeners;
        *inner.constants.borrow_mut() = snapshot.constants;
        *inner.inner_classes.borrow_mut() = snapshot.inner_classes;
        *inner.unknown_arg_hook.borrow_mut() = snapshot.unknown_arg_hook;
    }

    fn resolve_redeclaration(&self, axiom: AxiomRef) -> AxiomResult<AxiomRef> {
        let Some(previous) = self.axiom(axiom.name()) else {
            return Ok(axiom);
        };
        let (inherited, declared) = (previous.kind(), axiom.kind());

        if inherited == AxiomKind::Property && declared == AxiomKind::Property {
            match (previous.subtype(), axiom.subtype()) {
                (Some(old), Some(new)) if old != new => self.warn(
                    axiom.name(),
                    format!("property type changes from {old} to {new}"),
                ),
                (None, Some(new)) => {
                    self.warn(axiom.name(), format!("untyped property becomes {new}"))
                }
                _ => {}
            }
            let merged = match (
                downcast_axiom::<Property>(&previous),
                downcast_axiom::<Property>(&axiom),
            ) {
                (Some(parent), Some(child)) => Some(Rc::new(child.inherit_from(parent)) as AxiomRef),
                _ => None,
            };
            return Ok(merged.unwrap_or(axiom));
        }

        if inherited == AxiomKind::Property || declared == AxiomKind::Property {
            return Err(AxiomError::IncompatibleOverride {
                class: self.name().to_string(),
                name: axiom.name().to_string(),
                inherited: inherited.label().to_string(),
                declared: declared.label().to_string(),
            });
        }

        if inherited != declared {
            self.warn(
                axiom.name(),
                format!("{} redeclared as {}", inherited.label(), declared.label()),
            );
        }
        Ok(axiom)
    }

    fn warn(&self, axiom: &str, message: String) {
        warn!(class = self.name(), axiom, %message, "axiom redeclared");
        self.record_warning(CompositionWarning::new(self.name(), axiom, message));
    }

    /// Numeric identity
    pub fn id(&self) -> ClassId {
        self.inner.id
    }

    /// Fully-qualified dotted name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Last segment of the qualified name
    pub fn short_name(&self) -> &str {
        naming::short_name(&self.inner.name)
    }

    /// Package of the qualified name
    pub fn package(&self) -> &str {
        naming::package(&self.inner.name)
    }

    /// Parent class
    pub fn parent(&self) -> Option<&Class> {
        self.inner.parent.as_ref()
    }

    /// Configuration the class was composed with
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Classes from `self` up to the root
    pub fn ancestry(&self) -> impl Iterator<Item = &Class> {
        std::iter::successors(Some(self), |class| class.parent())
    }

    /// Axiom by name, falling back to ancestors
    pub fn axiom(&self, name: &str) -> Option<AxiomRef> {
        self.ancestry()
            .find_map(|class| class.inner.axioms.borrow().get(name).cloned())
    }

    /// Whether `name` is declared on this class itself
    pub fn has_own_axiom(&self, name: &str) -> bool {
        self.inner.axioms.borrow().contains_key(name)
    }

    /// Axioms declared on this class, in declaration order
    pub fn own_axioms(&self) -> Vec<AxiomRef> {
        self.inner.axioms.borrow().values().cloned().collect()
    }

    /// Every visible axiom: ancestors first, redeclarations in place
    pub fn axioms(&self) -> Vec<AxiomRef> {
        let chain: Vec<&Class> = self.ancestry().collect();
        let mut merged: IndexMap<String, AxiomRef> = IndexMap::new();
        for class in chain.into_iter().rev() {
            for (name, axiom) in class.inner.axioms.borrow().iter() {
                merged.insert(name.clone(), axiom.clone());
            }
        }
        merged.into_values().collect()
    }

    /// Visible axioms of one kind; cached until the next installation
    pub fn axioms_by_kind(&self, kind: AxiomKind) -> Vec<AxiomRef> {
        if let Some(hit) = self.inner.by_kind.borrow_mut().get(&kind) {
            return hit;
        }
        let found: Vec<AxiomRef> = self
            .axioms()
            .into_iter()
            .filter(|axiom| axiom.kind() == kind)
            .collect();
        self.inner.by_kind.borrow_mut().insert(kind, found.clone());
        found
    }

    /// Whether `self` is `other`, descends from it, or implements it
    pub fn is_sub_class(&self, other: &Class) -> bool {
        if self.id() == other.id() {
            return true;
        }
        if let Some(hit) = self.inner.sub_class_of.borrow_mut().get(&other.id()) {
            return hit;
        }
        let result = self.ancestry().any(|class| class.id() == other.id())
            || self
                .axioms_by_kind(AxiomKind::Implements)
                .iter()
                .filter_map(|axiom| downcast_axiom::<crate::markers::Implements>(axiom))
                .any(|implements| implements.interface().is_sub_class(other));
        self.inner.sub_class_of.borrow_mut().insert(other.id(), result);
        result
    }

    /// Whether `obj` is an instance of this class or a subclass
    pub fn is_instance(&self, obj: &Obj) -> bool {
        obj.class().is_sub_class(self)
    }

    /// Effective property declaration, falling back to ancestors
    pub fn property(&self, name: &str) -> Option<Rc<Property>> {
        self.ancestry()
            .find_map(|class| class.inner.properties.borrow().get(name).cloned())
    }

    pub(crate) fn own_property(&self, name: &str) -> Option<Rc<Property>> {
        self.inner.properties.borrow().get(name).cloned()
    }

    /// Every visible property, ancestors first
    pub fn properties(&self) -> Vec<Rc<Property>> {
        self.axioms_by_kind(AxiomKind::Property)
            .iter()
            .filter_map(|axiom| self.property(axiom.name()))
            .collect()
    }

    /// Accessor pair for `name`
    pub fn accessor(&self, name: &str) -> Option<PropertyAccessor> {
        self.ancestry()
            .find_map(|class| class.inner.accessors.borrow().get(name).cloned())
    }

    /// Property bound to a derived constant (`FIRST_NAME`)
    pub fn property_constant(&self, constant: &str) -> Option<Rc<Property>> {
        match self.lookup_constant(constant) {
            Some(ClassConstant::Property(property)) => Some(property),
            _ => None,
        }
    }

    /// Value of a declared constant
    pub fn constant(&self, name: &str) -> Option<Value> {
        match self.lookup_constant(name) {
            Some(ClassConstant::Value(value)) => Some(value),
            _ => None,
        }
    }

    fn lookup_constant(&self, name: &str) -> Option<ClassConstant> {
        self.ancestry()
            .find_map(|class| class.inner.constants.borrow().get(name).cloned())
    }

    /// Installed method, including inherited ones not shadowed by another kind
    pub fn find_method(&self, name: &str) -> Option<InstalledMethod> {
        if self.axiom(name)?.kind() != AxiomKind::Method {
            return None;
        }
        self.ancestry()
            .find_map(|class| class.inner.methods.borrow().get(name).cloned())
    }

    /// Installed listener declaration
    pub fn find_listener(&self, name: &str) -> Option<Rc<ListenerAxiom>> {
        if self.axiom(name)?.kind() != AxiomKind::Listener {
            return None;
        }
        self.ancestry()
            .find_map(|class| class.inner.listeners.borrow().get(name).cloned())
    }

    /// Nested class registered under `name`
    pub fn inner_class(&self, name: &str) -> Option<Class> {
        self.ancestry()
            .find_map(|class| class.inner.inner_classes.borrow().get(name).cloned())
    }

    /// Number of instances created
    pub fn count(&self) -> u64 {
        self.inner.count.get()
    }

    /// Warnings recorded while composing this class
    pub fn warnings(&self) -> Vec<CompositionWarning> {
        self.inner.warnings.borrow().clone()
    }

    pub(crate) fn record_warning(&self, warning: CompositionWarning) {
        self.inner.warnings.borrow_mut().push(warning);
    }

    pub(crate) fn insert_property(&self, property: Rc<Property>) {
        self.inner
            .properties
            .borrow_mut()
            .insert(property.name().to_string(), property);
    }

    pub(crate) fn insert_accessor(&self, accessor: PropertyAccessor) {
        self.inner
            .accessors
            .borrow_mut()
            .insert(accessor.name().to_string(), accessor);
    }

    pub(crate) fn insert_method(&self, method: InstalledMethod) {
        self.inner
            .methods
            .borrow_mut()
            .insert(method.name().to_string(), method);
    }

    pub(crate) fn insert_listener(&self, listener: Rc<ListenerAxiom>) {
        self.inner
            .listeners
            .borrow_mut()
            .insert(listener.name().to_string(), listener);
    }

    /// Define a plain constant. A property-derived constant of the same name
    /// is kept and the declaration is reported as a warning.
    pub(crate) fn define_constant(&self, name: &str, value: Value) {
        if let Some(ClassConstant::Property(property)) = self.lookup_constant(name) {
            self.warn(
                name,
                format!("constant shadowed by the constant of property '{}'", property.name()),
            );
            return;
        }
        self.inner
            .constants
            .borrow_mut()
            .insert(name.to_string(), ClassConstant::Value(value));
    }

    /// Publish the derived constant for `property`; two different properties
    /// may not derive the same constant.
    pub(crate) fn define_property_constant(&self, property: &Rc<Property>) -> AxiomResult<()> {
        let constant = naming::constant_name(property.name());
        if let Some(ClassConstant::Property(existing)) = self.lookup_constant(&constant) {
            if existing.name() != property.name() {
                return Err(AxiomError::ConstantCollision {
                    constant,
                    property: property.name().to_string(),
                    existing: existing.name().to_string(),
                });
            }
        }
        self.inner
            .constants
            .borrow_mut()
            .insert(constant, ClassConstant::Property(property.clone()));
        Ok(())
    }

    pub(crate) fn add_inner_class(&self, name: &str, class: Class) {
        self.inner
            .inner_classes
            .borrow_mut()
            .insert(name.to_string(), class);
    }

    pub(crate) fn set_unknown_arg_hook(&self, hook: UnknownArgHook) {
        *self.inner.unknown_arg_hook.borrow_mut() = Some(hook);
    }

    fn unknown_arg_hook(&self) -> Option<UnknownArgHook> {
        self.ancestry()
            .find_map(|class| class.inner.unknown_arg_hook.borrow().clone())
    }

    /// Create an instance in the thread's global context
    pub fn create<K, V>(&self, args: impl IntoIterator<Item = (K, V)>) -> AxiomResult<Obj>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.create_in(args, &Context::global())
    }

    /// Create an instance with no arguments in the global context
    pub fn create_empty(&self) -> AxiomResult<Obj> {
        self.create_in(Vec::<(&str, Value)>::new(), &Context::global())
    }

    /// Create an instance in the sub-context exported by `parent`
    pub fn create_child<K, V>(
        &self,
        args: impl IntoIterator<Item = (K, V)>,
        parent: &Obj,
    ) -> AxiomResult<Obj>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.create_in(args, &parent.subcontext())
    }

    /// Create an instance from a JSON object of arguments
    pub fn create_from_json(&self, json: &serde_json::Value, context: &Context) -> AxiomResult<Obj> {
        let args: Vec<(String, Value)> = match json {
            serde_json::Value::Object(entries) => entries
                .iter()
                .filter(|(key, _)| key.as_str() != "class")
                .map(|(key, value)| (key.clone(), Value::from_json(value)))
                .collect(),
            serde_json::Value::Null => Vec::new(),
            other => {
                return Err(AxiomError::Serialization(format!(
                    "expected an object of arguments for {}, got {other}",
                    self.name()
                )))
            }
        };
        self.create_in(args, context)
    }

    /// Create an instance in `context`.
    ///
    /// Arguments naming a property are written through the normal write
    /// pipeline in the order given. Unknown keys go to the class's
    /// unknown-argument hook if one is declared, are rejected when the
    /// context is configured with `strict_constructor_args`, and are
    /// otherwise logged and ignored. An `init` method runs last.
    pub fn create_in<K, V>(
        &self,
        args: impl IntoIterator<Item = (K, V)>,
        context: &Context,
    ) -> AxiomResult<Obj>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let obj = Obj::new(self.clone(), context.clone());
        for (key, value) in args {
            let key = key.as_ref();
            let value = value.into();
            if self.accessor(key).is_some() {
                obj.set(key, value)?;
            } else if let Some(hook) = self.unknown_arg_hook() {
                hook(&obj, key, &value)?;
            } else if context.config().strict_constructor_args {
                return Err(AxiomError::UnknownAxiom {
                    class: self.name().to_string(),
                    name: key.to_string(),
                });
            } else {
                warn!(class = self.name(), arg = key, "unknown constructor argument");
            }
        }
        if let Some(init) = self.find_method("init") {
            init.call(&obj, &[])?;
        }
        self.inner.count.set(self.inner.count.get() + 1);
        Ok(obj)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Class {}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("parent", &self.parent().map(Class::name))
            .field("axioms", &self.inner.axioms.borrow().len())
            .finish()
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
