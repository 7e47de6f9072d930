// Copyright 2025 Cowboy AI, LLC.

//! Slots: observable single-value cells
//!
//! Every slot offers `get`, `set` and `sub`; `sub` listeners run whenever the
//! value may have changed. Variants:
//!
//! - property slots delegate to one property of one instance
//! - [`ExpressionSlot`] caches `code(args...)` and invalidates on any argument
//!   change without recomputing until the next read
//! - constant slots never change and reject writes
//! - sub-property slots (`dot`) track a property of whatever object another
//!   slot currently holds
//!
//! The linking combinators live in [`crate::link`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::accessor::PROPERTY_CHANGE;
use crate::config::RuntimeConfig;
use crate::errors::{AxiomError, AxiomResult};
use crate::instance::Obj;
use crate::observer_bus::{listener, Listener, ObserverBus};
use crate::subscription::Subscription;
use crate::value::Value;

/// Behaviour behind a [`Slot`]
pub trait SlotSource {
    /// Current value
    fn get(&self) -> AxiomResult<Value>;
    /// Replace the value
    fn set(&self, value: Value) -> AxiomResult<()>;
    /// Listen for possible changes
    fn sub(&self, callback: Listener) -> Subscription;
    /// Feedback depth allowed in `relate_to` before reporting divergence
    fn divergence_threshold(&self) -> usize {
        RuntimeConfig::default().divergence_threshold
    }
    /// Short description used in error messages
    fn describe(&self) -> String;
}

/// Shared handle to an observable cell
#[derive(Clone)]
pub struct Slot(Rc<dyn SlotSource>);

impl Slot {
    /// Wrap a custom source
    pub fn new(source: impl SlotSource + 'static) -> Self {
        Self(Rc::new(source))
    }

    /// Slot over `obj.name`; the property is not checked
    pub fn property(obj: Obj, name: impl Into<String>) -> Self {
        Self::new(PropertySlot {
            obj,
            name: name.into(),
        })
    }

    /// Immutable slot
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::new(ConstantSlot(value.into()))
    }

    /// Derived slot over `args`
    pub fn expression(args: Vec<Slot>, code: impl Fn(&[Value]) -> Value + 'static) -> Self {
        ExpressionSlot::new(args, code).slot()
    }

    /// Current value
    pub fn get(&self) -> AxiomResult<Value> {
        self.0.get()
    }

    /// Replace the value
    pub fn set(&self, value: impl Into<Value>) -> AxiomResult<()> {
        self.0.set(value.into())
    }

    /// Listen for possible changes
    pub fn sub(&self, callback: Listener) -> Subscription {
        self.0.sub(callback)
    }

    pub(crate) fn divergence_threshold(&self) -> usize {
        self.0.divergence_threshold()
    }

    /// Whether both handles share a source
    pub fn ptr_eq(&self, other: &Slot) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Derived slot holding `f(self)`
    pub fn map(&self, f: impl Fn(&Value) -> Value + 'static) -> Slot {
        Slot::expression(vec![self.clone()], move |args| f(&args[0]))
    }

    /// Slot over property `name` of the object this slot holds
    pub fn dot(&self, name: impl Into<String>) -> Slot {
        Slot::new(SubSlot::new(self.clone(), name.into()))
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({})", self.0.describe())
    }
}

struct PropertySlot {
    obj: Obj,
    name: String,
}

impl SlotSource for PropertySlot {
    fn get(&self) -> AxiomResult<Value> {
        self.obj.get(&self.name)
    }

    fn set(&self, value: Value) -> AxiomResult<()> {
        self.obj.set(&self.name, value)
    }

    fn sub(&self, callback: Listener) -> Subscription {
        self.obj.sub(&[PROPERTY_CHANGE, self.name.as_str()], callback)
    }

    fn divergence_threshold(&self) -> usize {
        self.obj.context().config().divergence_threshold
    }

    fn describe(&self) -> String {
        format!("{}.{}", self.obj.class().name(), self.name)
    }
}

struct ConstantSlot(Value);

impl SlotSource for ConstantSlot {
    fn get(&self) -> AxiomResult<Value> {
        Ok(self.0.clone())
    }

    fn set(&self, _value: Value) -> AxiomResult<()> {
        Err(AxiomError::ImmutableSlot(self.describe()))
    }

    fn sub(&self, _callback: Listener) -> Subscription {
        Subscription::noop()
    }

    fn describe(&self) -> String {
        format!("constant {}", self.0)
    }
}

struct ExpressionInner {
    args: Vec<Slot>,
    code: Rc<dyn Fn(&[Value]) -> Value>,
    cache: RefCell<Option<Value>>,
    bus: ObserverBus,
    watchers: RefCell<Option<Subscription>>,
    computations: Cell<u64>,
}

impl ExpressionInner {
    fn invalidate(&self) -> AxiomResult<()> {
        self.cache.borrow_mut().take();
        self.bus.publish(&[], Vec::new())?;
        Ok(())
    }
}

impl Drop for ExpressionInner {
    fn drop(&mut self) {
        if let Some(watchers) = self.watchers.get_mut().take() {
            watchers.detach();
        }
    }
}

/// Derived slot: `code(arg1, arg2, ...)`, computed on demand and cached
#[derive(Clone)]
pub struct ExpressionSlot {
    inner: Rc<ExpressionInner>,
}

impl ExpressionSlot {
    /// Derive from `args`; argument changes invalidate the cache and notify
    /// this slot's listeners immediately
    pub fn new(args: Vec<Slot>, code: impl Fn(&[Value]) -> Value + 'static) -> Self {
        let inner = Rc::new(ExpressionInner {
            args,
            code: Rc::new(code),
            cache: RefCell::new(None),
            bus: ObserverBus::new(),
            watchers: RefCell::new(None),
            computations: Cell::new(0),
        });
        let watchers = Subscription::group(inner.args.iter().map(|arg| {
            let weak: Weak<ExpressionInner> = Rc::downgrade(&inner);
            arg.sub(listener(move |_, _| match weak.upgrade() {
                Some(inner) => inner.invalidate(),
                None => Ok(()),
            }))
        }));
        *inner.watchers.borrow_mut() = Some(watchers);
        Self { inner }
    }

    /// How many times `code` has run
    pub fn computations(&self) -> u64 {
        self.inner.computations.get()
    }

    /// Stop watching the arguments
    pub fn detach(&self) {
        let watchers = self.inner.watchers.borrow_mut().take();
        if let Some(watchers) = watchers {
            watchers.detach();
        }
    }

    /// Shareable slot handle
    pub fn slot(&self) -> Slot {
        Slot(Rc::new(self.clone()))
    }
}

impl SlotSource for ExpressionSlot {
    fn get(&self) -> AxiomResult<Value> {
        if let Some(cached) = self.inner.cache.borrow().clone() {
            return Ok(cached);
        }
        let args = self
            .inner
            .args
            .iter()
            .map(Slot::get)
            .collect::<AxiomResult<Vec<_>>>()?;
        let value = (self.inner.code)(&args);
        self.inner.computations.set(self.inner.computations.get() + 1);
        *self.inner.cache.borrow_mut() = Some(value.clone());
        Ok(value)
    }

    fn set(&self, _value: Value) -> AxiomResult<()> {
        Err(AxiomError::ImmutableSlot(self.describe()))
    }

    fn sub(&self, callback: Listener) -> Subscription {
        self.inner.bus.sub(&[], callback)
    }

    fn divergence_threshold(&self) -> usize {
        self.inner
            .args
            .first()
            .map(Slot::divergence_threshold)
            .unwrap_or_else(|| RuntimeConfig::default().divergence_threshold)
    }

    fn describe(&self) -> String {
        format!("expression over {} slot(s)", self.inner.args.len())
    }
}

impl From<ExpressionSlot> for Slot {
    fn from(expression: ExpressionSlot) -> Self {
        expression.slot()
    }
}

struct SubSlotInner {
    parent: Slot,
    name: String,
    bus: ObserverBus,
    parent_sub: RefCell<Option<Subscription>>,
    target_sub: RefCell<Option<Subscription>>,
}

impl SubSlotInner {
    // Re-point the property subscription at whatever object the parent holds
    fn rebind(self: &Rc<Self>) {
        let old = self.target_sub.borrow_mut().take();
        if let Some(old) = old {
            old.detach();
        }
        if let Ok(Value::Object(obj)) = self.parent.get() {
            let weak = Rc::downgrade(self);
            let sub = obj.sub(
                &[PROPERTY_CHANGE, self.name.as_str()],
                listener(move |_, _| match weak.upgrade() {
                    Some(inner) => inner.bus.publish(&[], Vec::new()).map(|_| ()),
                    None => Ok(()),
                }),
            );
            *self.target_sub.borrow_mut() = Some(sub);
        }
    }

    fn target(&self) -> AxiomResult<Option<Obj>> {
        Ok(match self.parent.get()? {
            Value::Object(obj) => Some(obj),
            _ => None,
        })
    }
}

impl Drop for SubSlotInner {
    fn drop(&mut self) {
        for sub in [self.parent_sub.get_mut().take(), self.target_sub.get_mut().take()]
            .into_iter()
            .flatten()
        {
            sub.detach();
        }
    }
}

struct SubSlot(Rc<SubSlotInner>);

impl SubSlot {
    fn new(parent: Slot, name: String) -> Self {
        let inner = Rc::new(SubSlotInner {
            parent,
            name,
            bus: ObserverBus::new(),
            parent_sub: RefCell::new(None),
            target_sub: RefCell::new(None),
        });
        let weak = Rc::downgrade(&inner);
        let parent_sub = inner.parent.sub(listener(move |_, _| match weak.upgrade() {
            Some(inner) => {
                inner.rebind();
                inner.bus.publish(&[], Vec::new()).map(|_| ())
            }
            None => Ok(()),
        }));
        *inner.parent_sub.borrow_mut() = Some(parent_sub);
        inner.rebind();
        Self(inner)
    }
}

impl SlotSource for SubSlot {
    fn get(&self) -> AxiomResult<Value> {
        match self.0.target()? {
            Some(obj) => obj.get(&self.0.name),
            None => Ok(Value::Undefined),
        }
    }

    fn set(&self, value: Value) -> AxiomResult<()> {
        match self.0.target()? {
            Some(obj) => obj.set(&self.0.name, value),
            None => Err(AxiomError::ImmutableSlot(self.describe())),
        }
    }

    fn sub(&self, callback: Listener) -> Subscription {
        self.0.bus.sub(&[], callback)
    }

    fn divergence_threshold(&self) -> usize {
        self.0.parent.divergence_threshold()
    }

    fn describe(&self) -> String {
        format!("{:?}.{}", self.0.parent, self.0.name)
    }
}
