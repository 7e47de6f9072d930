// Copyright 2025 Cowboy AI, LLC.

//! Method and Listener axioms
//!
//! A method installed over an inherited method of the same name receives a
//! [`SuperMethod`] handle that invokes the ancestor's implementation. A
//! listener is a method whose bound form (via [`Obj::listener`]) can be handed
//! to any `sub` call; merged listeners coalesce bursts through the context's
//! [`Scheduler`](crate::scheduler::Scheduler).

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::axiom::{Axiom, AxiomKind};
use crate::class::Class;
use crate::errors::AxiomResult;
use crate::instance::Obj;
use crate::observer_bus::{listener, Event, Listener};
use crate::value::Value;

/// Method body
pub type MethodCode = Rc<dyn Fn(&Obj, &[Value], &SuperMethod) -> AxiomResult<Value>>;
/// Listener body
pub type ListenerCode = Rc<dyn Fn(&Obj, &Event) -> AxiomResult<()>>;

/// Method declaration
#[derive(Clone)]
pub struct Method {
    name: String,
    code: MethodCode,
}

impl Method {
    /// Declare a method
    pub fn new(
        name: impl Into<String>,
        code: impl Fn(&Obj, &[Value], &SuperMethod) -> AxiomResult<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            code: Rc::new(code),
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("name", &self.name).finish()
    }
}

impl Axiom for Method {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AxiomKind {
        AxiomKind::Method
    }

    fn install_in_proto(&self, class: &Class) -> AxiomResult<()> {
        let parent = class.parent().and_then(|parent| parent.find_method(&self.name));
        class.insert_method(InstalledMethod {
            name: self.name.clone(),
            code: self.code.clone(),
            parent: SuperMethod(parent.map(Rc::new)),
        });
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A method as installed on a class, linked to the implementation it overrides
#[derive(Clone)]
pub struct InstalledMethod {
    name: String,
    code: MethodCode,
    parent: SuperMethod,
}

impl InstalledMethod {
    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke on `obj`
    pub fn call(&self, obj: &Obj, args: &[Value]) -> AxiomResult<Value> {
        (self.code)(obj, args, &self.parent)
    }

    /// Whether an ancestor implementation exists
    pub fn has_super(&self) -> bool {
        self.parent.exists()
    }
}

impl fmt::Debug for InstalledMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstalledMethod")
            .field("name", &self.name)
            .field("has_super", &self.has_super())
            .finish()
    }
}

/// Handle to the overridden implementation
#[derive(Clone, Default)]
pub struct SuperMethod(Option<Rc<InstalledMethod>>);

impl SuperMethod {
    /// Invoke the ancestor implementation; `Undefined` when there is none
    pub fn call(&self, obj: &Obj, args: &[Value]) -> AxiomResult<Value> {
        match &self.0 {
            Some(method) => method.call(obj, args),
            None => Ok(Value::Undefined),
        }
    }

    /// Whether an ancestor implementation exists
    pub fn exists(&self) -> bool {
        self.0.is_some()
    }
}

/// Listener declaration
#[derive(Clone)]
pub struct ListenerAxiom {
    name: String,
    code: ListenerCode,
    merged: bool,
    merge_delay: Option<Duration>,
}

impl ListenerAxiom {
    /// Declare a listener that runs synchronously on every event
    pub fn new(
        name: impl Into<String>,
        code: impl Fn(&Obj, &Event) -> AxiomResult<()> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            code: Rc::new(code),
            merged: false,
            merge_delay: None,
        }
    }

    /// Coalesce bursts of events into one deferred call with the latest event
    pub fn merged(mut self) -> Self {
        self.merged = true;
        self
    }

    /// Merge window; defaults to the configured merge delay
    pub fn merge_delay(mut self, delay: Duration) -> Self {
        self.merged = true;
        self.merge_delay = Some(delay);
        self
    }

    /// Whether events are coalesced
    pub fn is_merged(&self) -> bool {
        self.merged
    }

    /// Bind to `obj`, producing a listener for `sub`
    pub(crate) fn bind(self: &Rc<Self>, obj: &Obj) -> Listener {
        let weak = obj.downgrade();
        if !self.merged {
            let code = self.code.clone();
            return listener(move |_, event| match weak.upgrade() {
                Some(obj) => code(&obj, event),
                None => Ok(()),
            });
        }

        let decl = self.clone();
        listener(move |_, event| {
            let Some(obj) = weak.upgrade() else {
                return Ok(());
            };
            let first = obj
                .private_mut()
                .merged_pending
                .insert(decl.name.clone(), event.clone())
                .is_none();
            if !first {
                return Ok(());
            }
            let delay = decl.merge_delay.unwrap_or_else(|| {
                Duration::from_millis(obj.context().config().default_merge_delay_ms)
            });
            let task_obj = obj.downgrade();
            let task_decl = decl.clone();
            debug!(listener = %decl.name, ?delay, "merged listener scheduled");
            obj.context().scheduler().schedule(
                delay,
                Box::new(move || {
                    let Some(obj) = task_obj.upgrade() else {
                        return;
                    };
                    let pending = obj.private_mut().merged_pending.remove(&task_decl.name);
                    if let Some(event) = pending {
                        if let Err(err) = (task_decl.code)(&obj, &event) {
                            warn!(listener = %task_decl.name, error = %err, "merged listener failed");
                        }
                    }
                }),
            );
            Ok(())
        })
    }
}

impl fmt::Debug for ListenerAxiom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerAxiom")
            .field("name", &self.name)
            .field("merged", &self.merged)
            .field("merge_delay", &self.merge_delay)
            .finish()
    }
}

impl Axiom for ListenerAxiom {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AxiomKind {
        AxiomKind::Listener
    }

    fn install_in_proto(&self, class: &Class) -> AxiomResult<()> {
        class.insert_listener(Rc::new(self.clone()));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
