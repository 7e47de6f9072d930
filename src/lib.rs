// Copyright 2025 Cowboy AI, LLC.

//! # CIM Axiom
//!
//! A meta-object protocol for the Composable Information Machine: classes are
//! composed from ordered lists of axioms, and every instance carries its own
//! hierarchical event bus.
//!
//! - **Axioms**: properties, methods, listeners, topics, constants, imports
//!   and exports, each installing itself into a class
//! - **Classes**: composed from a [`Model`] by a [`ClassRegistry`], with
//!   single inheritance and redeclaration rules
//! - **Properties**: synthesized accessors running the adapt → preSet →
//!   assert → store → notify → postSet pipeline, with lazy factory and
//!   expression defaults
//! - **Observer bus**: topic-path publish/subscribe with prefix delivery
//!   and detach-safe dispatch
//! - **Slots**: observable cells over properties, expressions and constants,
//!   plus the `follow` / `link` / `map` / `relate` combinators
//! - **Contexts**: hierarchical lookup tables feeding imports and exports
//!
//! ## Design Principles
//!
//! 1. **Single-threaded**: instances, classes and slots are `Rc` handles
//! 2. **Composition over code generation**: behaviour is chosen once, when
//!    the class is composed
//! 3. **Explicit errors**: every fallible operation returns [`AxiomResult`]

#![warn(missing_docs)]

mod accessor;
mod axiom;
mod class;
mod config;
mod context;
mod errors;
mod instance;
mod link;
mod markers;
mod method;
mod model;
pub mod naming;
mod observer_bus;
mod property;
mod registry;
mod scheduler;
mod sink;
mod slot;
mod subscription;
mod topic;
mod value;

pub use accessor::{PropertyAccessor, PROPERTY_CHANGE};
pub use axiom::{downcast_axiom, Axiom, AxiomKind, AxiomRef, CustomAxiom};
pub use class::{Class, ClassId, CompositionWarning, UnknownArgHook};
pub use config::RuntimeConfig;
pub use context::{Context, Export, Import};
pub use errors::{AxiomError, AxiomResult};
pub use instance::{Obj, WeakObj};
pub use markers::{Constant, Implements, InnerClass, Requires};
pub use method::{InstalledMethod, ListenerAxiom, ListenerCode, Method, MethodCode, SuperMethod};
pub use model::{Model, ModelSpec, PropertyDescriptor, PropertySpec, TopicSpec};
pub use observer_bus::{listener, Event, Listener, ObserverBus};
pub use property::{
    AssertHook, Expression, ExpressionCode, FactoryHook, GetterHook, PostSetHook, Property,
    PropertyType, SetterHook, TransformHook,
};
pub use registry::ClassRegistry;
pub use scheduler::{ManualScheduler, Scheduler, Task, TokioScheduler};
pub use sink::Sink;
pub use slot::{ExpressionSlot, Slot, SlotSource};
pub use subscription::Subscription;
pub use topic::{Topic, TopicHandle};
pub use value::Value;
