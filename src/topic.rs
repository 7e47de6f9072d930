// Copyright 2025 Cowboy AI, LLC.

//! Topic axiom and per-instance topic handles
//!
//! A Topic names an event channel on every instance of the class. Topics may
//! nest; publishing on a nested topic also reaches listeners of its parents
//! through the bus's prefix matching.

use std::any::Any;
use std::rc::Rc;

use crate::accessor::PROPERTY_CHANGE;
use crate::axiom::{downcast_axiom, Axiom, AxiomKind};
use crate::errors::{AxiomError, AxiomResult};
use crate::instance::Obj;
use crate::observer_bus::{listener, Listener};
use crate::sink::Sink;
use crate::subscription::Subscription;
use crate::value::Value;

/// Topic declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    name: String,
    topics: Vec<Topic>,
}

impl Topic {
    /// Leaf topic
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topics: Vec::new(),
        }
    }

    /// Add a nested topic
    pub fn with(mut self, sub_topic: Topic) -> Self {
        self.topics.push(sub_topic);
        self
    }

    /// Nested topics
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    fn child(&self, name: &str) -> Option<&Topic> {
        self.topics.iter().find(|topic| topic.name == name)
    }
}

impl Axiom for Topic {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AxiomKind {
        AxiomKind::Topic
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Topic bound to one instance
#[derive(Debug, Clone)]
pub struct TopicHandle {
    obj: Obj,
    path: Vec<String>,
    // None for the built-in open-ended propertyChange topic
    decl: Option<Topic>,
}

impl TopicHandle {
    pub(crate) fn resolve(obj: &Obj, name: &str) -> AxiomResult<Self> {
        if name == PROPERTY_CHANGE {
            return Ok(Self {
                obj: obj.clone(),
                path: vec![name.to_string()],
                decl: None,
            });
        }
        let unknown = || AxiomError::UnknownAxiom {
            class: obj.class().name().to_string(),
            name: name.to_string(),
        };
        let axiom = obj.class().axiom(name).ok_or_else(unknown)?;
        let decl = downcast_axiom::<Topic>(&axiom).ok_or_else(unknown)?.clone();
        Ok(Self {
            obj: obj.clone(),
            path: vec![name.to_string()],
            decl: Some(decl),
        })
    }

    /// Nested topic; any child is accepted under `propertyChange`
    pub fn child(&self, name: &str) -> AxiomResult<Self> {
        let decl = match &self.decl {
            Some(decl) => Some(decl.child(name).cloned().ok_or_else(|| AxiomError::UnknownAxiom {
                class: self.obj.class().name().to_string(),
                name: format!("{}.{name}", self.path.join(".")),
            })?),
            None => None,
        };
        let mut path = self.path.clone();
        path.push(name.to_string());
        Ok(Self {
            obj: self.obj.clone(),
            path,
            decl,
        })
    }

    /// Topic path
    pub fn path(&self) -> &[String] {
        &self.path
    }

    fn segments(&self) -> Vec<&str> {
        self.path.iter().map(String::as_str).collect()
    }

    /// Publish on this topic
    pub fn publish(&self, args: Vec<Value>) -> AxiomResult<usize> {
        self.obj.publish(&self.segments(), args)
    }

    /// Subscribe to this topic and its nested topics
    pub fn sub(&self, callback: Listener) -> Subscription {
        self.obj.sub(&self.segments(), callback)
    }

    /// Whether anything listens
    pub fn has_listeners(&self) -> bool {
        self.obj.has_listeners(&self.segments())
    }

    /// Forward every published argument into `sink`
    pub fn pipe(&self, sink: Rc<dyn Sink>) -> Subscription {
        self.sub(listener(move |_, event| {
            for arg in &event.args {
                sink.put(arg);
            }
            Ok(())
        }))
    }
}
