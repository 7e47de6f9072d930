// Copyright 2025 Cowboy AI, LLC.

//! Sink: consumer side of a topic pipe
//!
//! Collections and DAOs implement this; the runtime only pushes into it
//! (see [`TopicHandle::pipe`](crate::topic::TopicHandle::pipe)).

use crate::errors::AxiomError;
use crate::value::Value;

/// Receives values pushed from a topic
#[cfg_attr(test, mockall::automock)]
pub trait Sink {
    /// A value arrived
    fn put(&self, item: &Value);
    /// A value was withdrawn
    fn remove(&self, item: &Value);
    /// No more values will arrive
    fn eof(&self);
    /// The producer failed
    fn error(&self, err: &AxiomError);
    /// Everything previously put is stale
    fn reset(&self);
}
