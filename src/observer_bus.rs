// Copyright 2025 Cowboy AI, LLC.

//! Hierarchical publish/subscribe bus
//!
//! Every instance owns one bus. Topics are paths of segments
//! (`["propertyChange", "firstName"]`); the bus keeps a trie of buckets, one
//! per path prefix, and each bucket heads a doubly linked list of listener
//! nodes stored in an arena.
//!
//! Publishing `a.b.c` notifies the root bucket, then `a`, `a.b` and `a.b.c`,
//! stopping at the first segment without a bucket. Within a bucket the most
//! recently subscribed listener runs first.
//!
//! Listeners may detach themselves or any other subscription while a publish
//! is in flight. Traversal captures the next node before calling a listener;
//! detached nodes are unlinked from their neighbours but keep their own
//! forward pointer and are skipped, and their arena slots are only recycled
//! once no publish is running.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::errors::AxiomResult;
use crate::subscription::Subscription;
use crate::value::Value;

/// Listener callback: receives its own subscription and the event
pub type Listener = Rc<dyn Fn(&Subscription, &Event) -> AxiomResult<()>>;

/// Wrap a closure as a [`Listener`]
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Subscription, &Event) -> AxiomResult<()> + 'static,
{
    Rc::new(f)
}

/// A published event
#[derive(Debug, Clone)]
pub struct Event {
    /// Full topic path that was published
    pub topic: Vec<String>,
    /// Positional arguments
    pub args: Vec<Value>,
}

impl Event {
    /// Topic rendered with `.` separators
    pub fn topic_str(&self) -> String {
        self.topic.join(".")
    }

    /// Argument at `index`, `Undefined` when absent
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }
}

const ROOT: usize = 0;

struct Node {
    callback: Option<Listener>,
    sub: Option<Subscription>,
    prev: Option<usize>,
    next: Option<usize>,
    bucket: usize,
    generation: u64,
    linked: bool,
}

#[derive(Default)]
struct Bucket {
    head: Option<usize>,
    children: HashMap<String, usize>,
}

struct BusInner {
    nodes: Vec<Node>,
    buckets: Vec<Bucket>,
    free: Vec<usize>,
    pending_free: Vec<usize>,
    publishing: usize,
    live: usize,
}

enum Visit {
    Call(Listener, Subscription, Option<usize>),
    Skip(Option<usize>),
}

/// Per-instance hierarchical publish/subscribe bus
#[derive(Clone)]
pub struct ObserverBus {
    inner: Rc<RefCell<BusInner>>,
}

impl Default for ObserverBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(BusInner {
                nodes: Vec::new(),
                buckets: vec![Bucket::default()],
                free: Vec::new(),
                pending_free: Vec::new(),
                publishing: 0,
                live: 0,
            })),
        }
    }

    /// Subscribe `callback` to `topic` and every topic below it
    pub fn sub(&self, topic: &[&str], callback: Listener) -> Subscription {
        let (index, generation) = {
            let mut inner = self.inner.borrow_mut();
            let mut bucket = ROOT;
            for segment in topic {
                bucket = match inner.buckets[bucket].children.get(*segment) {
                    Some(child) => *child,
                    None => {
                        let child = inner.buckets.len();
                        inner.buckets.push(Bucket::default());
                        inner.buckets[bucket]
                            .children
                            .insert((*segment).to_string(), child);
                        child
                    }
                };
            }

            let head = inner.buckets[bucket].head;
            let index = match inner.free.pop() {
                Some(index) => {
                    let node = &mut inner.nodes[index];
                    node.generation += 1;
                    node.callback = Some(callback);
                    node.prev = None;
                    node.next = head;
                    node.bucket = bucket;
                    node.linked = true;
                    index
                }
                None => {
                    inner.nodes.push(Node {
                        callback: Some(callback),
                        sub: None,
                        prev: None,
                        next: head,
                        bucket,
                        generation: 0,
                        linked: true,
                    });
                    inner.nodes.len() - 1
                }
            };
            if let Some(head) = head {
                inner.nodes[head].prev = Some(index);
            }
            inner.buckets[bucket].head = Some(index);
            inner.live += 1;
            (index, inner.nodes[index].generation)
        };

        let weak: Weak<RefCell<BusInner>> = Rc::downgrade(&self.inner);
        let sub = Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                Self::unlink(&inner, index, generation);
            }
        });
        self.inner.borrow_mut().nodes[index].sub = Some(sub.clone());
        sub
    }

    fn unlink(inner: &Rc<RefCell<BusInner>>, index: usize, generation: u64) {
        let released = {
            let mut inner = inner.borrow_mut();
            let Some(node) = inner.nodes.get(index) else {
                return;
            };
            if node.generation != generation || !node.linked {
                return;
            }
            let (prev, next, bucket) = (node.prev, node.next, node.bucket);
            if let Some(next) = next {
                inner.nodes[next].prev = prev;
            }
            match prev {
                Some(prev) => inner.nodes[prev].next = next,
                None => inner.buckets[bucket].head = next,
            }
            let node = &mut inner.nodes[index];
            node.linked = false;
            node.prev = None;
            let released = (node.callback.take(), node.sub.take());
            inner.live -= 1;
            if inner.publishing > 0 {
                inner.pending_free.push(index);
            } else {
                inner.free.push(index);
            }
            released
        };
        // Captured state is dropped outside the borrow.
        drop(released);
    }

    /// Publish `args` on `topic`; returns how many listeners ran.
    ///
    /// The first listener error aborts the publish and is returned.
    pub fn publish(&self, topic: &[&str], args: Vec<Value>) -> AxiomResult<usize> {
        if !self.has_listeners(topic) {
            return Ok(0);
        }
        let event = Event {
            topic: topic.iter().map(|s| s.to_string()).collect(),
            args,
        };
        self.inner.borrow_mut().publishing += 1;
        let result = self.notify_path(topic, &event);
        {
            let mut inner = self.inner.borrow_mut();
            inner.publishing -= 1;
            if inner.publishing == 0 {
                let pending = std::mem::take(&mut inner.pending_free);
                inner.free.extend(pending);
            }
        }
        if let Ok(count) = &result {
            trace!(topic = %event.topic_str(), listeners = count, "published");
        }
        result
    }

    fn notify_path(&self, topic: &[&str], event: &Event) -> AxiomResult<usize> {
        let mut count = self.notify_bucket(ROOT, event)?;
        let mut bucket = ROOT;
        for segment in topic {
            let child = self.inner.borrow().buckets[bucket].children.get(*segment).copied();
            match child {
                Some(child) => {
                    count += self.notify_bucket(child, event)?;
                    bucket = child;
                }
                None => break,
            }
        }
        Ok(count)
    }

    fn notify_bucket(&self, bucket: usize, event: &Event) -> AxiomResult<usize> {
        let mut count = 0;
        let mut cursor = self.inner.borrow().buckets[bucket].head;
        while let Some(index) = cursor {
            let visit = {
                let inner = self.inner.borrow();
                let node = &inner.nodes[index];
                match (&node.callback, &node.sub) {
                    (Some(cb), Some(sub)) if node.linked => {
                        Visit::Call(cb.clone(), sub.clone(), node.next)
                    }
                    _ => Visit::Skip(node.next),
                }
            };
            match visit {
                Visit::Call(callback, sub, next) => {
                    cursor = next;
                    callback(&sub, event)?;
                    count += 1;
                }
                Visit::Skip(next) => cursor = next,
            }
        }
        Ok(count)
    }

    /// Whether `publish(topic)` would reach at least one listener.
    ///
    /// Walks the trie along `topic` without allocating.
    pub fn has_listeners(&self, topic: &[&str]) -> bool {
        let inner = self.inner.borrow();
        if inner.live == 0 {
            return false;
        }
        let mut bucket = ROOT;
        let mut depth = 0;
        loop {
            if inner.buckets[bucket].head.is_some() {
                return true;
            }
            if depth == topic.len() {
                return false;
            }
            match inner.buckets[bucket].children.get(topic[depth]) {
                Some(child) => bucket = *child,
                None => return false,
            }
            depth += 1;
        }
    }

    /// Number of live subscriptions
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().live
    }

    /// Detach every live subscription
    pub fn detach_all(&self) {
        let subs: Vec<Subscription> = self
            .inner
            .borrow()
            .nodes
            .iter()
            .filter(|node| node.linked)
            .filter_map(|node| node.sub.clone())
            .collect();
        for sub in subs {
            sub.detach();
        }
    }
}

impl fmt::Debug for ObserverBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ObserverBus")
            .field("listeners", &inner.live)
            .field("buckets", &inner.buckets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter(count: &Rc<Cell<usize>>) -> Listener {
        let count = count.clone();
        listener(move |_, _| {
            count.set(count.get() + 1);
            Ok(())
        })
    }

    #[test]
    fn test_prefix_listeners_receive_longer_topics() {
        let bus = ObserverBus::new();
        let root = Rc::new(Cell::new(0));
        let prefix = Rc::new(Cell::new(0));
        let exact = Rc::new(Cell::new(0));
        let longer = Rc::new(Cell::new(0));
        bus.sub(&[], counter(&root));
        bus.sub(&["propertyChange"], counter(&prefix));
        bus.sub(&["propertyChange", "name"], counter(&exact));
        bus.sub(&["propertyChange", "name", "deep"], counter(&longer));

        let notified = bus.publish(&["propertyChange", "name"], vec![]).unwrap();
        assert_eq!(notified, 3);
        assert_eq!((root.get(), prefix.get(), exact.get(), longer.get()), (1, 1, 1, 0));

        bus.publish(&["other"], vec![]).unwrap();
        assert_eq!((root.get(), prefix.get()), (2, 1));
    }

    #[test]
    fn test_most_recent_subscriber_runs_first() {
        let bus = ObserverBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            bus.sub(
                &["t"],
                listener(move |_, _| {
                    order.borrow_mut().push(i);
                    Ok(())
                }),
            );
        }
        bus.publish(&["t"], vec![]).unwrap();
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn test_has_listeners_probe() {
        let bus = ObserverBus::new();
        assert!(!bus.has_listeners(&["a", "b"]));
        let sub = bus.sub(&["a"], listener(|_, _| Ok(())));
        assert!(bus.has_listeners(&["a", "b"]));
        assert!(bus.has_listeners(&["a"]));
        assert!(!bus.has_listeners(&[]));
        assert!(!bus.has_listeners(&["b"]));
        sub.detach();
        assert!(!bus.has_listeners(&["a", "b"]));
    }

    #[test]
    fn test_listener_can_detach_itself() {
        let bus = ObserverBus::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        bus.sub(
            &["t"],
            listener(move |sub, _| {
                c.set(c.get() + 1);
                sub.detach();
                Ok(())
            }),
        );
        bus.publish(&["t"], vec![]).unwrap();
        bus.publish(&["t"], vec![]).unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_slots_are_recycled_without_reviving_old_handles() {
        let bus = ObserverBus::new();
        let first = bus.sub(&["t"], listener(|_, _| Ok(())));
        first.detach();
        let count = Rc::new(Cell::new(0));
        let _second = bus.sub(&["t"], counter(&count));
        first.detach();
        bus.publish(&["t"], vec![]).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_detach_all() {
        let bus = ObserverBus::new();
        let subs: Vec<_> = (0..4).map(|_| bus.sub(&["x"], listener(|_, _| Ok(())))).collect();
        bus.detach_all();
        assert_eq!(bus.listener_count(), 0);
        assert!(subs.iter().all(Subscription::is_detached));
    }
}
