// Copyright 2025 Cowboy AI, LLC.

//! Detachable subscriptions and bindings

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type DetachFn = Box<dyn FnOnce()>;

/// A live registration that can be cancelled with [`Subscription::detach`]
///
/// Bus subscriptions, slot bindings produced by the linking combinators and
/// instance-owned resources all share this handle. Detaching runs the
/// release action at most once; later calls are no-ops. Clones share the
/// same underlying registration.
#[derive(Clone)]
pub struct Subscription {
    inner: Rc<SubscriptionInner>,
}

struct SubscriptionInner {
    action: RefCell<Option<DetachFn>>,
    children: RefCell<Vec<Subscription>>,
}

impl Subscription {
    /// Create a subscription whose detach runs `action`
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            inner: Rc::new(SubscriptionInner {
                action: RefCell::new(Some(Box::new(action))),
                children: RefCell::new(Vec::new()),
            }),
        }
    }

    /// A subscription with nothing to release (used by constant slots)
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// A binding that detaches every member when detached
    pub fn group(members: impl IntoIterator<Item = Subscription>) -> Self {
        let sub = Self::noop();
        sub.inner.children.borrow_mut().extend(members);
        sub
    }

    /// Attach another subscription to be released together with this one.
    /// Adding to an already detached group detaches the member immediately.
    pub fn add(&self, member: Subscription) {
        if self.is_detached() {
            member.detach();
            return;
        }
        self.inner.children.borrow_mut().push(member);
    }

    /// Release the registration; idempotent
    pub fn detach(&self) {
        let action = self.inner.action.borrow_mut().take();
        if let Some(action) = action {
            action();
        }
        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for child in children {
            child.detach();
        }
    }

    /// Whether [`detach`](Self::detach) has already run
    pub fn is_detached(&self) -> bool {
        self.inner.action.borrow().is_none()
    }

    /// Whether two handles refer to the same registration
    pub fn ptr_eq(&self, other: &Subscription) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("detached", &self.is_detached())
            .field("children", &self.inner.children.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_detach_is_idempotent() {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let sub = Subscription::new(move || c.set(c.get() + 1));
        assert!(!sub.is_detached());
        sub.detach();
        sub.detach();
        sub.clone().detach();
        assert_eq!(count.get(), 1);
        assert!(sub.is_detached());
    }

    #[test]
    fn test_group_detaches_members() {
        let count = Rc::new(Cell::new(0));
        let members: Vec<_> = (0..3)
            .map(|_| {
                let c = count.clone();
                Subscription::new(move || c.set(c.get() + 1))
            })
            .collect();
        let group = Subscription::group(members.clone());
        group.detach();
        assert_eq!(count.get(), 3);
        assert!(members.iter().all(Subscription::is_detached));
    }

    #[test]
    fn test_add_to_detached_group_releases_immediately() {
        let group = Subscription::noop();
        group.detach();
        let late = Subscription::noop();
        group.add(late.clone());
        assert!(late.is_detached());
    }
}
