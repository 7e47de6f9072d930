// Copyright 2025 Cowboy AI, LLC.

//! Linking combinators between slots
//!
//! Every combinator applies itself immediately and returns a
//! [`Subscription`] that releases all of its internal listeners.
//!
//! | combinator               | direction | transform          |
//! |--------------------------|-----------|--------------------|
//! | `follow`                 | other → self | none            |
//! | `map_from` / `map_to`    | one way   | `f`                |
//! | `link_from` / `link_to`  | both ways | none               |
//! | `relate_to` / `relate_from` | both ways | `f` and `f_prime` |

use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use crate::errors::{AxiomError, AxiomResult};
use crate::observer_bus::listener;
use crate::slot::Slot;
use crate::subscription::Subscription;
use crate::value::Value;

type Transform = Rc<dyn Fn(&Value) -> Value>;

/// Push `from` into `to` unless a push in this direction is already running.
/// If `to` settles on a different value (adapt, preSet), copy it back once.
fn propagate(from: &Slot, to: &Slot, feedback: &Cell<bool>) -> AxiomResult<()> {
    if feedback.get() {
        return Ok(());
    }
    let value = from.get()?;
    if value.is(&to.get()?) {
        return Ok(());
    }
    feedback.set(true);
    let result: AxiomResult<()> = (|| {
        to.set(value)?;
        let settled = to.get()?;
        if !settled.is(&from.get()?) {
            from.set(settled)?;
        }
        Ok(())
    })();
    feedback.set(false);
    result
}

struct Relation {
    left: Slot,
    right: Slot,
    f: Transform,
    f_prime: Transform,
    expect_unstable: bool,
    threshold: usize,
    feedback: Cell<bool>,
    depth: Cell<usize>,
}

impl Relation {
    fn guarded(&self, op: impl FnOnce() -> AxiomResult<()>) -> AxiomResult<()> {
        self.feedback.set(true);
        let result = op();
        self.feedback.set(false);
        result
    }

    // One corrective write; the depth counts nested corrections
    fn correct(&self, op: impl FnOnce() -> AxiomResult<()>) -> AxiomResult<()> {
        let depth = self.depth.get() + 1;
        if depth > self.threshold {
            self.depth.set(0);
            debug!(depth, "slot relation diverged");
            return Err(AxiomError::Divergence { depth });
        }
        self.depth.set(depth);
        let result = op();
        self.depth.set(self.depth.get().saturating_sub(1));
        result
    }

    fn push_right(&self) -> AxiomResult<()> {
        let forward = (self.f)(&self.left.get()?);
        self.guarded(|| self.right.set(forward))
    }

    fn left_changed(&self) -> AxiomResult<()> {
        if self.feedback.get() {
            return Ok(());
        }
        self.push_right()?;
        if self.expect_unstable {
            return Ok(());
        }
        let back = (self.f_prime)(&self.right.get()?);
        if back.is(&self.left.get()?) {
            return Ok(());
        }
        self.correct(|| self.left.set(back))
    }

    fn right_changed(&self) -> AxiomResult<()> {
        if self.feedback.get() {
            return Ok(());
        }
        let backward = (self.f_prime)(&self.right.get()?);
        self.guarded(|| self.left.set(backward))?;
        if self.expect_unstable {
            return Ok(());
        }
        let forward = (self.f)(&self.left.get()?);
        if forward.is(&self.right.get()?) {
            return Ok(());
        }
        self.correct(|| self.right.set(forward))
    }
}

impl Slot {
    /// Keep `self` and `other` equal in both directions; `self` first takes
    /// `other`'s value
    pub fn link_from(&self, other: &Slot) -> AxiomResult<Subscription> {
        let to_other = Rc::new(Cell::new(false));
        let to_self = Rc::new(Cell::new(false));

        let (a, b, flag) = (self.clone(), other.clone(), to_other.clone());
        let self_sub = self.sub(listener(move |_, _| propagate(&a, &b, &flag)));
        let (a, b, flag) = (self.clone(), other.clone(), to_self.clone());
        let other_sub = other.sub(listener(move |_, _| propagate(&b, &a, &flag)));

        let binding = Subscription::group([self_sub, other_sub]);
        if let Err(err) = propagate(other, self, &to_self) {
            binding.detach();
            return Err(err);
        }
        Ok(binding)
    }

    /// Keep `self` and `other` equal in both directions; `other` first takes
    /// `self`'s value
    pub fn link_to(&self, other: &Slot) -> AxiomResult<Subscription> {
        other.link_from(self)
    }

    /// Copy `other` into `self` now and on every change of `other`
    pub fn follow(&self, other: &Slot) -> AxiomResult<Subscription> {
        let copy = {
            let (target, source) = (self.clone(), other.clone());
            move || -> AxiomResult<()> {
                let value = source.get()?;
                if !value.is(&target.get()?) {
                    target.set(value)?;
                }
                Ok(())
            }
        };
        copy()?;
        Ok(other.sub(listener(move |_, _| copy())))
    }

    /// Keep `self` equal to `f(other)`
    pub fn map_from(
        &self,
        other: &Slot,
        f: impl Fn(&Value) -> Value + 'static,
    ) -> AxiomResult<Subscription> {
        let apply = {
            let (target, source) = (self.clone(), other.clone());
            move || -> AxiomResult<()> { target.set(f(&source.get()?)) }
        };
        apply()?;
        Ok(other.sub(listener(move |_, _| apply())))
    }

    /// Keep `other` equal to `f(self)`
    pub fn map_to(
        &self,
        other: &Slot,
        f: impl Fn(&Value) -> Value + 'static,
    ) -> AxiomResult<Subscription> {
        other.map_from(self, f)
    }

    /// Two-way binding through `f` (self → other) and `f_prime`
    /// (other → self). `other` first takes `f(self)`.
    ///
    /// After each propagation the inverse is checked; when it does not
    /// reproduce the source value a corrective write is issued. More than
    /// the configured number of nested corrections fails with
    /// [`AxiomError::Divergence`] unless `expect_unstable` is set, in which
    /// case the check is skipped.
    pub fn relate_to(
        &self,
        other: &Slot,
        f: impl Fn(&Value) -> Value + 'static,
        f_prime: impl Fn(&Value) -> Value + 'static,
        expect_unstable: bool,
    ) -> AxiomResult<Subscription> {
        let relation = Rc::new(Relation {
            left: self.clone(),
            right: other.clone(),
            f: Rc::new(f),
            f_prime: Rc::new(f_prime),
            expect_unstable,
            threshold: self.divergence_threshold(),
            feedback: Cell::new(false),
            depth: Cell::new(0),
        });
        relation.push_right()?;

        let on_left = relation.clone();
        let left_sub = self.sub(listener(move |_, _| on_left.left_changed()));
        let on_right = relation;
        let right_sub = other.sub(listener(move |_, _| on_right.right_changed()));
        Ok(Subscription::group([left_sub, right_sub]))
    }

    /// [`relate_to`](Slot::relate_to) with the roles swapped
    pub fn relate_from(
        &self,
        other: &Slot,
        f: impl Fn(&Value) -> Value + 'static,
        f_prime: impl Fn(&Value) -> Value + 'static,
        expect_unstable: bool,
    ) -> AxiomResult<Subscription> {
        other.relate_to(self, f, f_prime, expect_unstable)
    }
}
