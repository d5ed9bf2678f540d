#![forbid(unsafe_code)]

//! Explicit cleanup handles.
//!
//! Every registration in this crate (drop targets, monitors, ledger mounts,
//! native listener bindings, markers) returns a [`Cleanup`]. Registrations are
//! never pruned implicitly: dropping a `Cleanup` without calling
//! [`run`](Cleanup::run) leaves the registration in place.
//!
//! # Invariants
//!
//! 1. A cleanup runs at most once (it consumes itself).
//! 2. [`Cleanup::combine`] runs its parts in reverse registration order.

use std::fmt;

/// A one-shot teardown action returned by every registration.
#[must_use = "dropping a Cleanup does not unregister; call `run()`"]
pub struct Cleanup {
    action: Option<Box<dyn FnOnce()>>,
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanup")
            .field("armed", &self.action.is_some())
            .finish()
    }
}

impl Cleanup {
    /// Wrap a teardown closure.
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: Some(Box::new(action)),
        }
    }

    /// A cleanup that does nothing.
    pub fn noop() -> Self {
        Self { action: None }
    }

    /// Combine several cleanups into one.
    ///
    /// Parts run last-to-first, mirroring the order they were acquired.
    pub fn combine(parts: impl IntoIterator<Item = Cleanup>) -> Self {
        let mut parts: Vec<Cleanup> = parts.into_iter().collect();
        Self::new(move || {
            while let Some(part) = parts.pop() {
                part.run();
            }
        })
    }

    /// Run the teardown.
    pub fn run(mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn run_invokes_once() {
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        let cleanup = Cleanup::new(move || *c.borrow_mut() += 1);
        cleanup.run();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn drop_does_not_run() {
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        let cleanup = Cleanup::new(move || *c.borrow_mut() += 1);
        drop(cleanup);
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn combine_runs_in_reverse() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let parts = (0..3).map(|i| {
            let log = Rc::clone(&log);
            Cleanup::new(move || log.borrow_mut().push(i))
        });
        Cleanup::combine(parts).run();
        assert_eq!(*log.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn noop_is_harmless() {
        Cleanup::noop().run();
        assert!(format!("{:?}", Cleanup::noop()).contains("armed: false"));
    }
}
