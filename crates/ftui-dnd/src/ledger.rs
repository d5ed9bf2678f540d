#![forbid(unsafe_code)]

//! Reference-counted mounting of per-kind global listeners.
//!
//! Many independent registrations of the same [`OriginKind`] share one set of
//! global listeners. The first [`MountLedger::acquire`] for a kind runs the
//! mount function; the last release runs the unmount it returned.
//!
//! # Invariants
//!
//! 1. For each kind, mount runs once per transition from 0 to 1 users.
//! 2. Unmount runs exactly once per transition from 1 to 0 users.
//! 3. Each returned release decrements at most once.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::cleanup::Cleanup;
use crate::logging::debug;
use crate::types::OriginKind;

#[derive(Debug)]
struct LedgerEntry {
    unmount: Cleanup,
    usage_count: usize,
}

/// Reference counts global listener installation per origin kind.
#[derive(Debug, Default)]
pub struct MountLedger {
    entries: RefCell<HashMap<OriginKind, LedgerEntry>>,
}

impl MountLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Register one user of `kind`, mounting on first use.
    ///
    /// `mount` is only invoked when no entry exists for `kind`. The entry is
    /// created before `mount` runs, so an acquire from inside `mount` counts
    /// as an extra user instead of mounting again.
    pub fn acquire(self: &Rc<Self>, kind: OriginKind, mount: impl FnOnce() -> Cleanup) -> Cleanup {
        let first = {
            let mut entries = self.entries.borrow_mut();
            match entries.get_mut(&kind) {
                Some(entry) => {
                    entry.usage_count += 1;
                    false
                }
                None => {
                    entries.insert(
                        kind,
                        LedgerEntry {
                            unmount: Cleanup::noop(),
                            usage_count: 1,
                        },
                    );
                    true
                }
            }
        };

        if first {
            // Outside the borrow: mount functions may bind listeners or
            // register consumers of the same kind.
            let unmount = mount();
            debug!(kind = kind.as_str(), "mounted global listeners");
            let mut entries = self.entries.borrow_mut();
            match entries.get_mut(&kind) {
                Some(entry) => entry.unmount = unmount,
                None => {
                    entries.insert(
                        kind,
                        LedgerEntry {
                            unmount,
                            usage_count: 1,
                        },
                    );
                }
            }
        }

        let ledger = Rc::downgrade(self);
        Cleanup::new(move || {
            if let Some(ledger) = ledger.upgrade() {
                ledger.release(kind);
            }
        })
    }

    fn release(&self, kind: OriginKind) {
        let finished = {
            let mut entries = self.entries.borrow_mut();
            let Some(entry) = entries.get_mut(&kind) else {
                return;
            };
            entry.usage_count = entry.usage_count.saturating_sub(1);
            if entry.usage_count == 0 {
                entries.remove(&kind)
            } else {
                None
            }
        };
        if let Some(entry) = finished {
            entry.unmount.run();
            debug!(kind = kind.as_str(), "unmounted global listeners");
        }
    }

    /// Current number of users for `kind`.
    #[must_use]
    pub fn usage_count(&self, kind: OriginKind) -> usize {
        self.entries
            .borrow()
            .get(&kind)
            .map_or(0, |entry| entry.usage_count)
    }

    /// Whether `kind` currently has its listeners mounted.
    #[must_use]
    pub fn is_mounted(&self, kind: OriginKind) -> bool {
        self.entries.borrow().contains_key(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counters {
        mounts: Rc<Cell<u32>>,
        unmounts: Rc<Cell<u32>>,
    }

    impl Counters {
        fn new() -> Self {
            Self {
                mounts: Rc::new(Cell::new(0)),
                unmounts: Rc::new(Cell::new(0)),
            }
        }

        fn mount(&self) -> impl FnOnce() -> Cleanup + 'static {
            let mounts = Rc::clone(&self.mounts);
            let unmounts = Rc::clone(&self.unmounts);
            move || {
                mounts.set(mounts.get() + 1);
                Cleanup::new(move || unmounts.set(unmounts.get() + 1))
            }
        }
    }

    #[test]
    fn three_acquires_two_releases_stays_mounted() {
        let ledger = MountLedger::new();
        let c = Counters::new();

        let a = ledger.acquire(OriginKind::Element, c.mount());
        let b = ledger.acquire(OriginKind::Element, c.mount());
        let d = ledger.acquire(OriginKind::Element, c.mount());
        assert_eq!(c.mounts.get(), 1);
        assert_eq!(ledger.usage_count(OriginKind::Element), 3);

        a.run();
        b.run();
        assert!(ledger.is_mounted(OriginKind::Element));
        assert_eq!(c.unmounts.get(), 0);

        d.run();
        assert!(!ledger.is_mounted(OriginKind::Element));
        assert_eq!(c.unmounts.get(), 1);
    }

    #[test]
    fn kinds_are_independent() {
        let ledger = MountLedger::new();
        let c = Counters::new();

        let element = ledger.acquire(OriginKind::Element, c.mount());
        let external = ledger.acquire(OriginKind::External, c.mount());
        assert_eq!(c.mounts.get(), 2);

        element.run();
        assert!(ledger.is_mounted(OriginKind::External));
        assert!(!ledger.is_mounted(OriginKind::Element));
        external.run();
        assert_eq!(c.unmounts.get(), 2);
    }

    #[test]
    fn remount_after_full_release() {
        let ledger = MountLedger::new();
        let c = Counters::new();

        ledger.acquire(OriginKind::TextSelection, c.mount()).run();
        ledger.acquire(OriginKind::TextSelection, c.mount()).run();
        assert_eq!(c.mounts.get(), 2);
        assert_eq!(c.unmounts.get(), 2);
    }

    #[test]
    fn release_after_ledger_dropped_is_noop() {
        let ledger = MountLedger::new();
        let c = Counters::new();
        let release = ledger.acquire(OriginKind::Element, c.mount());
        drop(ledger);
        release.run();
        assert_eq!(c.unmounts.get(), 0);
    }

    #[test]
    fn acquire_inside_mount_joins_the_pending_mount() {
        let ledger = MountLedger::new();
        let outer = Counters::new();
        let inner = Counters::new();
        let nested: Rc<RefCell<Option<Cleanup>>> = Rc::new(RefCell::new(None));

        let (l, n, inner_mount) = (Rc::clone(&ledger), Rc::clone(&nested), inner.mount());
        let outer_mount = outer.mount();
        let release = ledger.acquire(OriginKind::Element, move || {
            *n.borrow_mut() = Some(l.acquire(OriginKind::Element, inner_mount));
            outer_mount()
        });

        assert_eq!(outer.mounts.get(), 1);
        assert_eq!(inner.mounts.get(), 0);
        assert_eq!(outer.unmounts.get(), 0);
        assert_eq!(ledger.usage_count(OriginKind::Element), 2);

        release.run();
        assert!(ledger.is_mounted(OriginKind::Element));
        assert_eq!(outer.unmounts.get(), 0);

        let nested = nested.borrow_mut().take();
        if let Some(nested) = nested {
            nested.run();
        }
        assert!(!ledger.is_mounted(OriginKind::Element));
        assert_eq!(outer.unmounts.get(), 1);
    }
}
