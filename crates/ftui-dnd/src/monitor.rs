#![forbid(unsafe_code)]

//! Passive session observers.
//!
//! Monitors are not bound to an element. When a session generates its
//! preview, the registry freezes the eligible subset by asking each monitor's
//! `can_monitor` predicate about the session's initial location and source.
//! Monitors registered while that session is active are tested against the
//! same frozen criteria and join immediately if eligible.
//!
//! # Invariants
//!
//! 1. Eligibility is decided once per monitor per session.
//! 2. A monitor registered during a dispatch does not receive that event.
//! 3. A monitor unregistered during a dispatch, and not yet reached, is
//!    skipped for that event.
//! 4. The eligible set is discarded after the drop event.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::cleanup::Cleanup;
use crate::types::{DragEvent, DragLocation, EventName};

/// What a `can_monitor` predicate sees.
pub struct MonitorFeedback<'a, S> {
    /// Location when the session started.
    pub initial: &'a DragLocation,
    /// Source payload.
    pub source: &'a S,
}

type CanMonitorFn<S> = Rc<dyn Fn(&MonitorFeedback<'_, S>) -> bool>;
type MonitorHandler<S> = Rc<dyn Fn(&DragEvent<S>)>;

/// Registration record for one monitor.
pub struct MonitorArgs<S> {
    can_monitor: Option<CanMonitorFn<S>>,
    on_generate_drag_preview: Option<MonitorHandler<S>>,
    on_drag_start: Option<MonitorHandler<S>>,
    on_drag: Option<MonitorHandler<S>>,
    on_drop_target_change: Option<MonitorHandler<S>>,
    on_drop: Option<MonitorHandler<S>>,
}

impl<S> Default for MonitorArgs<S> {
    fn default() -> Self {
        Self {
            can_monitor: None,
            on_generate_drag_preview: None,
            on_drag_start: None,
            on_drag: None,
            on_drop_target_change: None,
            on_drop: None,
        }
    }
}

impl<S> fmt::Debug for MonitorArgs<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorArgs")
            .field("can_monitor", &self.can_monitor.is_some())
            .finish_non_exhaustive()
    }
}

impl<S> MonitorArgs<S> {
    /// Monitor that observes every session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict which sessions this monitor observes.
    #[must_use]
    pub fn with_can_monitor(mut self, f: impl Fn(&MonitorFeedback<'_, S>) -> bool + 'static) -> Self {
        self.can_monitor = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_generate_drag_preview(mut self, f: impl Fn(&DragEvent<S>) + 'static) -> Self {
        self.on_generate_drag_preview = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_drag_start(mut self, f: impl Fn(&DragEvent<S>) + 'static) -> Self {
        self.on_drag_start = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_drag(mut self, f: impl Fn(&DragEvent<S>) + 'static) -> Self {
        self.on_drag = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_drop_target_change(mut self, f: impl Fn(&DragEvent<S>) + 'static) -> Self {
        self.on_drop_target_change = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_drop(mut self, f: impl Fn(&DragEvent<S>) + 'static) -> Self {
        self.on_drop = Some(Rc::new(f));
        self
    }

    fn handler(&self, name: EventName) -> Option<&MonitorHandler<S>> {
        match name {
            EventName::GenerateDragPreview => self.on_generate_drag_preview.as_ref(),
            EventName::DragStart => self.on_drag_start.as_ref(),
            EventName::Drag => self.on_drag.as_ref(),
            EventName::DropTargetChange => self.on_drop_target_change.as_ref(),
            EventName::Drop => self.on_drop.as_ref(),
        }
    }

    fn eligible(&self, feedback: &MonitorFeedback<'_, S>) -> bool {
        self.can_monitor.as_ref().is_none_or(|f| f(feedback))
    }
}

/// Frozen criteria plus the eligible ids for the active session.
struct Watch<S> {
    initial: DragLocation,
    source: Rc<S>,
    active: Vec<u64>,
}

/// Registry of monitors for one origin kind.
pub struct MonitorRegistry<S> {
    entries: RefCell<Vec<(u64, Rc<MonitorArgs<S>>)>>,
    next_id: Cell<u64>,
    watch: RefCell<Option<Watch<S>>>,
}

impl<S> fmt::Debug for MonitorRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorRegistry")
            .field("len", &self.entries.borrow().len())
            .field("eligible", &self.eligible_count())
            .finish()
    }
}

impl<S> MonitorRegistry<S> {
    /// Number of monitors eligible for the active session.
    #[must_use]
    pub fn eligible_count(&self) -> usize {
        self.watch.borrow().as_ref().map_or(0, |w| w.active.len())
    }
}

impl<S: 'static> MonitorRegistry<S> {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            entries: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            watch: RefCell::new(None),
        })
    }

    /// Number of registered monitors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Whether a session is being watched.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watch.borrow().is_some()
    }

    /// Register a monitor.
    ///
    /// During an active session the monitor is tested against that session's
    /// frozen criteria and, if eligible, receives subsequent events.
    pub fn register(self: &Rc<Self>, args: MonitorArgs<S>) -> Cleanup {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let args = Rc::new(args);
        self.entries.borrow_mut().push((id, Rc::clone(&args)));
        self.try_join(id, &args);

        let registry = Rc::downgrade(self);
        Cleanup::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.unregister(id);
            }
        })
    }

    fn unregister(&self, id: u64) {
        self.entries.borrow_mut().retain(|(entry, _)| *entry != id);
        if let Some(watch) = self.watch.borrow_mut().as_mut() {
            watch.active.retain(|active| *active != id);
        }
    }

    fn try_join(&self, id: u64, args: &MonitorArgs<S>) {
        let criteria = self
            .watch
            .borrow()
            .as_ref()
            .map(|w| (w.initial.clone(), Rc::clone(&w.source)));
        let Some((initial, source)) = criteria else {
            return;
        };
        let eligible = args.eligible(&MonitorFeedback {
            initial: &initial,
            source: &source,
        });
        if !eligible {
            return;
        }
        // Still registered and the same session still being watched.
        let registered = self.entries.borrow().iter().any(|(entry, _)| *entry == id);
        if let Some(watch) = self.watch.borrow_mut().as_mut()
            && registered
            && Rc::ptr_eq(&watch.source, &source)
            && !watch.active.contains(&id)
        {
            watch.active.push(id);
        }
    }

    fn lookup(&self, id: u64) -> Option<Rc<MonitorArgs<S>>> {
        self.entries
            .borrow()
            .iter()
            .find(|(entry, _)| *entry == id)
            .map(|(_, args)| Rc::clone(args))
    }

    fn is_active(&self, id: u64) -> bool {
        self.watch
            .borrow()
            .as_ref()
            .is_some_and(|w| w.active.contains(&id))
    }

    /// Deliver a lifecycle event to eligible monitors.
    pub fn dispatch(&self, event: &DragEvent<S>) {
        if event.name == EventName::GenerateDragPreview {
            self.freeze(event);
        }

        let snapshot: Vec<u64> = self
            .watch
            .borrow()
            .as_ref()
            .map(|w| w.active.clone())
            .unwrap_or_default();
        for id in snapshot {
            if !self.is_active(id) {
                continue;
            }
            if let Some(f) = self.lookup(id).and_then(|args| args.handler(event.name).cloned()) {
                f(event);
            }
        }

        if event.name == EventName::Drop {
            self.watch.borrow_mut().take();
        }
    }

    fn freeze(&self, event: &DragEvent<S>) {
        *self.watch.borrow_mut() = Some(Watch {
            initial: event.location.initial.clone(),
            source: Rc::clone(&event.source),
            active: Vec::new(),
        });
        let registered: Vec<(u64, Rc<MonitorArgs<S>>)> = self
            .entries
            .borrow()
            .iter()
            .map(|(id, args)| (*id, Rc::clone(args)))
            .collect();
        for (id, args) in registered {
            self.try_join(id, &args);
        }
    }
}
