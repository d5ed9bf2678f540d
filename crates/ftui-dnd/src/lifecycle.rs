#![forbid(unsafe_code)]

//! Session lifecycle state machine.
//!
//! [`LifecycleManager`] owns the single "a session is active" flag for one
//! [`DragDropContext`](crate::adapter::DragDropContext). A started session
//! binds a bundle of capture-phase listeners on the host [`Window`], re-runs
//! hit-testing as native signals arrive, and pushes every state change
//! through a [`Dispatcher`].
//!
//! ```text
//!            start()                         drop / cancel
//!   Idle ──────────────▶ Active ───────────────────────────▶ Idle
//!    ▲      (bind listeners,     (publish drop, unbind,        │
//!    │       preview + start)     clear flag)                  │
//!    └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Native signal handling
//!
//! | Signal | Behavior |
//! |--------|----------|
//! | `DragOver` | update, then schedule a throttled drag |
//! | `DragEnter` | update |
//! | `DragLeave` (no related target) | clear targets; cancel if started externally |
//! | `Drop` | no targets: cancel; otherwise publish drop and finish |
//! | `DragEnd` | cancel |
//! | `PointerMove` (no buttons) | counted; a run over the threshold cancels |
//! | `PointerDown` | cancel |
//!
//! # Invariants
//!
//! 1. At most one session per manager is active.
//! 2. Every started session publishes exactly one drop.
//! 3. Teardown (flag clear, unbind, discard pending frame work) runs even if
//!    a consumer callback panics during the terminal publication.
//!
//! # Failure Modes
//!
//! - Signals arriving after termination began are ignored.
//! - A start while active returns `false` and changes nothing.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::cleanup::Cleanup;
use crate::config::DragDropConfig;
use crate::document::NodeId;
use crate::frame_clock::FrameClock;
use crate::input::Input;
use crate::logging::{debug, trace};
use crate::native::{Binding, NativeEvent, NativeEventKind, Phase, Window};
use crate::scheduler::Dispatcher;
use crate::types::{
    DragLocation, DragType, DropPayloadFn, DropTargetRecord, EventSink, OriginKind, StartedFrom,
    hierarchy_changed,
};

/// What a hit-test function is asked.
pub struct HitTestArgs<'a, S> {
    /// Node under the pointer.
    pub target: Option<NodeId>,
    /// Pointer snapshot.
    pub input: &'a Input,
    /// Source payload.
    pub source: &'a S,
    /// Targets of the latest computed location, innermost first.
    pub current: &'a [DropTargetRecord],
}

/// Resolves the drop targets under the pointer.
pub type HitTestFn<S> = Rc<dyn Fn(&HitTestArgs<'_, S>) -> Vec<DropTargetRecord>>;

/// The session-active flag, holding the running session's origin kind.
#[derive(Debug, Default)]
pub struct SessionState {
    active: Cell<Option<OriginKind>>,
    started: Cell<u64>,
}

impl SessionState {
    /// Whether a session is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get().is_some()
    }

    /// Origin kind of the running session.
    #[must_use]
    pub fn active_kind(&self) -> Option<OriginKind> {
        self.active.get()
    }

    /// Number of sessions started so far.
    #[must_use]
    pub fn sessions_started(&self) -> u64 {
        self.started.get()
    }
}

/// Top-level session state machine.
pub struct LifecycleManager {
    state: Rc<SessionState>,
    window: Rc<Window>,
    clock: Rc<dyn FrameClock>,
    config: DragDropConfig,
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LifecycleManager {
    /// Create an idle manager binding on `window` and scheduling on `clock`.
    #[must_use]
    pub fn new(window: Rc<Window>, clock: Rc<dyn FrameClock>, config: DragDropConfig) -> Self {
        Self {
            state: Rc::new(SessionState::default()),
            window,
            clock,
            config,
        }
    }

    /// True iff no session is active.
    #[must_use]
    pub fn can_start(&self) -> bool {
        !self.state.is_active()
    }

    /// True while a session is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Origin kind of the running session, if any.
    #[must_use]
    pub fn active_kind(&self) -> Option<OriginKind> {
        self.state.active_kind()
    }

    /// Shared session flag.
    #[must_use]
    pub fn state(&self) -> &Rc<SessionState> {
        &self.state
    }

    #[must_use]
    pub fn config(&self) -> &DragDropConfig {
        &self.config
    }

    /// Begin a session from the native start signal `event`.
    ///
    /// Returns `false` without side effects when a session is already active.
    pub fn start<S: 'static>(
        &self,
        event: &mut NativeEvent,
        drag_type: DragType<S>,
        hit_test: HitTestFn<S>,
        sink: EventSink<S>,
    ) -> bool {
        if !self.can_start() {
            debug!(kind = drag_type.kind.as_str(), "start ignored: a session is already active");
            return false;
        }

        let DragType {
            kind,
            started_from,
            payload,
            drop_payload,
        } = drag_type;
        let source = Rc::new(payload);
        let input = event.input;

        let initial_targets = match started_from {
            StartedFrom::External => Vec::new(),
            StartedFrom::Internal => hit_test(&HitTestArgs {
                target: event.target,
                input: &input,
                source: &source,
                current: &[],
            }),
        };
        let initial = DragLocation::new(input, initial_targets);

        self.state.active.set(Some(kind));
        self.state.started.set(self.state.started.get() + 1);
        debug!(
            kind = kind.as_str(),
            targets = initial.drop_targets.len(),
            "drag session started"
        );

        if let Some(innermost) = initial.innermost() {
            event.set_drop_effect(innermost.drop_effect);
        }

        let dispatcher = Dispatcher::new(
            Rc::clone(&source),
            initial.clone(),
            sink,
            Rc::clone(&self.clock),
        );
        let session = Rc::new(Session {
            state: Rc::clone(&self.state),
            dispatcher: Rc::clone(&dispatcher),
            hit_test,
            source,
            started_from,
            drop_payload,
            current: RefCell::new(initial),
            ending: Cell::new(false),
            pointer_moves: Cell::new(0),
            broken_drag_threshold: self.config.broken_drag_pointer_moves,
            unbind: RefCell::new(None),
        });

        let unbind = self.window.bind_all(Session::bindings(&session), Phase::Capture);
        *session.unbind.borrow_mut() = Some(unbind);

        dispatcher.start(event.drag_image_setter());
        true
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// State of one running session, shared by its native listeners.
struct Session<S> {
    state: Rc<SessionState>,
    dispatcher: Rc<Dispatcher<S>>,
    hit_test: HitTestFn<S>,
    source: Rc<S>,
    started_from: StartedFrom,
    drop_payload: Option<DropPayloadFn<S>>,
    /// Latest computed location, published or not.
    current: RefCell<DragLocation>,
    ending: Cell<bool>,
    pointer_moves: Cell<u32>,
    broken_drag_threshold: u32,
    unbind: RefCell<Option<Cleanup>>,
}

/// Tears a session down when dropped.
struct Teardown<'a, S: 'static>(&'a Session<S>);

impl<S: 'static> Drop for Teardown<'_, S> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

impl<S: 'static> Session<S> {
    fn bindings(this: &Rc<Self>) -> Vec<Binding> {
        let on = |kind: NativeEventKind, handler: fn(&Self, &mut NativeEvent)| {
            let session = Rc::clone(this);
            Binding::new(kind, move |event| {
                if !session.ending.get() {
                    handler(&session, event);
                }
            })
        };
        vec![
            on(NativeEventKind::DragOver, Self::on_drag_over),
            on(NativeEventKind::DragEnter, Self::on_drag_enter),
            on(NativeEventKind::DragLeave, Self::on_drag_leave),
            on(NativeEventKind::Drop, Self::on_drop),
            on(NativeEventKind::DragEnd, Self::on_drag_end),
            on(NativeEventKind::PointerMove, Self::on_pointer_move),
            on(NativeEventKind::PointerDown, Self::on_pointer_down),
        ]
    }

    fn on_drag_over(&self, event: &mut NativeEvent) {
        self.update(event);
        if self.ending.get() {
            return;
        }
        let current = self.current.borrow().clone();
        self.dispatcher.drag(current);
    }

    fn on_drag_enter(&self, event: &mut NativeEvent) {
        self.update(event);
    }

    fn on_drag_leave(&self, event: &mut NativeEvent) {
        if event.related_target.is_some() {
            return;
        }
        // The pointer left the window.
        self.set_targets(Vec::new(), None);
        if self.started_from == StartedFrom::External && !self.ending.get() {
            self.cancel();
        }
    }

    fn on_drop(&self, event: &mut NativeEvent) {
        self.current.borrow_mut().input = event.input;
        if self.current.borrow().drop_targets.is_empty() {
            self.cancel();
            return;
        }

        self.ending.set(true);
        let _teardown = Teardown(self);
        event.prevent_default();
        let current = self.current.borrow().clone();
        if let Some(innermost) = current.innermost() {
            event.set_drop_effect(innermost.drop_effect);
        }
        let updated = self.drop_payload.as_ref().map(|f| Rc::new(f(&*event)));
        self.dispatcher.publish_drop(current, updated);
    }

    fn on_drag_end(&self, event: &mut NativeEvent) {
        self.current.borrow_mut().input = event.input;
        self.cancel();
    }

    fn on_pointer_move(&self, event: &mut NativeEvent) {
        if !event.input.no_buttons() {
            return;
        }
        let moves = self.pointer_moves.get() + 1;
        self.pointer_moves.set(moves);
        if moves > self.broken_drag_threshold {
            debug!(
                kind = ?self.state.active_kind(),
                moves,
                "pointer moves without buttons; treating session as ended"
            );
            self.cancel();
        }
    }

    fn on_pointer_down(&self, _event: &mut NativeEvent) {
        debug!(kind = ?self.state.active_kind(), "pointer down mid-session; cancelling");
        self.cancel();
    }

    /// Re-run hit-testing for a move-like signal.
    fn update(&self, event: &mut NativeEvent) {
        // Drag signals prove the session is alive; the broken-session count
        // only tracks an uninterrupted run.
        self.pointer_moves.set(0);

        let previous = self.current.borrow().drop_targets.clone();
        let next = (self.hit_test)(&HitTestArgs {
            target: event.target,
            input: &event.input,
            source: &self.source,
            current: &previous,
        });
        if let Some(innermost) = next.first() {
            event.prevent_default();
            event.set_drop_effect(innermost.drop_effect);
        }
        self.set_targets(next, Some(event.input));
    }

    /// Record `targets` as current and publish a change if the hierarchy moved.
    fn set_targets(&self, targets: Vec<DropTargetRecord>, input: Option<Input>) {
        let changed = {
            let mut current = self.current.borrow_mut();
            let changed = hierarchy_changed(&current.drop_targets, &targets);
            current.drop_targets = targets;
            if let Some(input) = input {
                current.input = input;
            }
            changed
        };
        if changed {
            let current = self.current.borrow().clone();
            trace!(
                kind = ?self.state.active_kind(),
                targets = current.drop_targets.len(),
                "drop-target hierarchy changed"
            );
            self.dispatcher.drop_target_change(current);
        }
    }

    /// End the session as cancelled.
    fn cancel(&self) {
        if self.ending.replace(true) {
            return;
        }
        let _teardown = Teardown(self);
        if !self.current.borrow().drop_targets.is_empty() {
            self.current.borrow_mut().drop_targets.clear();
            let current = self.current.borrow().clone();
            self.dispatcher.drop_target_change(current);
        }
        let current = self.current.borrow().clone();
        self.dispatcher.publish_drop(current, None);
    }

    fn finish(&self) {
        self.dispatcher.discard_pending();
        let unbind = self.unbind.borrow_mut().take();
        if let Some(unbind) = unbind {
            unbind.run();
        }
        if self.state.active.replace(None).is_some() {
            debug!(kind = ?self.state.active_kind(), "drag session finished");
        }
    }
}
