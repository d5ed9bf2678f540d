#![forbid(unsafe_code)]

//! Native event stream model.
//!
//! The host forwards its platform pointer/drag signals as [`NativeEvent`]s
//! into a [`Window`]. Listeners are bound per event kind in either the
//! capture or bubble [`Phase`]; the lifecycle binds in the capture phase so it
//! observes every signal before consumer code can stop its propagation.
//!
//! # Dispatch semantics
//!
//! - Capture listeners run first, in binding order, then bubble listeners.
//! - [`NativeEvent::stop_propagation`] during capture skips the bubble phase.
//! - The listener list is snapshotted when dispatch begins: listeners bound
//!   mid-dispatch do not see the in-flight event, listeners unbound
//!   mid-dispatch (and not yet reached) are skipped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::cleanup::Cleanup;
use crate::document::NodeId;
use crate::input::Input;
use crate::types::DropEffect;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Kind of native signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeEventKind {
    /// A drag gesture began on a source.
    DragStart,
    /// The drag entered a node.
    DragEnter,
    /// The drag is over a node (fires repeatedly).
    DragOver,
    /// The drag left a node.
    DragLeave,
    /// Content was dropped.
    Drop,
    /// The drag gesture finished (dropped or cancelled) on the source side.
    DragEnd,
    /// Pointer moved (no native drag in progress, or a broken one).
    PointerMove,
    /// Pointer button pressed.
    PointerDown,
}

/// Drag image chosen during preview generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragImage {
    /// Element to snapshot.
    pub element: NodeId,
    /// Horizontal offset of the pointer inside the image.
    pub x: f64,
    /// Vertical offset of the pointer inside the image.
    pub y: f64,
}

/// Platform data-transfer object attached to drag events.
#[derive(Debug, Default)]
pub struct DataTransfer {
    drop_effect: Cell<DropEffect>,
    items: RefCell<Vec<(String, String)>>,
    drag_image: Cell<Option<DragImage>>,
}

impl DataTransfer {
    /// Empty data transfer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current drop effect (what the cursor shows).
    #[must_use]
    pub fn drop_effect(&self) -> DropEffect {
        self.drop_effect.get()
    }

    /// Set the drop effect.
    pub fn set_drop_effect(&self, effect: DropEffect) {
        self.drop_effect.set(effect);
    }

    /// Store `data` under `format`, replacing an existing entry.
    pub fn set_data(&self, format: &str, data: &str) {
        let mut items = self.items.borrow_mut();
        if let Some(slot) = items.iter_mut().find(|(f, _)| f == format) {
            slot.1 = data.to_string();
        } else {
            items.push((format.to_string(), data.to_string()));
        }
    }

    /// Data stored under `format`.
    #[must_use]
    pub fn get_data(&self, format: &str) -> Option<String> {
        self.items
            .borrow()
            .iter()
            .find(|(f, _)| f == format)
            .map(|(_, d)| d.clone())
    }

    /// Formats present, in insertion order.
    #[must_use]
    pub fn types(&self) -> Vec<String> {
        self.items.borrow().iter().map(|(f, _)| f.clone()).collect()
    }

    /// Image chosen for the drag preview, if any.
    #[must_use]
    pub fn drag_image(&self) -> Option<DragImage> {
        self.drag_image.get()
    }

    fn set_drag_image(&self, image: DragImage) {
        self.drag_image.set(Some(image));
    }
}

/// Handle that lets preview consumers choose the native drag image.
#[derive(Clone)]
pub struct NativeSetDragImage {
    data_transfer: Rc<DataTransfer>,
}

impl NativeSetDragImage {
    /// Use `element` as the drag image with the pointer at `(x, y)` inside it.
    pub fn set(&self, element: NodeId, x: f64, y: f64) {
        self.data_transfer
            .set_drag_image(DragImage { element, x, y });
    }
}

impl fmt::Debug for NativeSetDragImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeSetDragImage").finish_non_exhaustive()
    }
}

/// One native signal.
#[derive(Debug, Clone)]
pub struct NativeEvent {
    /// Signal kind.
    pub kind: NativeEventKind,
    /// Node under the pointer.
    pub target: Option<NodeId>,
    /// Node being entered/left towards, for enter/leave signals.
    pub related_target: Option<NodeId>,
    /// Pointer snapshot at this signal.
    pub input: Input,
    /// Data transfer, present on drag signals.
    pub data_transfer: Option<Rc<DataTransfer>>,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl NativeEvent {
    /// Create a signal with no target and no data transfer.
    #[must_use]
    pub fn new(kind: NativeEventKind, input: Input) -> Self {
        Self {
            kind,
            target: None,
            related_target: None,
            input,
            data_transfer: None,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// Set the node under the pointer.
    #[must_use]
    pub fn with_target(mut self, target: NodeId) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the related node.
    #[must_use]
    pub fn with_related_target(mut self, related: NodeId) -> Self {
        self.related_target = Some(related);
        self
    }

    /// Attach a data transfer.
    #[must_use]
    pub fn with_data_transfer(mut self, data_transfer: Rc<DataTransfer>) -> Self {
        self.data_transfer = Some(data_transfer);
        self
    }

    /// Tell the platform this signal was handled (accepts drag-over/drop).
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Whether [`prevent_default`](Self::prevent_default) was called.
    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Stop the event from reaching bubble-phase listeners.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Whether [`stop_propagation`](Self::stop_propagation) was called.
    #[must_use]
    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    /// Write the innermost target's drop effect onto the data transfer.
    pub(crate) fn set_drop_effect(&self, effect: DropEffect) {
        if let Some(dt) = &self.data_transfer {
            dt.set_drop_effect(effect);
        }
    }

    /// Image setter for preview consumers, when a data transfer is attached.
    pub(crate) fn drag_image_setter(&self) -> Option<NativeSetDragImage> {
        self.data_transfer
            .as_ref()
            .map(|dt| NativeSetDragImage {
                data_transfer: Rc::clone(dt),
            })
    }
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Listener phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Runs before bubble listeners and cannot be skipped by them.
    Capture,
    /// Runs after capture listeners, unless propagation was stopped.
    Bubble,
}

/// A native listener.
pub type Listener = Rc<dyn Fn(&mut NativeEvent)>;

/// One (event kind, listener) pair for [`Window::bind_all`].
pub struct Binding {
    /// Event kind to listen for.
    pub kind: NativeEventKind,
    /// Listener to run.
    pub listener: Listener,
}

impl Binding {
    /// Build a binding.
    pub fn new(kind: NativeEventKind, listener: impl Fn(&mut NativeEvent) + 'static) -> Self {
        Self {
            kind,
            listener: Rc::new(listener),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").field("kind", &self.kind).finish()
    }
}

struct ListenerEntry {
    id: u64,
    kind: NativeEventKind,
    phase: Phase,
    listener: Listener,
}

/// Native event target the host dispatches into.
#[derive(Default)]
pub struct Window {
    listeners: RefCell<Vec<ListenerEntry>>,
    next_id: Cell<u64>,
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

impl Window {
    /// Create a window with no listeners.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Bind a group of listeners in one phase.
    ///
    /// The returned cleanup unbinds all of them.
    pub fn bind_all(self: &Rc<Self>, bindings: Vec<Binding>, phase: Phase) -> Cleanup {
        let mut ids = Vec::with_capacity(bindings.len());
        {
            let mut listeners = self.listeners.borrow_mut();
            for binding in bindings {
                let id = self.next_id.get();
                self.next_id.set(id + 1);
                ids.push(id);
                listeners.push(ListenerEntry {
                    id,
                    kind: binding.kind,
                    phase,
                    listener: binding.listener,
                });
            }
        }
        let window = Rc::downgrade(self);
        Cleanup::new(move || {
            if let Some(window) = window.upgrade() {
                window
                    .listeners
                    .borrow_mut()
                    .retain(|entry| !ids.contains(&entry.id));
            }
        })
    }

    /// Bind a single listener.
    pub fn bind(self: &Rc<Self>, binding: Binding, phase: Phase) -> Cleanup {
        self.bind_all(vec![binding], phase)
    }

    /// Number of listeners bound for `kind` (both phases).
    #[must_use]
    pub fn listener_count(&self, kind: NativeEventKind) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|entry| entry.kind == kind)
            .count()
    }

    /// Total number of bound listeners.
    #[must_use]
    pub fn total_listeners(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn snapshot(&self, kind: NativeEventKind, phase: Phase) -> Vec<(u64, Listener)> {
        self.listeners
            .borrow()
            .iter()
            .filter(|entry| entry.kind == kind && entry.phase == phase)
            .map(|entry| (entry.id, Rc::clone(&entry.listener)))
            .collect()
    }

    fn is_bound(&self, id: u64) -> bool {
        self.listeners.borrow().iter().any(|entry| entry.id == id)
    }

    /// Deliver a native signal to bound listeners.
    pub fn dispatch(&self, event: &mut NativeEvent) {
        for phase in [Phase::Capture, Phase::Bubble] {
            if phase == Phase::Bubble && event.propagation_stopped() {
                return;
            }
            for (id, listener) in self.snapshot(event.kind, phase) {
                if self.is_bound(id) {
                    listener(event);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> impl Fn(&mut NativeEvent) + 'static {
        let log = Rc::clone(log);
        move |_| log.borrow_mut().push(tag)
    }

    #[test]
    fn capture_runs_before_bubble() {
        let window = Window::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let _b = window.bind(
            Binding::new(NativeEventKind::DragOver, recorder(&log, "bubble")),
            Phase::Bubble,
        );
        let _c = window.bind(
            Binding::new(NativeEventKind::DragOver, recorder(&log, "capture")),
            Phase::Capture,
        );
        window.dispatch(&mut NativeEvent::new(NativeEventKind::DragOver, Input::default()));
        assert_eq!(*log.borrow(), vec!["capture", "bubble"]);
    }

    #[test]
    fn stop_propagation_skips_bubble_only() {
        let window = Window::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let _stopper = window.bind(
            Binding::new(NativeEventKind::Drop, move |ev| {
                l.borrow_mut().push("stopper");
                ev.stop_propagation();
            }),
            Phase::Capture,
        );
        let _later_capture = window.bind(
            Binding::new(NativeEventKind::Drop, recorder(&log, "capture")),
            Phase::Capture,
        );
        let _bubble = window.bind(
            Binding::new(NativeEventKind::Drop, recorder(&log, "bubble")),
            Phase::Bubble,
        );
        window.dispatch(&mut NativeEvent::new(NativeEventKind::Drop, Input::default()));
        assert_eq!(*log.borrow(), vec!["stopper", "capture"]);
    }

    #[test]
    fn unbind_removes_listeners() {
        let window = Window::new();
        let cleanup = window.bind_all(
            vec![
                Binding::new(NativeEventKind::DragEnter, |_| {}),
                Binding::new(NativeEventKind::DragLeave, |_| {}),
            ],
            Phase::Capture,
        );
        assert_eq!(window.total_listeners(), 2);
        cleanup.run();
        assert_eq!(window.total_listeners(), 0);
    }

    #[test]
    fn listener_unbound_mid_dispatch_is_skipped() {
        let window = Window::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let victim: Rc<RefCell<Option<Cleanup>>> = Rc::new(RefCell::new(None));

        let v = Rc::clone(&victim);
        let _first = window.bind(
            Binding::new(NativeEventKind::DragOver, move |_| {
                if let Some(cleanup) = v.borrow_mut().take() {
                    cleanup.run();
                }
            }),
            Phase::Capture,
        );
        let second = window.bind(
            Binding::new(NativeEventKind::DragOver, recorder(&log, "second")),
            Phase::Capture,
        );
        *victim.borrow_mut() = Some(second);

        window.dispatch(&mut NativeEvent::new(NativeEventKind::DragOver, Input::default()));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn data_transfer_items_and_effect() {
        let dt = DataTransfer::new();
        dt.set_data("text/plain", "a");
        dt.set_data("text/uri-list", "b");
        dt.set_data("text/plain", "c");
        assert_eq!(dt.get_data("text/plain").as_deref(), Some("c"));
        assert_eq!(dt.types(), vec!["text/plain", "text/uri-list"]);
        assert_eq!(dt.drop_effect(), DropEffect::None);
        dt.set_drop_effect(DropEffect::Copy);
        assert_eq!(dt.drop_effect(), DropEffect::Copy);
    }

    #[test]
    fn drag_image_setter_writes_through() {
        let dt = Rc::new(DataTransfer::new());
        let event = NativeEvent::new(NativeEventKind::DragStart, Input::default())
            .with_data_transfer(Rc::clone(&dt));
        let setter = event.drag_image_setter().unwrap();
        setter.set(NodeId::from_raw(4), 2.0, 3.0);
        assert_eq!(
            dt.drag_image(),
            Some(DragImage {
                element: NodeId::from_raw(4),
                x: 2.0,
                y: 3.0
            })
        );
    }
}
