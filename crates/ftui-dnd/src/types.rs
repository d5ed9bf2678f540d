#![forbid(unsafe_code)]

//! Shared data model for drag sessions.
//!
//! Defines the origin kinds, drop effects, drop-target records, drag
//! locations and the published [`DragEvent`].
//!
//! # Invariants
//!
//! 1. Every `Vec<DropTargetRecord>` in this crate is innermost-first.
//! 2. `DragLocationHistory::previous` equals the `current.drop_targets` of the
//!    last event actually dispatched, except for the preview and start events
//!    where it is empty.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::document::NodeId;
use crate::input::Input;
use crate::native::{NativeEvent, NativeSetDragImage};

// ---------------------------------------------------------------------------
// Origin kinds
// ---------------------------------------------------------------------------

/// Category of content a session drags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OriginKind {
    /// An in-page element.
    Element,
    /// Platform content (files, text from another application).
    External,
    /// A text selection inside the page.
    TextSelection,
}

impl OriginKind {
    /// Stable name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Element => "element",
            Self::External => "external",
            Self::TextSelection => "text-selection",
        }
    }

    /// Drop effect used when a drop target does not provide one.
    #[must_use]
    pub const fn default_drop_effect(self) -> DropEffect {
        match self {
            Self::Element | Self::TextSelection => DropEffect::Move,
            Self::External => DropEffect::Copy,
        }
    }
}

/// Where the dragged content came from.
///
/// Content that started outside the page cannot be tracked once the pointer
/// leaves the page again, so such sessions end on a window leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StartedFrom {
    /// The drag began on a local source.
    #[default]
    Internal,
    /// The drag began outside the page.
    External,
}

/// Cursor affordance requested by the innermost drop target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DropEffect {
    /// Dropping is not allowed.
    #[default]
    None,
    /// Content will be copied.
    Copy,
    /// Content will be linked.
    Link,
    /// Content will be moved.
    Move,
}

impl DropEffect {
    /// Name as used by native data-transfer objects.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Copy => "copy",
            Self::Link => "link",
            Self::Move => "move",
        }
    }
}

// ---------------------------------------------------------------------------
// Drop-target records
// ---------------------------------------------------------------------------

/// Opaque data attached to a drop-target record.
///
/// Cloning shares the same allocation, so a sticky record carries exactly
/// the value produced by its last genuine hit.
#[derive(Clone, Default)]
pub struct TargetData(Option<Rc<dyn Any>>);

impl TargetData {
    /// Wrap a value.
    #[must_use]
    pub fn new<T: Any>(value: T) -> Self {
        Self(Some(Rc::new(value)))
    }

    /// No data.
    #[must_use]
    pub fn empty() -> Self {
        Self(None)
    }

    /// True if no value is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the value as `T`, if it is one.
    #[must_use]
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Whether both handles share one allocation (or are both empty).
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for TargetData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => f.write_str("TargetData(..)"),
            None => f.write_str("TargetData(empty)"),
        }
    }
}

/// One drop target the pointer is currently over.
#[derive(Debug, Clone)]
pub struct DropTargetRecord {
    /// The registered element.
    pub element: NodeId,
    /// Data produced by the target's data callback.
    pub data: TargetData,
    /// Drop effect produced by the target.
    pub drop_effect: DropEffect,
    /// True when present only because of stickiness, not a genuine hit.
    pub is_active_due_to_stickiness: bool,
}

impl DropTargetRecord {
    /// A genuine (non-sticky) record.
    #[must_use]
    pub fn new(element: NodeId, data: TargetData, drop_effect: DropEffect) -> Self {
        Self {
            element,
            data,
            drop_effect,
            is_active_due_to_stickiness: false,
        }
    }
}

/// Whether two drop-target lists differ structurally.
///
/// Only list length and element identity matter; data, drop effect and the
/// stickiness flag are ignored.
#[must_use]
pub fn hierarchy_changed(current: &[DropTargetRecord], next: &[DropTargetRecord]) -> bool {
    current.len() != next.len()
        || current
            .iter()
            .zip(next)
            .any(|(a, b)| a.element != b.element)
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// One full hit-test result.
#[derive(Debug, Clone, Default)]
pub struct DragLocation {
    /// Pointer snapshot.
    pub input: Input,
    /// Drop targets under the pointer, innermost first.
    pub drop_targets: Vec<DropTargetRecord>,
}

impl DragLocation {
    /// Build a location.
    #[must_use]
    pub fn new(input: Input, drop_targets: Vec<DropTargetRecord>) -> Self {
        Self {
            input,
            drop_targets,
        }
    }

    /// Innermost drop target, if any.
    #[must_use]
    pub fn innermost(&self) -> Option<&DropTargetRecord> {
        self.drop_targets.first()
    }
}

/// Drop targets of the last published event.
#[derive(Debug, Clone, Default)]
pub struct PreviousLocation {
    /// Drop targets, innermost first.
    pub drop_targets: Vec<DropTargetRecord>,
}

/// Location history carried by every event.
#[derive(Debug, Clone)]
pub struct DragLocationHistory {
    /// Location when the session started.
    pub initial: DragLocation,
    /// Location this event describes.
    pub current: DragLocation,
    /// Drop targets of the previously dispatched event.
    pub previous: PreviousLocation,
}

// ---------------------------------------------------------------------------
// Session descriptor
// ---------------------------------------------------------------------------

/// Re-collects the source payload from the terminating native event.
pub type DropPayloadFn<S> = Rc<dyn Fn(&NativeEvent) -> S>;

/// Typed description of what a session drags.
pub struct DragType<S> {
    /// Origin kind.
    pub kind: OriginKind,
    /// Where the drag began.
    pub started_from: StartedFrom,
    /// Payload handed to consumers.
    pub payload: S,
    /// For content whose full payload is only readable on drop.
    pub drop_payload: Option<DropPayloadFn<S>>,
}

impl<S> DragType<S> {
    /// A session of `kind` that began on a local source.
    #[must_use]
    pub fn new(kind: OriginKind, payload: S) -> Self {
        Self {
            kind,
            started_from: StartedFrom::Internal,
            payload,
            drop_payload: None,
        }
    }

    /// Mark the session as having begun outside the page.
    #[must_use]
    pub fn started_externally(mut self) -> Self {
        self.started_from = StartedFrom::External;
        self
    }

    /// Re-collect the payload from the drop event.
    #[must_use]
    pub fn with_drop_payload(mut self, f: impl Fn(&NativeEvent) -> S + 'static) -> Self {
        self.drop_payload = Some(Rc::new(f));
        self
    }
}

impl<S: fmt::Debug> fmt::Debug for DragType<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DragType")
            .field("kind", &self.kind)
            .field("started_from", &self.started_from)
            .field("payload", &self.payload)
            .field("drop_payload", &self.drop_payload.as_ref().map(|_| ".."))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The five lifecycle events published to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Synchronous, before the platform snapshots the drag preview.
    GenerateDragPreview,
    /// First frame after the session started.
    DragStart,
    /// Throttled position feedback.
    Drag,
    /// The drop-target hierarchy changed.
    DropTargetChange,
    /// Terminal event, exactly once per session.
    Drop,
}

impl EventName {
    /// Stable name used in logs and test transcripts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GenerateDragPreview => "preview",
            Self::DragStart => "start",
            Self::Drag => "drag",
            Self::DropTargetChange => "change",
            Self::Drop => "drop",
        }
    }
}

/// A published lifecycle event.
pub struct DragEvent<S> {
    /// Which lifecycle event this is.
    pub name: EventName,
    /// Source payload (refreshed on drop for external content).
    pub source: Rc<S>,
    /// Location history.
    pub location: DragLocationHistory,
    /// Preview image setter; only present on the preview event.
    pub native_set_drag_image: Option<NativeSetDragImage>,
}

impl<S> Clone for DragEvent<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            source: Rc::clone(&self.source),
            location: self.location.clone(),
            native_set_drag_image: self.native_set_drag_image.clone(),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for DragEvent<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DragEvent")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("location", &self.location)
            .field(
                "native_set_drag_image",
                &self.native_set_drag_image.as_ref().map(|_| ".."),
            )
            .finish()
    }
}

/// An event delivered to one drop target, naming the target's own record.
pub struct ElementDragEvent<'a, S> {
    /// The shared event.
    pub event: &'a DragEvent<S>,
    /// This target's record in `current` (or `previous`, for leave events).
    pub this: &'a DropTargetRecord,
}

/// Sink the dispatch scheduler writes every event into.
pub type EventSink<S> = Rc<dyn Fn(&DragEvent<S>)>;
