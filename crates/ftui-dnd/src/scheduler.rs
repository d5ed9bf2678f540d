#![forbid(unsafe_code)]

//! Ordered, throttled publication of lifecycle events.
//!
//! The platform delivers drag signals in bursts and in an order that does not
//! match what consumers need. [`Dispatcher`] imposes a fixed order on one
//! session's publications:
//!
//! ```text
//! preview → start → { change | drag }* → drop
//! ```
//!
//! | Event | Timing |
//! |-------|--------|
//! | preview | synchronous, immediately |
//! | start | next frame (preview-time mutations are visible to it) |
//! | change | synchronous; flushes a pending start, cancels a pending drag |
//! | drag | coalesced to one per frame, latest location wins; flushes start |
//! | drop | synchronous, once; flushes start, cancels a pending drag |
//!
//! # Invariants
//!
//! 1. `previous` of event N+1 equals `current.drop_targets` of event N.
//!    The preview and start events both report an empty `previous`.
//! 2. Start is always published before any change, drag or drop.
//! 3. At most one drop is published; later calls are ignored.
//! 4. No borrow is held while the sink runs, so consumers may re-enter.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::frame_clock::{FrameClock, ScheduledTask};
use crate::logging::trace;
use crate::native::NativeSetDragImage;
use crate::types::{
    DragEvent, DragLocation, DragLocationHistory, EventName, EventSink, PreviousLocation,
};

/// Per-session event publisher.
pub struct Dispatcher<S> {
    source: Rc<S>,
    initial: DragLocation,
    sink: EventSink<S>,
    previous: RefCell<PreviousLocation>,
    start_task: Rc<ScheduledTask>,
    drag_task: Rc<ScheduledTask>,
    /// Latest location for the pending throttled drag.
    pending_drag: RefCell<Option<DragLocation>>,
    dropped: Cell<bool>,
    published: Cell<u64>,
    this: Weak<Dispatcher<S>>,
}

impl<S> fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("start_pending", &self.start_task.is_pending())
            .field("drag_pending", &self.drag_task.is_pending())
            .field("dropped", &self.dropped.get())
            .field("published", &self.published.get())
            .finish()
    }
}

impl<S: 'static> Dispatcher<S> {
    /// Create a publisher for one session.
    pub fn new(
        source: Rc<S>,
        initial: DragLocation,
        sink: EventSink<S>,
        clock: Rc<dyn FrameClock>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            source,
            initial,
            sink,
            previous: RefCell::new(PreviousLocation::default()),
            start_task: ScheduledTask::new(Rc::clone(&clock)),
            drag_task: ScheduledTask::new(clock),
            pending_drag: RefCell::new(None),
            dropped: Cell::new(false),
            published: Cell::new(0),
            this: this.clone(),
        })
    }

    /// Number of events handed to the sink so far.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.get()
    }

    /// Whether the terminal drop has been published.
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.dropped.get()
    }

    /// Whether the start event is still waiting for its frame.
    #[must_use]
    pub fn start_pending(&self) -> bool {
        self.start_task.is_pending()
    }

    /// Whether a throttled drag is waiting for its frame.
    #[must_use]
    pub fn drag_pending(&self) -> bool {
        self.drag_task.is_pending()
    }

    /// Publish the preview now and schedule the start for the next frame.
    pub fn start(&self, native_set_drag_image: Option<NativeSetDragImage>) {
        let location = DragLocationHistory {
            initial: self.initial.clone(),
            current: self.initial.clone(),
            previous: PreviousLocation::default(),
        };
        self.publish(DragEvent {
            name: EventName::GenerateDragPreview,
            source: Rc::clone(&self.source),
            location: location.clone(),
            native_set_drag_image,
        });

        let this = self.this.clone();
        self.start_task.schedule(move || {
            if let Some(this) = this.upgrade() {
                this.publish(DragEvent {
                    name: EventName::DragStart,
                    source: Rc::clone(&this.source),
                    location,
                    native_set_drag_image: None,
                });
            }
        });
    }

    /// Publish a drop-target hierarchy change now.
    pub fn drop_target_change(&self, current: DragLocation) {
        if self.dropped.get() {
            return;
        }
        self.start_task.flush();
        self.cancel_drag();
        let event = self.event(EventName::DropTargetChange, current, None);
        self.publish(event);
    }

    /// Schedule a throttled drag for the next frame.
    ///
    /// Repeated calls within one frame collapse into one publication carrying
    /// the latest location.
    pub fn drag(&self, current: DragLocation) {
        if self.dropped.get() {
            return;
        }
        *self.pending_drag.borrow_mut() = Some(current);
        let this = self.this.clone();
        self.drag_task.schedule(move || {
            if let Some(this) = this.upgrade() {
                this.publish_pending_drag();
            }
        });
    }

    fn publish_pending_drag(&self) {
        self.start_task.flush();
        let current = self.pending_drag.borrow_mut().take();
        if let Some(current) = current {
            // `previous` is read now, not when the drag was scheduled, so a
            // change published in between is reflected.
            let event = self.event(EventName::Drag, current, None);
            self.publish(event);
        }
    }

    /// Publish the terminal drop.
    ///
    /// `updated_source` replaces the original payload for content whose full
    /// data is only readable on drop.
    pub fn publish_drop(&self, current: DragLocation, updated_source: Option<Rc<S>>) {
        if self.dropped.replace(true) {
            trace!("ignoring duplicate drop publication");
            return;
        }
        self.start_task.flush();
        self.cancel_drag();
        let mut event = self.event(EventName::Drop, current, None);
        if let Some(source) = updated_source {
            event.source = source;
        }
        self.publish(event);
    }

    /// Discard any frame work without publishing.
    ///
    /// Used by session teardown when the drop path did not complete.
    pub fn discard_pending(&self) {
        self.start_task.cancel();
        self.cancel_drag();
    }

    fn cancel_drag(&self) {
        self.drag_task.cancel();
        self.pending_drag.borrow_mut().take();
    }

    fn event(
        &self,
        name: EventName,
        current: DragLocation,
        native_set_drag_image: Option<NativeSetDragImage>,
    ) -> DragEvent<S> {
        DragEvent {
            name,
            source: Rc::clone(&self.source),
            location: DragLocationHistory {
                initial: self.initial.clone(),
                current,
                previous: self.previous.borrow().clone(),
            },
            native_set_drag_image,
        }
    }

    fn publish(&self, event: DragEvent<S>) {
        trace!(
            event = event.name.as_str(),
            targets = event.location.current.drop_targets.len(),
            "publishing"
        );
        self.published.set(self.published.get() + 1);
        (self.sink)(&event);
        *self.previous.borrow_mut() = PreviousLocation {
            drop_targets: event.location.current.drop_targets,
        };
    }
}
