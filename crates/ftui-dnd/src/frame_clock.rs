#![forbid(unsafe_code)]

//! Frame scheduling.
//!
//! Drag-start publication and move throttling are deferred to the host's next
//! paint opportunity. That capability is abstracted as a [`FrameClock`] so the
//! scheduler never depends on a real paint loop.
//!
//! - [`ManualFrameClock`] is host-driven: call
//!   [`advance_frame`](ManualFrameClock::advance_frame) once per paint. Tests
//!   use it to step frames deterministically.
//! - [`ScheduledTask`] layers schedule / flush / cancel with latest-wins
//!   semantics on top of any clock.
//!
//! # Invariants
//!
//! 1. Callbacks requested during a frame run on the following frame.
//! 2. A cancelled request never runs, even if its frame is already in progress.
//! 3. A `ScheduledTask` holds at most one frame request at a time.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

/// Work deferred to a frame.
pub type FrameCallback = Box<dyn FnOnce()>;

/// Identifier of a pending frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequestId(u64);

/// Host paint-callback capability.
pub trait FrameClock {
    /// Run `callback` at the next paint opportunity.
    fn request_frame(&self, callback: FrameCallback) -> FrameRequestId;

    /// Drop a pending request. Unknown or already-run ids are ignored.
    fn cancel_frame(&self, id: FrameRequestId);
}

// ---------------------------------------------------------------------------
// ManualFrameClock
// ---------------------------------------------------------------------------

/// Frame clock stepped explicitly by the host.
#[derive(Default)]
pub struct ManualFrameClock {
    next_id: Cell<u64>,
    queue: RefCell<VecDeque<(FrameRequestId, FrameCallback)>>,
    frames: Cell<u64>,
}

impl fmt::Debug for ManualFrameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualFrameClock")
            .field("pending", &self.pending())
            .field("frames", &self.frames.get())
            .finish()
    }
}

impl ManualFrameClock {
    /// Create a clock with nothing pending.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Number of callbacks waiting for the next frame.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Number of frames advanced so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frames.get()
    }

    /// Run every callback that was pending when this frame began.
    ///
    /// Returns the number of callbacks that ran.
    pub fn advance_frame(&self) -> usize {
        self.frames.set(self.frames.get() + 1);
        let due: Vec<FrameRequestId> = self.queue.borrow().iter().map(|(id, _)| *id).collect();
        let mut ran = 0;
        for id in due {
            // Take one at a time: earlier callbacks may cancel later ones.
            let callback = {
                let mut queue = self.queue.borrow_mut();
                queue
                    .iter()
                    .position(|(queued, _)| *queued == id)
                    .and_then(|index| queue.remove(index))
                    .map(|(_, callback)| callback)
            };
            if let Some(callback) = callback {
                callback();
                ran += 1;
            }
        }
        ran
    }
}

impl FrameClock for ManualFrameClock {
    fn request_frame(&self, callback: FrameCallback) -> FrameRequestId {
        let id = FrameRequestId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.queue.borrow_mut().push_back((id, callback));
        id
    }

    fn cancel_frame(&self, id: FrameRequestId) {
        self.queue.borrow_mut().retain(|(queued, _)| *queued != id);
    }
}

// ---------------------------------------------------------------------------
// ScheduledTask
// ---------------------------------------------------------------------------

/// A frame-deferred task with latest-wins coalescing.
///
/// Scheduling again before the frame replaces the pending work without
/// requesting another frame. [`flush`](Self::flush) runs pending work now;
/// [`cancel`](Self::cancel) discards it.
pub struct ScheduledTask {
    clock: Rc<dyn FrameClock>,
    request: Cell<Option<FrameRequestId>>,
    work: RefCell<Option<FrameCallback>>,
    this: Weak<ScheduledTask>,
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl ScheduledTask {
    /// Create an idle task on `clock`.
    pub fn new(clock: Rc<dyn FrameClock>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            clock,
            request: Cell::new(None),
            work: RefCell::new(None),
            this: this.clone(),
        })
    }

    /// Whether work is waiting for a frame.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.work.borrow().is_some()
    }

    /// Defer `work` to the next frame, replacing any pending work.
    pub fn schedule(&self, work: impl FnOnce() + 'static) {
        *self.work.borrow_mut() = Some(Box::new(work));
        if self.request.get().is_some() {
            return;
        }
        let this = self.this.clone();
        let id = self.clock.request_frame(Box::new(move || {
            if let Some(task) = this.upgrade() {
                task.request.set(None);
                task.run_pending();
            }
        }));
        self.request.set(Some(id));
    }

    /// Run pending work immediately, if any.
    pub fn flush(&self) {
        self.cancel_request();
        self.run_pending();
    }

    /// Discard pending work.
    pub fn cancel(&self) {
        self.cancel_request();
        self.work.borrow_mut().take();
    }

    fn cancel_request(&self) {
        if let Some(id) = self.request.take() {
            self.clock.cancel_frame(id);
        }
    }

    fn run_pending(&self) {
        let work = self.work.borrow_mut().take();
        if let Some(work) = work {
            work();
        }
    }
}
