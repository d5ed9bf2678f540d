#![forbid(unsafe_code)]

//! Drag-and-drop: session lifecycle, drop-target hit-testing, monitors, and
//! ordered event dispatch over a host's native drag signals.
//!
//! # Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`lifecycle`] | single-session state machine bound to native signals |
//! | [`drop_target`] | registry, hit-testing with stickiness, element-scoped dispatch |
//! | [`monitor`] | global observers with per-session eligibility |
//! | [`scheduler`] | preview/start/change/drag/drop ordering and throttling |
//! | [`ledger`] | reference-counted global listener mounting |
//! | [`adapter`] | per-origin-kind wiring of the above |
//! | [`document`], [`native`] | host element tree and native event target |
//!
//! # Example
//!
//! ```
//! use ftui_dnd::{
//!     Adapter, AdapterConfig, Document, DragDropContext, DragType, DropTargetArgs,
//!     Input, ManualFrameClock, NativeEvent, NativeEventKind, OriginKind, Window,
//! };
//!
//! let clock = ManualFrameClock::new();
//! let ctx = DragDropContext::new(Window::new(), Document::shared(), clock.clone());
//! let adapter = Adapter::<&'static str>::new(&ctx, AdapterConfig::new(OriginKind::Element));
//!
//! let column = {
//!     let mut doc = ctx.document().borrow_mut();
//!     let root = doc.root();
//!     doc.append_element(root).unwrap()
//! };
//! let _target = adapter
//!     .drop_target_for(DropTargetArgs::new(column).on_drop(|ev| {
//!         assert_eq!(*ev.event.source, "card-1");
//!     }))
//!     .unwrap();
//!
//! let mut start = NativeEvent::new(NativeEventKind::DragStart, Input::at(4.0, 4.0));
//! assert!(adapter.start(&mut start, DragType::new(OriginKind::Element, "card-1")));
//!
//! let over = Input::at(9.0, 9.0);
//! ctx.window()
//!     .dispatch(&mut NativeEvent::new(NativeEventKind::DragEnter, over).with_target(column));
//! ctx.window()
//!     .dispatch(&mut NativeEvent::new(NativeEventKind::Drop, over).with_target(column));
//! assert!(adapter.can_start());
//! ```

pub mod adapter;
pub mod cleanup;
pub mod config;
pub mod document;
pub mod drop_target;
pub mod error;
pub mod frame_clock;
pub mod input;
pub mod ledger;
pub mod lifecycle;
pub mod logging;
pub mod monitor;
pub mod native;
pub mod scheduler;
pub mod types;

pub use adapter::{Adapter, DragDropContext};
pub use cleanup::Cleanup;
pub use config::{AdapterConfig, DragDropConfig};
pub use document::{Document, Markers, NodeId, SharedDocument, mark_draggable};
pub use drop_target::{DropTargetArgs, DropTargetFeedback, DropTargetRegistry};
pub use error::{DndError, Result};
pub use frame_clock::{FrameClock, ManualFrameClock, ScheduledTask};
pub use input::{Input, Modifiers, MouseButton, MouseButtons};
pub use ledger::MountLedger;
pub use lifecycle::{HitTestArgs, HitTestFn, LifecycleManager, SessionState};
pub use monitor::{MonitorArgs, MonitorFeedback, MonitorRegistry};
pub use native::{Binding, DataTransfer, NativeEvent, NativeEventKind, Phase, Window};
pub use types::{
    DragEvent, DragLocation, DragLocationHistory, DragType, DropEffect, DropTargetRecord,
    ElementDragEvent, EventName, EventSink, OriginKind, PreviousLocation, StartedFrom, TargetData,
};

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, trace, warn};
