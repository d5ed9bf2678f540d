#![forbid(unsafe_code)]

//! Per-origin-kind adapters.
//!
//! A [`DragDropContext`] bundles the host collaborators (window, document,
//! frame clock) with the shared mount ledger and the single lifecycle
//! manager. Every [`Adapter`] created from one context shares its session
//! flag, so at most one session runs across all origin kinds.
//!
//! An adapter owns the drop-target and monitor registries for its kind and
//! wires them into sessions it starts:
//!
//! ```text
//!   native start ─▶ Adapter::start ─▶ LifecycleManager::start
//!                                        │ hit-test: DropTargetRegistry::compute_over
//!                                        │ sink:     source hook → drop targets → monitors
//! ```

use std::fmt;
use std::rc::{Rc, Weak};

use crate::cleanup::Cleanup;
use crate::config::{AdapterConfig, DragDropConfig};
use crate::document::SharedDocument;
use crate::drop_target::{DropTargetArgs, DropTargetRegistry};
use crate::error::Result;
use crate::frame_clock::FrameClock;
use crate::ledger::MountLedger;
use crate::lifecycle::{HitTestArgs, HitTestFn, LifecycleManager};
use crate::logging::warn;
use crate::monitor::{MonitorArgs, MonitorRegistry};
use crate::native::{NativeEvent, Window};
use crate::types::{DragEvent, DragType, EventSink, OriginKind};

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Shared host collaborators and session state.
///
/// Cloning is cheap and yields a handle to the same context.
#[derive(Clone)]
pub struct DragDropContext {
    window: Rc<Window>,
    document: SharedDocument,
    clock: Rc<dyn FrameClock>,
    ledger: Rc<MountLedger>,
    lifecycle: Rc<LifecycleManager>,
}

impl fmt::Debug for DragDropContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DragDropContext")
            .field("window", &self.window)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl DragDropContext {
    /// Context with the default configuration.
    #[must_use]
    pub fn new(window: Rc<Window>, document: SharedDocument, clock: Rc<dyn FrameClock>) -> Self {
        Self::with_config(window, document, clock, DragDropConfig::default())
    }

    #[must_use]
    pub fn with_config(
        window: Rc<Window>,
        document: SharedDocument,
        clock: Rc<dyn FrameClock>,
        config: DragDropConfig,
    ) -> Self {
        let lifecycle = Rc::new(LifecycleManager::new(
            Rc::clone(&window),
            Rc::clone(&clock),
            config,
        ));
        Self {
            window,
            document,
            clock,
            ledger: MountLedger::new(),
            lifecycle,
        }
    }

    #[must_use]
    pub fn window(&self) -> &Rc<Window> {
        &self.window
    }

    #[must_use]
    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    #[must_use]
    pub fn clock(&self) -> &Rc<dyn FrameClock> {
        &self.clock
    }

    #[must_use]
    pub fn ledger(&self) -> &Rc<MountLedger> {
        &self.ledger
    }

    #[must_use]
    pub fn lifecycle(&self) -> &Rc<LifecycleManager> {
        &self.lifecycle
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Registration and session entry point for one origin kind.
pub struct Adapter<S> {
    config: AdapterConfig<S>,
    context: DragDropContext,
    drop_targets: Rc<DropTargetRegistry<S>>,
    monitors: Rc<MonitorRegistry<S>>,
    this: Weak<Adapter<S>>,
}

impl<S> fmt::Debug for Adapter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("config", &self.config)
            .field("drop_targets", &self.drop_targets)
            .field("monitors", &self.monitors)
            .finish_non_exhaustive()
    }
}

impl<S: 'static> Adapter<S> {
    /// Create an adapter on `context`.
    #[must_use]
    pub fn new(context: &DragDropContext, config: AdapterConfig<S>) -> Rc<Self> {
        let drop_targets = DropTargetRegistry::new(
            config.kind,
            config.default_drop_effect,
            Rc::clone(&context.document),
        );
        Rc::new_cyclic(|this| Self {
            config,
            context: context.clone(),
            drop_targets,
            monitors: MonitorRegistry::new(),
            this: this.clone(),
        })
    }

    /// Origin kind this adapter serves.
    #[must_use]
    pub fn kind(&self) -> OriginKind {
        self.config.kind
    }

    #[must_use]
    pub fn context(&self) -> &DragDropContext {
        &self.context
    }

    #[must_use]
    pub fn drop_targets(&self) -> &Rc<DropTargetRegistry<S>> {
        &self.drop_targets
    }

    #[must_use]
    pub fn monitors(&self) -> &Rc<MonitorRegistry<S>> {
        &self.monitors
    }

    /// Whether a session could start now (no session active in the context).
    #[must_use]
    pub fn can_start(&self) -> bool {
        self.context.lifecycle.can_start()
    }

    /// Register a drop target for this kind.
    ///
    /// Mounts the adapter's global listeners if this is the first consumer.
    /// The cleanup unregisters, then releases the mount.
    pub fn drop_target_for(&self, args: DropTargetArgs<S>) -> Result<Cleanup> {
        let release = self.acquire();
        match self.drop_targets.register(args) {
            Ok(unregister) => Ok(Cleanup::combine([release, unregister])),
            Err(err) => {
                release.run();
                Err(err)
            }
        }
    }

    /// Register a monitor for this kind.
    pub fn monitor_for(&self, args: MonitorArgs<S>) -> Cleanup {
        let release = self.acquire();
        let unregister = self.monitors.register(args);
        Cleanup::combine([release, unregister])
    }

    fn acquire(&self) -> Cleanup {
        let this = self.this.clone();
        let mount = Rc::clone(&self.config.mount);
        self.context.ledger.acquire(self.config.kind, move || {
            this.upgrade()
                .map_or_else(Cleanup::noop, |adapter| mount(&adapter))
        })
    }

    /// Begin a session of this adapter's kind.
    ///
    /// Returns `false` when another session is already active, or when
    /// `drag_type` names a different origin kind than this adapter serves.
    pub fn start(&self, event: &mut NativeEvent, drag_type: DragType<S>) -> bool {
        if drag_type.kind != self.config.kind {
            warn!(
                adapter = self.config.kind.as_str(),
                requested = drag_type.kind.as_str(),
                "start refused: origin kind does not match the adapter"
            );
            return false;
        }

        let registry = Rc::clone(&self.drop_targets);
        let hit_test: HitTestFn<S> = Rc::new(move |args: &HitTestArgs<'_, S>| {
            registry.compute_over(args.target, args.input, args.source, args.current)
        });

        let source_hook = self.config.source_hook.clone();
        let drop_targets = Rc::clone(&self.drop_targets);
        let monitors = Rc::clone(&self.monitors);
        let sink: EventSink<S> = Rc::new(move |event: &DragEvent<S>| {
            if let Some(hook) = &source_hook {
                hook(event);
            }
            drop_targets.dispatch(event);
            monitors.dispatch(event);
        });

        self.context.lifecycle.start(event, drag_type, hit_test, sink)
    }
}
