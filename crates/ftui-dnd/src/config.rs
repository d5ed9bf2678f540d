#![forbid(unsafe_code)]

//! Session and adapter configuration.
//!
//! [`DragDropConfig`] tunes the lifecycle manager. It can be built in code or
//! read from the environment:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `FTUI_DND_BROKEN_DRAG_MOVES` | pointer moves without buttons tolerated before a session is treated as broken |
//!
//! [`AdapterConfig`] describes one origin kind's adapter.

use std::fmt;
use std::rc::Rc;

use crate::adapter::Adapter;
use crate::cleanup::Cleanup;
use crate::types::{DropEffect, EventSink, OriginKind};

const ENV_BROKEN_DRAG_MOVES: &str = "FTUI_DND_BROKEN_DRAG_MOVES";

/// Default number of button-less pointer moves tolerated mid-session.
pub const DEFAULT_BROKEN_DRAG_POINTER_MOVES: u32 = 20;

/// Lifecycle tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragDropConfig {
    /// A run of more than this many pointer moves with no buttons pressed
    /// ends the session.
    pub broken_drag_pointer_moves: u32,
}

impl Default for DragDropConfig {
    fn default() -> Self {
        Self {
            broken_drag_pointer_moves: DEFAULT_BROKEN_DRAG_POINTER_MOVES,
        }
    }
}

impl DragDropConfig {
    /// Set the broken-session threshold.
    #[must_use]
    pub fn with_broken_drag_threshold(mut self, moves: u32) -> Self {
        self.broken_drag_pointer_moves = moves;
        self
    }

    /// Read overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Read overrides through `get_env`. Unparseable values are ignored.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(moves) = get_env(ENV_BROKEN_DRAG_MOVES).and_then(|v| v.trim().parse().ok()) {
            config.broken_drag_pointer_moves = moves;
        }
        config
    }
}

/// Installs an adapter's global listeners; returns their removal.
pub type MountFn<S> = Rc<dyn Fn(&Rc<Adapter<S>>) -> Cleanup>;

/// Configuration of one origin kind's adapter.
pub struct AdapterConfig<S> {
    /// Origin kind the adapter serves.
    pub kind: OriginKind,
    /// Drop effect for targets that do not provide one.
    pub default_drop_effect: DropEffect,
    /// Global listener installation, run on first registration.
    pub mount: MountFn<S>,
    /// Receives every event before drop targets and monitors.
    pub source_hook: Option<EventSink<S>>,
}

impl<S: 'static> AdapterConfig<S> {
    /// Adapter for `kind` with the kind's default drop effect and no mount.
    #[must_use]
    pub fn new(kind: OriginKind) -> Self {
        Self {
            kind,
            default_drop_effect: kind.default_drop_effect(),
            mount: Rc::new(|_: &Rc<Adapter<S>>| Cleanup::noop()),
            source_hook: None,
        }
    }

    #[must_use]
    pub fn with_default_drop_effect(mut self, effect: DropEffect) -> Self {
        self.default_drop_effect = effect;
        self
    }

    /// Listener installation run when the first consumer registers.
    #[must_use]
    pub fn with_mount(mut self, mount: impl Fn(&Rc<Adapter<S>>) -> Cleanup + 'static) -> Self {
        self.mount = Rc::new(mount);
        self
    }

    #[must_use]
    pub fn with_source_hook(mut self, hook: EventSink<S>) -> Self {
        self.source_hook = Some(hook);
        self
    }
}

impl<S> fmt::Debug for AdapterConfig<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("kind", &self.kind)
            .field("default_drop_effect", &self.default_drop_effect)
            .field("source_hook", &self.source_hook.is_some())
            .finish_non_exhaustive()
    }
}
