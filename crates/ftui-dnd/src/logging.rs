#![forbid(unsafe_code)]

//! Logging for session orchestration.
//!
//! With the `tracing` feature the macros below are the real `tracing` macros.
//! Without it, call sites still compile against no-op stand-ins, so the
//! lifecycle code never needs `#[cfg]` noise around its log statements.
//!
//! The `tracing-json` feature additionally provides [`init_json`], which
//! installs a JSON subscriber filtered by the `FTUI_DND_LOG` environment
//! variable (same syntax as `RUST_LOG`).

#[cfg(feature = "tracing")]
pub use tracing::{debug, trace, warn};

#[cfg(not(feature = "tracing"))]
mod noop_macros {
    /// No-op debug macro when tracing is disabled.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op trace macro when tracing is disabled.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op warn macro when tracing is disabled.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }
}

#[cfg(not(feature = "tracing"))]
pub use crate::{debug, trace, warn};

/// Environment variable holding the log filter for [`init_json`].
pub const ENV_LOG_FILTER: &str = "FTUI_DND_LOG";

/// Install a global JSON subscriber for drag-and-drop diagnostics.
///
/// Returns `false` when a global subscriber was already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(ENV_LOG_FILTER)
        .unwrap_or_else(|_| EnvFilter::new("ftui_dnd=debug"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
