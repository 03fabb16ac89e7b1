//! Logging setup
//!
//! The library only emits `tracing` events. Binaries and tests that want to
//! see them call [`init`] once; `RUST_LOG` overrides the default directive.
//!
//! ```rust
//! trackbench::logging::init("trackbench=info");
//! ```

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG` or `default_directive`.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes.
pub fn init(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
