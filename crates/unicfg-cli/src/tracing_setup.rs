//! Tracing subscriber initialization for the unicfg binary.
//!
//! Priority (highest to lowest): `UNICFG_LOG` env var (per-target
//! directives), `RUST_LOG`, then the CLI-derived default (`-q` → error,
//! otherwise warn). Output goes to stderr so command output on stdout
//! stays machine-readable.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Verbosity derived from CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// `-q`: only errors.
    Quiet,
    /// Default: warnings and above.
    Normal,
}

impl Verbosity {
    #[must_use]
    pub const fn from_quiet(quiet: bool) -> Self {
        if quiet { Self::Quiet } else { Self::Normal }
    }

    #[must_use]
    pub const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
        }
    }
}

/// Initialize the global subscriber. Call once, before any command runs.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_subscriber(verbosity: Verbosity) {
    let filter = build_env_filter(verbosity);
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .without_time()
                .compact(),
        )
        .init();
}

fn build_env_filter(verbosity: Verbosity) -> EnvFilter {
    if let Ok(directives) = std::env::var("UNICFG_LOG")
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = verbosity.default_level();
    EnvFilter::try_new(level.as_str()).unwrap_or_else(|_| EnvFilter::new("warn"))
}
