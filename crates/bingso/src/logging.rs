//! Logging setup for bingso.
//!
//! Events go through `tracing`; the subscriber is a formatted layer behind
//! an `EnvFilter`, so `RUST_LOG` overrides the command-line verbosity.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above.
    Verbose,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// The tracing level for this verbosity.
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directives used when `RUST_LOG` is unset.
    ///
    /// Request tracing from `tower_http` follows the crate level once
    /// verbose output is on.
    #[must_use]
    pub fn default_directives(self) -> String {
        let level = self.level();
        match self {
            Self::Quiet | Self::Normal => format!("bingso={level},tower_http=warn"),
            Self::Verbose | Self::Trace => format!("bingso={level},tower_http={level}"),
        }
    }
}

/// Initialize the logging system.
///
/// Call once at startup; later calls are ignored.
///
/// # Examples
///
/// ```no_run
/// use bingso::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_directives()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    let _ = subscriber.try_init();
}

/// Initialize logging for tests, warnings and errors only.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
