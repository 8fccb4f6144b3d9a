//! Logging setup
//!
//! Thin initialization layer over `tracing-subscriber`. Library code only
//! emits `tracing` events; binaries and tests opt into a subscriber here.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Options for the global subscriber
#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info")
    pub default_filter: Option<String>,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,

    /// Also write daily-rolled log files into this directory
    pub file_dir: Option<PathBuf>,
}

impl LoggingOptions {
    /// Options with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback filter directive
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = Some(filter.into());
        self
    }

    /// Emit JSON lines
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Write daily-rolled log files into `dir`
    pub fn with_file_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.file_dir = Some(dir.into());
        self
    }
}

/// Install the global subscriber
///
/// Honors `RUST_LOG` when set. Returns the appender guard when file
/// logging is enabled; hold it for as long as logs should keep flushing.
/// Calling this twice is a no-op (the second install fails quietly).
pub fn init(options: LoggingOptions) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(options.default_filter.as_deref().unwrap_or("info"))
    });

    let (writer, guard) = match &options.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "agent-session-sdk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match (options.json, writer) {
        (true, Some(writer)) => builder.json().with_writer(writer).try_init(),
        (true, None) => builder.json().try_init(),
        (false, Some(writer)) => builder.with_writer(writer).try_init(),
        (false, None) => builder.try_init(),
    };

    if result.is_err() {
        tracing::debug!("global subscriber already installed; keeping existing one");
    }
    guard
}

/// Install a plain subscriber with an "info" fallback filter
pub fn init_default() -> Option<WorkerGuard> {
    init(LoggingOptions::new())
}
