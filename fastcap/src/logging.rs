//! Logging initialization.
//!
//! The `--log-level` flag seeds an `EnvFilter`; the `RUST_LOG` environment
//! variable takes precedence when set. With `--log-file` the subscriber
//! writes through a non-blocking appender so the capture path never stalls
//! on log I/O.

use clap::ValueEnum;
use std::ffi::OsStr;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Logging verbosity selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Off,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

/// Initialize the logging subsystem.
///
/// Returns the appender guard when logging to a file; it must stay alive
/// for the lifetime of the process or buffered log lines are lost.
pub fn init(level: LogLevel, file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level.directive())
    };

    match file {
        Some(path) => {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let name = path.file_name().unwrap_or_else(|| OsStr::new("fastcap.log"));
            let (writer, guard) = tracing_appender::non_blocking(
                tracing_appender::rolling::never(dir, name),
            );
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
            None
        }
    }
}
