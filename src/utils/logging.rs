//! Diagnostic logging setup.
//!
//! Events go to a log file by default. The full-screen UI owns the terminal,
//! so stderr output is only enabled for one-shot subcommands.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::{Config, LoggingConfig};
use crate::core::constants::DEFAULT_LOG_FILE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSurface {
    /// The terminal is in raw mode; never write to stderr.
    Interactive,
    /// A plain subcommand; stderr logging is allowed.
    Plain,
}

/// Build the filter directive from the configured levels.
///
/// `RUST_LOG`, when set, takes precedence.
pub fn filter_directive(logging: &LoggingConfig) -> String {
    let app = logging.level_app.as_deref().unwrap_or("debug");
    let deps = logging.level_deps.as_deref().unwrap_or("info");
    format!("{deps},{}={app}", env!("CARGO_CRATE_NAME"))
}

pub fn log_file_path(logging: &LoggingConfig) -> Option<PathBuf> {
    if !logging.to_file.unwrap_or(true) {
        return None;
    }
    match &logging.file_path {
        Some(path) => Some(path.clone()),
        None => Config::data_dir()
            .ok()
            .map(|dir| dir.join(DEFAULT_LOG_FILE)),
    }
}

pub fn init_logging(
    logging: &LoggingConfig,
    surface: LogSurface,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directive(logging))?,
    };

    let file_layer = match log_file_path(logging) {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let stderr_layer = (surface == LogSurface::Plain && logging.to_stderr.unwrap_or(false))
        .then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;
    Ok(())
}

/// Short random id used to correlate the log lines of one chat turn.
pub fn new_request_id() -> String {
    let mut bytes = [0_u8; 4];
    if getrandom::fill(&mut bytes).is_err() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or_default();
        bytes = nanos.to_le_bytes();
    }
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
