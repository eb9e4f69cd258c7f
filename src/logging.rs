use crate::error::EchonetError;
use log::{info, log_enabled, Level};
use std::fs::OpenOptions;
use std::path::Path;

fn builder() -> env_logger::Builder {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
}

/// Initializes the logger with the `env_logger` crate.
///
/// `RUST_LOG` overrides the default `info` filter. Calling it again is a
/// no-op.
pub fn init_logger() {
    let _ = builder().try_init();
}

/// Initializes the logger and appends all output to `path`.
///
/// # Examples
/// ```rust,no_run
/// use echonet_audit::logging::init_logger_with_file;
///
/// init_logger_with_file("results/session.log").expect("open log file");
/// log::info!("session started");
/// ```
pub fn init_logger_with_file(path: impl AsRef<Path>) -> Result<(), EchonetError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| EchonetError::Output(format!("create {}: {e}", parent.display())))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| EchonetError::Output(format!("open {}: {e}", path.display())))?;

    builder()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .map_err(|e| EchonetError::Output(format!("logger already initialized: {e}")))
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}
