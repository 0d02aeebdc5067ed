use env_logger::Env;
use log::{error, info, log_enabled, warn, Level};

/// Initializes the logger with the `env_logger` crate.
///
/// Defaults to `info`; `RUST_LOG` overrides, e.g. `RUST_LOG=infinity_bus=debug`
/// to see snooped reports and dropped frames.
pub fn init_logger() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// Logs an error message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}
