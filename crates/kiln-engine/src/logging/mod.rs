//! Logging utilities.
//!
//! Centralizes logger initialization. Everything else logs through the
//! standard `log` facade; `env_logger` is the backend, optionally mirrored
//! into a plain-text log file.

mod init;

pub use init::{init_logging, LoggingConfig};
