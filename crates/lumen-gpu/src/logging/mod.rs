//! Logging utilities.
//!
//! Everything in this crate logs through the `log` facade. A binary either calls
//! [`init_logging`] (env_logger) or hands its own sink to
//! [`install_platform_logger`].

mod host;
mod init;

pub use host::{install_platform_logger, LogLevel, Logger};
pub use init::{init_logging, LoggingConfig};
