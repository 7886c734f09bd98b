//! Handsoff Telemetry - `tracing` subscriber setup.
//!
//! Both binaries entry points (the permission hook and the poll server) call
//! [`setup_logging`] exactly once. The hook must keep stdout free for its
//! decision JSON, so [`LogConfig::for_hook`] writes to stderr.
//!
//! # Example
//!
//! ```rust,no_run
//! use handsoff_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), handsoff_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("handsoff_server=trace");
//! setup_logging(&config)?;
//! tracing::info!("ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_logging};
