//! Process-level helpers for running a node.
//!
//! | Module | Description | Feature |
//! |--------|-------------|---------|
//! | [`sig_down`] | Graceful shutdown on SIGTERM/SIGINT | - |
//! | [`telemetry`] | Log subscriber and HTTP request tracing | `telemetry` |

pub mod sig_down;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use sig_down::*;
#[cfg(feature = "telemetry")]
pub use telemetry::*;
