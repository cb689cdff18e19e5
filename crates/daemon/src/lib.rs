//! Intela web daemon: settings, tracing and server assembly

pub mod config;
pub mod error;
pub mod server;
pub mod telemetry;

pub use config::Settings;
pub use error::{DaemonError, Result};
pub use server::{Server, ServerBuilder};
