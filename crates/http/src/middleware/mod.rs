//! Middleware components for HTTP request processing

pub mod client_ip;
pub mod rbac;
pub mod trace;

pub use client_ip::{ClientIp, resolve_client_ip};
pub use rbac::{require_admin, require_user};
pub use trace::trace_middleware;
