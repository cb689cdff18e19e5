//! Intela web HTTP module
//!
//! Route handlers for the marketing site, the client portal and the blog,
//! the clients for the two upstream REST APIs they proxy to, and the
//! server-side session those handlers share.

pub mod client;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod state;
pub mod templates;
pub mod types;

pub use error::{Result, WebError};
pub use routes::router;
pub use session::{Session, SessionConfig, SessionStore};
pub use state::{AppState, SiteConfig};
pub use templates::{TemplateError, Templates};

// Re-export commonly used types
pub use axum::{Router, extract, response};
