//! Web error types and implementations

use crate::templates::TemplateError;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;

/// Where visitors without a session are sent
pub const LOGIN_PATH: &str = "/login";
/// Portal landing page
pub const DASHBOARD_PATH: &str = "/portal-clientes";

/// Errors that end a request early
#[derive(Error, Debug)]
pub enum WebError {
    /// No portal token in the session
    #[error("Authentication required")]
    Unauthenticated,

    /// The upstream rejected the portal token
    #[error("Session expired")]
    SessionExpired,

    /// Signed in, but the page is reserved for administrators
    #[error("Administrator role required")]
    AdminRequired,

    /// Template lookup or rendering failed
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::Unauthenticated | WebError::SessionExpired => {
                Redirect::to(LOGIN_PATH).into_response()
            }
            WebError::AdminRequired => Redirect::to(DASHBOARD_PATH).into_response(),
            WebError::Template(_) | WebError::Internal(_) => {
                tracing::error!("Request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html("<h1>500</h1><p>Error interno del servidor.</p>"),
                )
                    .into_response()
            }
        }
    }
}

/// Result type alias using WebError
pub type Result<T> = std::result::Result<T, WebError>;
