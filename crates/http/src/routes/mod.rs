//! Route definitions
//!
//! Every handler follows the same shape: read the request, call one upstream
//! endpoint, branch on the outcome and render a template or redirect.

use crate::client::{ApiResponse, ClientError};
use crate::error::WebError;
use crate::middleware::trace_middleware;
use crate::session::{Session, session_middleware};
use crate::state::AppState;
use crate::types::FlashLevel;
use axum::{
    Router,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{Html, IntoResponse, Response},
};
use minijinja::{Value as TemplateValue, context};
use serde_json::Value;
use tower_http::services::ServeDir;
use tracing::{error, warn};

pub mod auth;
pub mod blog;
pub mod blog_admin;
pub mod debug;
pub mod health;
pub mod pages;
pub mod portal;

pub const SESSION_EXPIRED_MESSAGE: &str = "Tu sesión ha expirado. Inicia sesión de nuevo.";
pub const FORBIDDEN_MESSAGE: &str = "No tienes permisos para realizar esta acción.";
pub const NOT_FOUND_MESSAGE: &str = "El recurso solicitado no existe.";
pub const UNAVAILABLE_MESSAGE: &str = "No se pudo conectar con el servidor. Inténtalo más tarde.";

pub const PAGE_404: &str = "pages/page-404.html";
pub const PAGE_500: &str = "pages/page-500.html";

/// Build the site router with its session and tracing layers
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(health::router())
        .merge(debug::router())
        .merge(auth::router())
        .merge(portal::router())
        .merge(blog_admin::router())
        .merge(blog::router())
        .merge(pages::router());

    let assets_root = state.site.assets_root.trim_end_matches('/');
    if assets_root.starts_with('/') && assets_root.len() > 1 {
        router = router.nest_service(assets_root, ServeDir::new(&state.site.static_dir));
    }

    router
        .fallback(pages::not_found)
        .layer(from_fn_with_state(state.clone(), session_middleware))
        .layer(from_fn(trace_middleware))
        .with_state(state)
}

/// Last path component of a request path, `index` for the root
pub fn segment(path: &str) -> String {
    match path.rsplit('/').next() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ => "index".to_string(),
    }
}

/// Render a template with the values every page expects
///
/// Pending flash messages are consumed here.
pub(crate) async fn render_page(
    state: &AppState,
    session: &Session,
    name: &str,
    segment: &str,
    ctx: TemplateValue,
) -> Result<Html<String>, WebError> {
    let user = session.user().await;
    let flashes = session.take_flashes().await;

    let html = state.templates.render(
        name,
        context! {
            segment => segment,
            user => user,
            flashes => flashes,
            ..ctx
        },
    )?;
    Ok(Html(html))
}

/// Render the 404 or 500 page with the given status
pub(crate) async fn error_page(
    state: &AppState,
    session: &Session,
    segment: &str,
    status: StatusCode,
) -> Response {
    let name = if status == StatusCode::NOT_FOUND {
        PAGE_404
    } else {
        PAGE_500
    };

    match render_page(state, session, name, segment, context! {}).await {
        Ok(html) => (status, html).into_response(),
        Err(err) => {
            error!(error = %err, template = name, "Error page failed to render");
            status.into_response()
        }
    }
}

/// Why an upstream call did not produce a payload
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamFailure {
    /// 401: the portal token is no longer accepted
    SessionExpired,
    /// 403
    Forbidden,
    /// 404, with the upstream message
    NotFound(String),
    /// Any other non-2xx status
    Rejected { status: u16, message: String },
    /// The upstream could not be reached
    Unavailable,
}

impl From<ClientError> for UpstreamFailure {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::AuthenticationFailed(_) => Self::SessionExpired,
            ClientError::Forbidden(_) => Self::Forbidden,
            ClientError::NotFound(message) => Self::NotFound(message),
            ClientError::ServerError { status, message } => Self::Rejected { status, message },
            ClientError::Request(err) => {
                error!(error = %err, "Upstream API unreachable");
                Self::Unavailable
            }
            ClientError::Configuration(message) => {
                error!(%message, "Upstream API misconfigured");
                Self::Unavailable
            }
        }
    }
}

impl UpstreamFailure {
    /// Message shown to the visitor
    pub fn message(&self) -> String {
        match self {
            Self::SessionExpired => SESSION_EXPIRED_MESSAGE.to_string(),
            Self::Forbidden => FORBIDDEN_MESSAGE.to_string(),
            Self::NotFound(_) => NOT_FOUND_MESSAGE.to_string(),
            Self::Rejected { status, message } => {
                format!("Error del servidor ({status}): {message}")
            }
            Self::Unavailable => UNAVAILABLE_MESSAGE.to_string(),
        }
    }

    /// Message for an authenticated page
    ///
    /// An expired token ends the session and sends the visitor to the login
    /// page instead.
    pub async fn into_message(self, session: &Session) -> Result<String, WebError> {
        if self == Self::SessionExpired {
            expire_session(session).await;
            return Err(WebError::SessionExpired);
        }
        Ok(self.message())
    }
}

/// Drop the session after the upstream rejected its token
pub(crate) async fn expire_session(session: &Session) {
    warn!("Upstream rejected the portal token, ending session");
    session.clear().await;
    session
        .flash(FlashLevel::Warning, SESSION_EXPIRED_MESSAGE)
        .await;
}

/// Payload of a successful upstream call
pub fn upstream_payload(
    result: Result<ApiResponse, ClientError>,
) -> Result<Value, UpstreamFailure> {
    Ok(result?.into_result()?)
}

/// Listing inside an upstream payload
///
/// Accepts a bare array or an object holding the array under `key`, `data`
/// or `items`.
pub(crate) fn collection(body: &Value, key: &str) -> Value {
    if body.is_array() {
        return body.clone();
    }

    [key, "data", "items"]
        .iter()
        .find_map(|k| body.get(*k).filter(|v| v.is_array()))
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()))
}

/// Single record inside an upstream payload, unwrapping `{ key: {...} }`
pub(crate) fn entity(body: Value, key: &str) -> Value {
    match body.get(key) {
        Some(inner) if inner.is_object() => inner.clone(),
        _ => body,
    }
}

pub(crate) fn pagination(body: &Value) -> Value {
    body.get("pagination").cloned().unwrap_or(Value::Null)
}

/// Numeric query parameter, falling back to the default when absent or invalid
pub(crate) fn number_or(value: Option<&str>, default: u32) -> u32 {
    value
        .and_then(|v| v.trim().parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

/// Query text with surrounding whitespace removed, `None` when blank
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode as UpstreamStatus;
    use serde_json::json;

    #[test]
    fn segment_is_last_component() {
        assert_eq!(segment("/"), "index");
        assert_eq!(segment(""), "index");
        assert_eq!(segment("/about-us"), "about-us");
        assert_eq!(segment("/blog/mi-entrada"), "mi-entrada");
        assert_eq!(segment("/blog/"), "index");
    }

    #[test]
    fn failures_map_by_status() {
        let failure = |status: u16, body: Value| {
            let status = UpstreamStatus::from_u16(status).unwrap();
            upstream_payload(Ok(ApiResponse::new(status, body))).unwrap_err()
        };

        assert_eq!(failure(401, json!({})), UpstreamFailure::SessionExpired);
        assert_eq!(failure(403, json!({})), UpstreamFailure::Forbidden);
        assert_eq!(failure(403, json!({})).message(), FORBIDDEN_MESSAGE);
        assert_eq!(failure(404, json!({})).message(), NOT_FOUND_MESSAGE);
        assert_eq!(
            failure(422, json!({ "message": "Email duplicado" })).message(),
            "Error del servidor (422): Email duplicado"
        );
        assert_eq!(
            failure(500, json!(null)).message(),
            "Error del servidor (500): Internal Server Error"
        );
    }

    #[test]
    fn success_yields_payload() {
        let body = json!({ "ok": true });
        let payload =
            upstream_payload(Ok(ApiResponse::new(UpstreamStatus::OK, body.clone()))).unwrap();
        assert_eq!(payload, body);
    }

    #[tokio::test]
    async fn expired_token_clears_session() {
        let session = Session::default();
        session
            .sign_in(
                "tok".into(),
                crate::types::PortalUser {
                    id: 1,
                    role: crate::types::Role::User,
                    name: None,
                    email: None,
                    client_id: None,
                },
            )
            .await;

        let result = UpstreamFailure::SessionExpired.into_message(&session).await;

        assert!(matches!(result, Err(WebError::SessionExpired)));
        assert!(!session.is_authenticated().await);
        let flashes = session.take_flashes().await;
        assert_eq!(flashes[0].message, SESSION_EXPIRED_MESSAGE);
        assert_eq!(flashes[0].level, FlashLevel::Warning);
    }

    #[test]
    fn payload_helpers() {
        assert_eq!(collection(&json!([1, 2]), "posts"), json!([1, 2]));
        assert_eq!(collection(&json!({ "posts": [1] }), "posts"), json!([1]));
        assert_eq!(collection(&json!({ "data": [2] }), "posts"), json!([2]));
        assert_eq!(collection(&json!({ "total": 0 }), "posts"), json!([]));

        assert_eq!(entity(json!({ "post": { "id": 1 } }), "post"), json!({ "id": 1 }));
        assert_eq!(entity(json!({ "id": 1 }), "post"), json!({ "id": 1 }));

        assert_eq!(number_or(Some("3"), 1), 3);
        assert_eq!(number_or(Some("abc"), 1), 1);
        assert_eq!(number_or(Some("0"), 10), 10);
        assert_eq!(number_or(None, 10), 10);

        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" rust ".into())), Some("rust".into()));
    }
}
