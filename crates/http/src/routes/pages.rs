//! Marketing pages served straight from `templates/pages`

use super::{error_page, render_page, segment};
use crate::error::{Result, WebError};
use crate::session::Session;
use crate::state::AppState;
use crate::templates::TemplateError;
use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use minijinja::context;
use tracing::{debug, error, instrument};

pub const INDEX_TEMPLATE: &str = "pages/index6.html";

/// Browser-requested icons that never map to a page
const ICON_PREFIXES: &[&str] = &["favicon", "apple-touch-icon"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/{template}", get(route_template))
}

/// Whether a path component may name a page template
///
/// Anything with an extension other than `.html`, browser icon requests and
/// names trying to leave the pages directory are rejected.
pub fn is_page_name(name: &str) -> bool {
    if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
        return false;
    }

    let lower = name.to_ascii_lowercase();
    if ICON_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
        return false;
    }

    match lower.rsplit_once('.') {
        Some((_, extension)) => extension == "html",
        None => true,
    }
}

#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>, session: Session) -> Result<Response> {
    let html = render_page(&state, &session, INDEX_TEMPLATE, "index", context! {}).await?;
    Ok(html.into_response())
}

#[instrument(skip(state, session, uri))]
pub async fn route_template(
    State(state): State<AppState>,
    session: Session,
    uri: Uri,
    Path(template): Path<String>,
) -> Result<Response> {
    if !is_page_name(&template) {
        debug!("Not a page, answering 404");
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let name = if template.ends_with(".html") {
        format!("pages/{template}")
    } else {
        format!("pages/{template}.html")
    };
    let segment = segment(uri.path());

    match render_page(&state, &session, &name, &segment, context! {}).await {
        Ok(html) => Ok(html.into_response()),
        Err(WebError::Template(TemplateError::NotFound(_))) => {
            Ok(error_page(&state, &session, &segment, StatusCode::NOT_FOUND).await)
        }
        Err(WebError::Template(err)) => {
            error!(error = %err, template = %name, "Page failed to render");
            Ok(error_page(&state, &session, &segment, StatusCode::INTERNAL_SERVER_ERROR).await)
        }
        Err(err) => Err(err),
    }
}

/// Fallback for paths no route matches
pub async fn not_found(State(state): State<AppState>, session: Session, uri: Uri) -> Response {
    error_page(&state, &session, &segment(uri.path()), StatusCode::NOT_FOUND).await
}
