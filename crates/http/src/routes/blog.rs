//! Public blog pages

use super::{
    UpstreamFailure, collection, entity, error_page, non_blank, number_or, pagination,
    render_page, upstream_payload,
};
use crate::client::PostListQuery;
use crate::error::Result;
use crate::session::Session;
use crate::state::AppState;
use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use minijinja::context;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

pub const BLOG_INDEX_TEMPLATE: &str = "blog/index.html";
pub const BLOG_POST_TEMPLATE: &str = "blog/post.html";

/// Posts per public listing page
pub const PUBLIC_PAGE_SIZE: u32 = 9;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blog", get(index))
        .route("/blog/{slug}", get(post))
}

#[derive(Debug, Default, Deserialize)]
pub struct BlogParams {
    pub page: Option<String>,
    pub tag: Option<String>,
}

// Public pages show upstream failures in place, even a rejected token.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<BlogParams>,
) -> Result<Response> {
    let query = PostListQuery {
        page: number_or(params.page.as_deref(), 1),
        limit: PUBLIC_PAGE_SIZE,
        tag: non_blank(params.tag),
    };
    let token = session.token().await;

    let (posts, pages, error) =
        match upstream_payload(state.blog.get_posts(token.as_deref(), &query).await) {
            Ok(body) => (collection(&body, "posts"), pagination(&body), None),
            Err(failure) => (Value::Array(Vec::new()), Value::Null, Some(failure.message())),
        };

    let html = render_page(
        &state,
        &session,
        BLOG_INDEX_TEMPLATE,
        "blog",
        context! {
            posts => posts,
            pagination => pages,
            page => query.page,
            tag => query.tag,
            error => error,
        },
    )
    .await?;
    Ok(html.into_response())
}

#[instrument(skip(state, session))]
pub async fn post(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
) -> Result<Response> {
    let token = session.token().await;

    let (post, error) =
        match upstream_payload(state.blog.get_post_by_slug(token.as_deref(), &slug).await) {
            Ok(body) => (entity(body, "post"), None),
            Err(UpstreamFailure::NotFound(_)) => {
                return Ok(error_page(&state, &session, &slug, StatusCode::NOT_FOUND).await);
            }
            Err(failure) => (Value::Null, Some(failure.message())),
        };

    let html = render_page(
        &state,
        &session,
        BLOG_POST_TEMPLATE,
        &slug,
        context! { post => post, error => error },
    )
    .await?;
    Ok(html.into_response())
}
