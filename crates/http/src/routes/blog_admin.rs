//! Blog administration inside the portal (admins only)

use super::{
    UpstreamFailure, collection, entity, non_blank, number_or, pagination, render_page,
    upstream_payload,
};
use crate::client::PostListQuery;
use crate::error::Result;
use crate::middleware::require_admin;
use crate::session::Session;
use crate::state::AppState;
use crate::types::FlashLevel;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use minijinja::context;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, instrument};

pub const BLOG_LIST_PATH: &str = "/portal-clientes/blog";
pub const NEW_POST_PATH: &str = "/portal-clientes/blog/new";

pub const BLOG_LIST_TEMPLATE: &str = "portal/blog-list.html";
pub const BLOG_FORM_TEMPLATE: &str = "portal/blog-form.html";

pub const REQUIRED_FIELDS_MESSAGE: &str = "El título y el contenido son obligatorios.";
pub const POST_CREATED_MESSAGE: &str = "Entrada creada correctamente.";
pub const POST_UPDATED_MESSAGE: &str = "Entrada actualizada correctamente.";
pub const POST_DELETED_MESSAGE: &str = "Entrada eliminada correctamente.";

const SEGMENT: &str = "blog";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(BLOG_LIST_PATH, get(list))
        .route(NEW_POST_PATH, get(new_form).post(create))
        .route("/portal-clientes/blog/edit/{id}", get(edit_form).post(update))
        .route("/portal-clientes/blog/delete/{id}", post(delete))
}

fn edit_path(id: i64) -> String {
    format!("/portal-clientes/blog/edit/{id}")
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub tag: Option<String>,
}

/// Post editor fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub cover_image: String,
    /// Comma separated
    #[serde(default)]
    pub tags: String,
    /// Checkbox; absent when unticked
    #[serde(default)]
    pub published: Option<String>,
}

impl PostForm {
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn is_published(&self) -> bool {
        self.published
            .as_deref()
            .is_some_and(|v| !matches!(v.trim(), "" | "0" | "false" | "off"))
    }

    /// The entered values, shaped like a post from the API
    pub fn fields(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("title".into(), json!(self.title.trim()));
        fields.insert("content".into(), json!(self.content.trim()));
        for (key, value) in [
            ("slug", &self.slug),
            ("excerpt", &self.excerpt),
            ("cover_image", &self.cover_image),
        ] {
            let value = value.trim();
            if !value.is_empty() {
                fields.insert(key.into(), json!(value));
            }
        }
        fields.insert("tags".into(), json!(self.tag_list()));
        fields.insert("published".into(), json!(self.is_published()));
        Value::Object(fields)
    }

    /// Request body for create/update; fails when title or content is blank
    pub fn to_payload(&self) -> std::result::Result<Value, &'static str> {
        if self.title.trim().is_empty() || self.content.trim().is_empty() {
            return Err(REQUIRED_FIELDS_MESSAGE);
        }
        Ok(self.fields())
    }
}

async fn render_form(
    state: &AppState,
    session: &Session,
    post: Value,
    action: &str,
    error: Option<String>,
) -> Result<Response> {
    let html = render_page(
        state,
        session,
        BLOG_FORM_TEMPLATE,
        SEGMENT,
        context! {
            post => post,
            action => action,
            is_edit => action != NEW_POST_PATH,
            error => error,
        },
    )
    .await?;
    Ok(html.into_response())
}

#[instrument(skip_all)]
pub async fn list(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<AdminListParams>,
) -> Result<Response> {
    let credentials = require_admin(&session).await?;

    let defaults = PostListQuery::default();
    let query = PostListQuery {
        page: number_or(params.page.as_deref(), defaults.page),
        limit: number_or(params.limit.as_deref(), defaults.limit),
        tag: non_blank(params.tag),
    };

    let result = state
        .blog
        .get_posts(Some(&credentials.token), &query)
        .await;
    let (posts, pages, error) = match upstream_payload(result) {
        Ok(body) => (collection(&body, "posts"), pagination(&body), None),
        Err(failure) => (
            Value::Array(Vec::new()),
            Value::Null,
            Some(failure.into_message(&session).await?),
        ),
    };

    let html = render_page(
        &state,
        &session,
        BLOG_LIST_TEMPLATE,
        SEGMENT,
        context! {
            posts => posts,
            pagination => pages,
            page => query.page,
            limit => query.limit,
            tag => query.tag,
            error => error,
        },
    )
    .await?;
    Ok(html.into_response())
}

#[instrument(skip_all)]
pub async fn new_form(State(state): State<AppState>, session: Session) -> Result<Response> {
    require_admin(&session).await?;
    render_form(&state, &session, Value::Null, NEW_POST_PATH, None).await
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<PostForm>,
) -> Result<Response> {
    let credentials = require_admin(&session).await?;

    let payload = match form.to_payload() {
        Ok(payload) => payload,
        Err(message) => {
            return render_form(&state, &session, form.fields(), NEW_POST_PATH, Some(message.into()))
                .await;
        }
    };

    match upstream_payload(
        state
            .blog
            .create_post(Some(&credentials.token), &payload)
            .await,
    ) {
        Ok(_) => {
            info!(title = %form.title.trim(), "Blog post created");
            session.flash(FlashLevel::Success, POST_CREATED_MESSAGE).await;
            Ok(Redirect::to(BLOG_LIST_PATH).into_response())
        }
        Err(failure) => {
            let message = failure.into_message(&session).await?;
            render_form(&state, &session, payload, NEW_POST_PATH, Some(message)).await
        }
    }
}

#[instrument(skip(state, session))]
pub async fn edit_form(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Response> {
    let credentials = require_admin(&session).await?;

    match upstream_payload(
        state
            .blog
            .get_post_by_id(Some(&credentials.token), id)
            .await,
    ) {
        Ok(body) => render_form(&state, &session, entity(body, "post"), &edit_path(id), None).await,
        Err(failure) => {
            let message = failure.into_message(&session).await?;
            session.flash(FlashLevel::Error, message).await;
            Ok(Redirect::to(BLOG_LIST_PATH).into_response())
        }
    }
}

#[instrument(skip(state, session, form))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Form(form): Form<PostForm>,
) -> Result<Response> {
    let credentials = require_admin(&session).await?;
    let action = edit_path(id);

    let payload = match form.to_payload() {
        Ok(payload) => payload,
        Err(message) => {
            return render_form(&state, &session, form.fields(), &action, Some(message.into()))
                .await;
        }
    };

    match upstream_payload(
        state
            .blog
            .update_post(Some(&credentials.token), id, &payload)
            .await,
    ) {
        Ok(_) => {
            info!(post_id = id, "Blog post updated");
            session.flash(FlashLevel::Success, POST_UPDATED_MESSAGE).await;
            Ok(Redirect::to(BLOG_LIST_PATH).into_response())
        }
        Err(failure) => {
            let message = failure.into_message(&session).await?;
            render_form(&state, &session, payload, &action, Some(message)).await
        }
    }
}

#[instrument(skip(state, session))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Redirect> {
    let credentials = require_admin(&session).await?;

    match upstream_payload(
        state
            .blog
            .delete_post(Some(&credentials.token), id)
            .await,
    ) {
        Ok(_) => {
            info!(post_id = id, "Blog post deleted");
            session.flash(FlashLevel::Success, POST_DELETED_MESSAGE).await;
        }
        // Already gone
        Err(UpstreamFailure::NotFound(_)) => {
            session.flash(FlashLevel::Warning, super::NOT_FOUND_MESSAGE).await;
        }
        Err(failure) => {
            let message = failure.into_message(&session).await?;
            session.flash(FlashLevel::Error, message).await;
        }
    }

    Ok(Redirect::to(BLOG_LIST_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_requires_title_and_content() {
        let form = PostForm {
            title: "  ".into(),
            content: "body".into(),
            ..PostForm::default()
        };
        assert_eq!(form.to_payload(), Err(REQUIRED_FIELDS_MESSAGE));
    }

    #[test]
    fn payload_shape() {
        let form = PostForm {
            title: " Hola ".into(),
            content: "Texto".into(),
            slug: "hola".into(),
            tags: "rust, web,, ".into(),
            published: Some("on".into()),
            ..PostForm::default()
        };

        let payload = form.to_payload().unwrap();
        assert_eq!(
            payload,
            json!({
                "title": "Hola",
                "content": "Texto",
                "slug": "hola",
                "tags": ["rust", "web"],
                "published": true,
            })
        );
    }

    #[test]
    fn unticked_checkbox_is_unpublished() {
        assert!(!PostForm::default().is_published());
        assert!(
            !PostForm {
                published: Some("false".into()),
                ..PostForm::default()
            }
            .is_published()
        );
    }
}
