//! Client portal: role-branched dashboard and client/user management

use super::{collection, entity, non_blank, number_or, pagination, render_page, upstream_payload};
use crate::client::ClientListQuery;
use crate::error::{DASHBOARD_PATH, Result};
use crate::middleware::{require_admin, require_user};
use crate::session::Session;
use crate::state::AppState;
use crate::types::{FlashLevel, NewUser, Role};
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use minijinja::context;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{info, instrument};

pub const ADMIN_DASHBOARD_TEMPLATE: &str = "portal/admin-dashboard.html";
pub const USER_DASHBOARD_TEMPLATE: &str = "portal/user-dashboard.html";

pub const USER_CREATED_MESSAGE: &str = "Usuario creado correctamente.";
pub const USER_FIELDS_MESSAGE: &str = "Nombre, correo y contraseña son obligatorios.";
pub const CLIENT_UPDATED_MESSAGE: &str = "Cliente actualizado correctamente.";
pub const NO_CHANGES_MESSAGE: &str = "No hay cambios que guardar.";

const SEGMENT: &str = "portal-clientes";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(DASHBOARD_PATH, get(dashboard))
        .route("/portal-clientes/create-user", post(create_user))
        .route("/portal-clientes/update-client/{id}", post(update_client))
}

/// Listing parameters forwarded to `GET /clients`
///
/// Kept as text so malformed numbers fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

impl DashboardParams {
    pub fn to_query(&self) -> ClientListQuery {
        let defaults = ClientListQuery::default();
        ClientListQuery {
            page: number_or(self.page.as_deref(), defaults.page),
            limit: number_or(self.limit.as_deref(), defaults.limit),
            search: non_blank(self.search.clone()),
        }
    }
}

#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<DashboardParams>,
) -> Result<Response> {
    let credentials = require_user(&session).await?;

    if credentials.user.is_admin() {
        let query = params.to_query();
        let result = state.portal.list_clients(&credentials.token, &query).await;

        let (clients, pages, error) = match upstream_payload(result) {
            Ok(body) => (collection(&body, "clients"), pagination(&body), None),
            Err(failure) => (
                Value::Array(Vec::new()),
                Value::Null,
                Some(failure.into_message(&session).await?),
            ),
        };

        let html = render_page(
            &state,
            &session,
            ADMIN_DASHBOARD_TEMPLATE,
            SEGMENT,
            context! {
                clients => clients,
                pagination => pages,
                page => query.page,
                limit => query.limit,
                search => query.search,
                error => error,
            },
        )
        .await?;
        return Ok(html.into_response());
    }

    let (client, error) = match upstream_payload(state.portal.my_client(&credentials.token).await) {
        Ok(body) => (entity(body, "client"), None),
        Err(failure) => (Value::Null, Some(failure.into_message(&session).await?)),
    };

    let html = render_page(
        &state,
        &session,
        USER_DASHBOARD_TEMPLATE,
        SEGMENT,
        context! { client => client, error => error },
    )
    .await?;
    Ok(html.into_response())
}

/// Fields of the admin "new user" form
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

impl CreateUserForm {
    /// Validated request body, `None` when a required field is blank
    pub fn to_new_user(&self) -> Option<NewUser> {
        let name = self.name.trim();
        let email = self.email.trim();
        if name.is_empty() || email.is_empty() || self.password.is_empty() {
            return None;
        }

        let role = match self.role.as_deref().map(str::trim) {
            Some("admin") => Role::Admin,
            _ => Role::User,
        };

        Some(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: self.password.clone(),
            role,
            client_id: self
                .client_id
                .as_deref()
                .and_then(|id| id.trim().parse().ok()),
        })
    }
}

#[instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CreateUserForm>,
) -> Result<Redirect> {
    let credentials = require_admin(&session).await?;

    let Some(user) = form.to_new_user() else {
        session.flash(FlashLevel::Error, USER_FIELDS_MESSAGE).await;
        return Ok(Redirect::to(DASHBOARD_PATH));
    };

    match upstream_payload(state.portal.create_user(&credentials.token, &user).await) {
        Ok(_) => {
            info!(email = %user.email, role = %user.role, "Portal user created");
            session.flash(FlashLevel::Success, USER_CREATED_MESSAGE).await;
        }
        Err(failure) => {
            let message = failure.into_message(&session).await?;
            session.flash(FlashLevel::Error, message).await;
        }
    }

    Ok(Redirect::to(DASHBOARD_PATH))
}

/// Non-blank form fields as the JSON object sent upstream
pub fn changed_fields(form: BTreeMap<String, String>) -> Map<String, Value> {
    form.into_iter()
        .filter_map(|(key, value)| {
            let value = value.trim();
            (!value.is_empty()).then(|| (key, Value::String(value.to_string())))
        })
        .collect()
}

#[instrument(skip(state, session, form))]
pub async fn update_client(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Form(form): Form<BTreeMap<String, String>>,
) -> Result<Redirect> {
    let credentials = require_user(&session).await?;

    let fields = changed_fields(form);
    if fields.is_empty() {
        session.flash(FlashLevel::Warning, NO_CHANGES_MESSAGE).await;
        return Ok(Redirect::to(DASHBOARD_PATH));
    }

    match upstream_payload(
        state
            .portal
            .update_client(&credentials.token, id, &fields)
            .await,
    ) {
        Ok(_) => {
            info!(client_id = id, "Client updated");
            session.flash(FlashLevel::Success, CLIENT_UPDATED_MESSAGE).await;
        }
        Err(failure) => {
            let message = failure.into_message(&session).await?;
            session.flash(FlashLevel::Error, message).await;
        }
    }

    Ok(Redirect::to(DASHBOARD_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_params_fall_back_to_defaults() {
        let params = DashboardParams {
            page: Some("x".into()),
            limit: Some("25".into()),
            search: Some("  ".into()),
        };
        assert_eq!(
            params.to_query(),
            ClientListQuery {
                page: 1,
                limit: 25,
                search: None,
            }
        );
    }

    #[test]
    fn new_user_requires_fields_and_defaults_role() {
        assert!(CreateUserForm::default().to_new_user().is_none());

        let form = CreateUserForm {
            name: " Ana ".into(),
            email: "ana@example.com".into(),
            password: "secreto".into(),
            role: Some("superuser".into()),
            client_id: Some("12".into()),
        };
        let user = form.to_new_user().unwrap();
        assert_eq!(user.name, "Ana");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.client_id, Some(12));

        let admin = CreateUserForm {
            role: Some("admin".into()),
            client_id: Some(String::new()),
            ..form
        };
        let user = admin.to_new_user().unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.client_id, None);
    }

    #[test]
    fn only_filled_fields_are_sent() {
        let form = BTreeMap::from([
            ("name".to_string(), " Acme ".to_string()),
            ("phone".to_string(), "   ".to_string()),
        ]);
        let fields = changed_fields(form);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["name"], "Acme");
    }
}
