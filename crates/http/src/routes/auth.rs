//! Portal sign-in and sign-out

use super::{UpstreamFailure, render_page, upstream_payload};
use crate::error::{DASHBOARD_PATH, LOGIN_PATH, Result};
use crate::middleware::ClientIp;
use crate::session::Session;
use crate::state::AppState;
use crate::types::{FlashLevel, LoginResponse};
use axum::{
    Form, Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use minijinja::context;
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

pub const LOGIN_TEMPLATE: &str = "accounts/login.html";

pub const MISSING_FIELDS_MESSAGE: &str = "Correo y contraseña son obligatorios.";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Credenciales inválidas";
pub const BAD_LOGIN_PAYLOAD_MESSAGE: &str = "Respuesta inesperada del servidor de autenticación.";
pub const LOGGED_OUT_MESSAGE: &str = "Has cerrado sesión.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(LOGIN_PATH, get(login_page).post(login))
        .route("/logout", get(logout))
}

/// Login form fields
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "g-recaptcha-response")]
    pub recaptcha_token: String,
}

async fn render_login(
    state: &AppState,
    session: &Session,
    email: &str,
    error: Option<&str>,
) -> Result<Response> {
    let html = render_page(
        state,
        session,
        LOGIN_TEMPLATE,
        "login",
        context! { email => email, error => error },
    )
    .await?;
    Ok(html.into_response())
}

#[instrument(skip_all)]
pub async fn login_page(State(state): State<AppState>, session: Session) -> Result<Response> {
    if session.is_authenticated().await {
        return Ok(Redirect::to(DASHBOARD_PATH).into_response());
    }
    render_login(&state, &session, "", None).await
}

#[instrument(skip_all, fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    client_ip: ClientIp,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let email = form.email.trim();
    if email.is_empty() || form.password.is_empty() {
        return render_login(&state, &session, email, Some(MISSING_FIELDS_MESSAGE)).await;
    }

    if state.recaptcha.is_configured() {
        let outcome = state
            .recaptcha
            .verify(&form.recaptcha_token, client_ip.ip)
            .await;
        if !outcome.valid {
            warn!(score = outcome.score, "Login blocked by reCAPTCHA");
            let message = outcome
                .error
                .unwrap_or_else(|| "Verificación reCAPTCHA fallida".to_string());
            return render_login(&state, &session, email, Some(&message)).await;
        }
    }

    let message = match upstream_payload(state.portal.login(email, &form.password).await) {
        Ok(body) => match serde_json::from_value::<LoginResponse>(body) {
            Ok(login) => {
                info!(user_id = login.user.id, role = %login.user.role, "Portal login");
                session.sign_in(login.token, login.user).await;
                return Ok(Redirect::to(DASHBOARD_PATH).into_response());
            }
            Err(err) => {
                error!(error = %err, "Login payload without token or user");
                BAD_LOGIN_PAYLOAD_MESSAGE.to_string()
            }
        },
        Err(UpstreamFailure::SessionExpired) => INVALID_CREDENTIALS_MESSAGE.to_string(),
        Err(failure) => failure.message(),
    };

    render_login(&state, &session, email, Some(&message)).await
}

#[instrument(skip_all)]
pub async fn logout(session: Session) -> Redirect {
    session.clear().await;
    session.flash(FlashLevel::Info, LOGGED_OUT_MESSAGE).await;
    Redirect::to(LOGIN_PATH)
}
