//! Role-based access control for portal pages

use crate::error::WebError;
use crate::session::{Credentials, Session};
use crate::types::FlashLevel;
use tracing::warn;

/// Message shown to non-admin users sent away from admin pages
pub const ADMIN_ONLY_MESSAGE: &str = "Acceso restringido a administradores.";

/// Credentials of the signed-in visitor
///
/// A token without a user record is treated as a broken session and cleared.
pub async fn require_user(session: &Session) -> Result<Credentials, WebError> {
    if let Some(credentials) = session.credentials().await {
        return Ok(credentials);
    }

    if session.is_authenticated().await {
        warn!("Session holds a token without a user record, clearing it");
        session.clear().await;
    }

    Err(WebError::Unauthenticated)
}

/// Credentials of a signed-in administrator
pub async fn require_admin(session: &Session) -> Result<Credentials, WebError> {
    let credentials = require_user(session).await?;

    if !credentials.user.is_admin() {
        warn!(user_id = credentials.user.id, "Non-admin user denied admin page");
        session.flash(FlashLevel::Error, ADMIN_ONLY_MESSAGE).await;
        return Err(WebError::AdminRequired);
    }

    Ok(credentials)
}
