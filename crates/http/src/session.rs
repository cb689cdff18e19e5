//! Server-side cookie sessions
//!
//! The browser only holds an opaque session id; the portal token, the user
//! record and pending flash messages stay in the [`SessionStore`]. Handlers
//! see the session through the request-scoped [`Session`] handle inserted by
//! [`session_middleware`], which writes changes back once the handler returns.
//! Signing in or clearing a session moves it to a new id.

use crate::error::WebError;
use crate::state::AppState;
use crate::types::{Flash, FlashLevel, PortalUser};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Values held for one browser session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub portal_token: Option<String>,
    pub portal_user: Option<PortalUser>,
    pub flashes: Vec<Flash>,
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        self.portal_token.is_none() && self.portal_user.is_none() && self.flashes.is_empty()
    }
}

/// Session cookie and expiry settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session id
    pub cookie_name: String,
    /// Sessions idle for longer than this are dropped
    pub idle_timeout: Duration,
    /// Mark the cookie `Secure`
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "intela_session".to_string(),
            idle_timeout: Duration::from_secs(24 * 60 * 60),
            secure: false,
        }
    }
}

#[derive(Debug, Clone)]
struct SessionRecord {
    data: SessionData,
    last_seen: DateTime<Utc>,
}

/// In-memory session store
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Generate a new session ID
    pub fn generate_session_id() -> String {
        let random_bytes: [u8; 32] = rand::random();
        URL_SAFE_NO_PAD.encode(random_bytes)
    }

    fn is_expired(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        let timeout = chrono::Duration::from_std(self.config.idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        now - record.last_seen >= timeout
    }

    /// Load a session, refreshing its idle timer
    pub async fn load(&self, session_id: &str) -> Option<SessionData> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();

        let expired = self.is_expired(sessions.get(session_id)?, now);
        if expired {
            sessions.remove(session_id);
            return None;
        }

        let record = sessions.get_mut(session_id)?;
        record.last_seen = now;
        Some(record.data.clone())
    }

    /// Store a session
    pub async fn save(&self, session_id: String, data: SessionData) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            session_id,
            SessionRecord {
                data,
                last_seen: Utc::now(),
            },
        );
    }

    /// Update a session that is still live; returns false if it is gone
    pub async fn save_existing(&self, session_id: &str, data: SessionData) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(record) => {
                record.data = data;
                record.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Remove a session
    pub async fn remove(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
    }

    /// Clean up expired sessions, returning how many were dropped
    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        let before = sessions.len();

        sessions.retain(|_, record| !self.is_expired(record, now));

        before - sessions.len()
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Portal token together with the user it was issued for
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub token: String,
    pub user: PortalUser,
}

#[derive(Debug, Default)]
struct SessionState {
    data: SessionData,
    modified: bool,
    /// Issue a new id when the response is written
    regenerate: bool,
}

/// Request-scoped handle on the visitor's session
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new(data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                data,
                modified: false,
                regenerate: false,
            })),
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.inner.lock().await.data.portal_token.clone()
    }

    pub async fn user(&self) -> Option<PortalUser> {
        self.inner.lock().await.data.portal_user.clone()
    }

    /// A token in the session means the visitor is signed in
    pub async fn is_authenticated(&self) -> bool {
        self.inner.lock().await.data.portal_token.is_some()
    }

    /// Token and user, when both are present
    pub async fn credentials(&self) -> Option<Credentials> {
        let state = self.inner.lock().await;
        let token = state.data.portal_token.clone()?;
        let user = state.data.portal_user.clone()?;
        Some(Credentials { token, user })
    }

    pub async fn sign_in(&self, token: String, user: PortalUser) {
        let mut state = self.inner.lock().await;
        state.data.portal_token = Some(token);
        state.data.portal_user = Some(user);
        state.modified = true;
        state.regenerate = true;
    }

    /// Drop everything held for this visitor
    pub async fn clear(&self) {
        let mut state = self.inner.lock().await;
        state.data = SessionData::default();
        state.modified = true;
        state.regenerate = true;
    }

    /// Queue a message for the next rendered page
    pub async fn flash(&self, level: FlashLevel, message: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.data.flashes.push(Flash {
            level,
            message: message.into(),
        });
        state.modified = true;
    }

    /// Pending messages; they are shown once
    pub async fn take_flashes(&self) -> Vec<Flash> {
        let mut state = self.inner.lock().await;
        if state.data.flashes.is_empty() {
            return Vec::new();
        }
        state.modified = true;
        std::mem::take(&mut state.data.flashes)
    }

    async fn snapshot(&self) -> (SessionData, bool, bool) {
        let state = self.inner.lock().await;
        (state.data.clone(), state.modified, state.regenerate)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| WebError::Internal("session middleware is not installed".to_string()))
    }
}

/// Load the session before the handler and persist it afterwards
///
/// An emptied session is dropped and its cookie expired. A new session, or
/// one that was signed in or cleared, is stored under a fresh id and cookie;
/// the old id is removed. Changes to a session another request already
/// removed are discarded.
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let store = state.sessions.clone();
    let cookie_name = store.config().cookie_name.clone();

    let known_id = match jar.get(&cookie_name).map(|c| c.value().to_string()) {
        Some(id) => store.load(&id).await.map(|data| (id, data)),
        None => None,
    };
    let had_cookie = jar.get(&cookie_name).is_some();

    let (session_id, data) = match known_id {
        Some((id, data)) => (Some(id), data),
        None => (None, SessionData::default()),
    };

    let session = Session::new(data);
    request.extensions_mut().insert(session.clone());

    let response = next.run(request).await;

    let (data, modified, regenerate) = session.snapshot().await;
    if !modified && (session_id.is_some() || !had_cookie) {
        return response;
    }

    let session_id = match session_id {
        Some(id) if regenerate => {
            store.remove(&id).await;
            debug!("Rotating session id");
            None
        }
        other => other,
    };

    let jar = if data.is_empty() {
        if let Some(id) = &session_id {
            store.remove(id).await;
        }
        if had_cookie {
            jar.remove(Cookie::build((cookie_name, "")).path("/"))
        } else {
            jar
        }
    } else {
        match session_id {
            Some(id) => {
                if !store.save_existing(&id, data).await {
                    debug!("Session ended by another request, dropping changes");
                }
                jar
            }
            None => {
                let id = SessionStore::generate_session_id();
                debug!("Starting new session");
                store.save(id.clone(), data).await;
                jar.add(
                    Cookie::build((cookie_name, id))
                        .path("/")
                        .http_only(true)
                        .same_site(SameSite::Lax)
                        .secure(store.config().secure),
                )
            }
        }
    };

    (jar, response).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn user() -> PortalUser {
        PortalUser {
            id: 1,
            role: Role::Admin,
            name: Some("Admin".into()),
            email: None,
            client_id: None,
        }
    }

    #[tokio::test]
    async fn store_expires_idle_sessions() {
        let store = SessionStore::new(SessionConfig {
            idle_timeout: Duration::ZERO,
            ..SessionConfig::default()
        });

        store.save("a".into(), SessionData::default()).await;
        store.save("b".into(), SessionData::default()).await;

        assert_eq!(store.cleanup_expired().await, 2);
        assert!(store.is_empty().await);
        assert!(store.load("a").await.is_none());
    }

    #[tokio::test]
    async fn store_round_trips_live_sessions() {
        let store = SessionStore::new(SessionConfig::default());
        let data = SessionData {
            portal_token: Some("tok".into()),
            portal_user: Some(user()),
            flashes: vec![],
        };

        store.save("id".into(), data.clone()).await;
        assert_eq!(store.load("id").await, Some(data));
        assert_eq!(store.cleanup_expired().await, 0);

        store.remove("id").await;
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn save_existing_does_not_resurrect_removed_sessions() {
        let store = SessionStore::new(SessionConfig::default());
        let data = SessionData {
            portal_token: Some("tok".into()),
            ..SessionData::default()
        };

        assert!(!store.save_existing("gone", data.clone()).await);
        assert!(store.is_empty().await);

        store.save("live".into(), SessionData::default()).await;
        assert!(store.save_existing("live", data.clone()).await);
        assert_eq!(store.load("live").await, Some(data));
    }

    #[tokio::test]
    async fn sign_in_requests_a_new_id() {
        let session = Session::default();
        session.flash(FlashLevel::Info, "hola").await;
        assert!(!session.snapshot().await.2);

        session.sign_in("tok".into(), user()).await;
        assert!(session.snapshot().await.2);
    }

    #[test]
    fn session_ids_are_unique() {
        let a = SessionStore::generate_session_id();
        let b = SessionStore::generate_session_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
    }

    #[tokio::test]
    async fn clear_drops_token_user_and_flashes() {
        let session = Session::default();
        session.sign_in("tok".into(), user()).await;
        session.flash(FlashLevel::Info, "hola").await;
        assert!(session.is_authenticated().await);

        session.clear().await;

        assert!(!session.is_authenticated().await);
        assert!(session.credentials().await.is_none());
        assert!(session.take_flashes().await.is_empty());
        let (data, modified, regenerate) = session.snapshot().await;
        assert!(data.is_empty());
        assert!(modified);
        assert!(regenerate);
    }

    #[tokio::test]
    async fn flashes_are_shown_once() {
        let session = Session::default();
        session.flash(FlashLevel::Success, "ok").await;

        let flashes = session.take_flashes().await;
        assert_eq!(flashes.len(), 1);
        assert_eq!(flashes[0].message, "ok");
        assert!(session.take_flashes().await.is_empty());
    }
}
