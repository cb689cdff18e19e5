//! Server setup and configuration module

use crate::Result;
use crate::config::Settings;
use intela_http::client::{ApiClient, BlogClient, PortalClient, RecaptchaVerifier};
use intela_http::{AppState, SessionConfig, SessionStore, SiteConfig, Templates};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Build the shared application state from settings
///
/// # Errors
///
/// Returns an error if an upstream client cannot be constructed
pub fn build_app_state(settings: &Settings) -> Result<AppState> {
    let portal = PortalClient::new(
        ApiClient::builder()
            .base_url(&settings.portal.base_url)
            .timeout(settings.portal.timeout())
            .build()?,
    );
    let blog = BlogClient::new(
        ApiClient::builder()
            .base_url(&settings.blog.base_url)
            .timeout(settings.blog.timeout())
            .build()?,
    );
    let recaptcha = RecaptchaVerifier::with_endpoint(
        &settings.recaptcha.verify_url,
        settings.recaptcha.secret_key.clone(),
        settings.recaptcha.min_score,
        Duration::from_secs(settings.recaptcha.timeout_secs),
    )?;

    let mut templates = Templates::from_dir(&settings.site.templates_dir);
    templates.add_global("assets_root", settings.site.assets_root.trim_end_matches('/'));
    templates.add_global("recaptcha_site_key", settings.recaptcha.site_key.clone());
    templates.add_global("debug", settings.debug);

    let sessions = SessionStore::new(SessionConfig {
        cookie_name: settings.session.cookie_name.clone(),
        idle_timeout: settings.session_idle_timeout(),
        secure: settings.session.secure,
    });

    let site = SiteConfig {
        assets_root: settings.site.assets_root.clone(),
        static_dir: settings.site.static_dir.clone(),
        trusted_proxies: settings.site.trusted_proxies.clone(),
    };

    Ok(AppState::new(portal, blog, recaptcha, templates, sessions).with_site_config(site))
}

/// Periodically drop idle sessions
pub fn spawn_session_cleanup(sessions: Arc<SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let removed = sessions.cleanup_expired().await;
            if removed > 0 {
                debug!(removed, "Dropped expired sessions");
            }
        }
    })
}

/// Server configuration builder
#[derive(Default)]
pub struct ServerBuilder {
    settings: Option<Settings>,
    bind: Option<SocketAddr>,
}

impl ServerBuilder {
    /// Use custom settings
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Override the configured bind address
    pub fn with_bind(mut self, bind: Option<SocketAddr>) -> Self {
        self.bind = bind;
        self
    }

    /// Build the state and bind the listener
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be built or the address is taken
    pub async fn build(self) -> Result<Server> {
        let mut settings = self.settings.unwrap_or_default();
        if let Some(bind) = self.bind {
            settings.server.bind = bind;
        }

        let state = build_app_state(&settings)?;
        let listener = TcpListener::bind(settings.server.bind).await?;
        info!("Listening on {}", listener.local_addr()?);

        Ok(Server {
            state,
            listener,
            cleanup_interval: settings.session_cleanup_interval(),
        })
    }
}

/// Bound server, ready to serve
pub struct Server {
    state: AppState,
    listener: TcpListener,
    cleanup_interval: Duration,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Address the listener is bound to
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `shutdown` resolves
    ///
    /// # Errors
    ///
    /// Returns an error if the accept loop fails
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cleanup = spawn_session_cleanup(self.state.sessions.clone(), self.cleanup_interval);
        let app = intela_http::router(self.state);

        let result = axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        cleanup.abort();
        info!("Server stopped");
        Ok(result?)
    }
}
