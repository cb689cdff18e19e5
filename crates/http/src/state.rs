//! Application state management

use crate::client::{BlogClient, PortalClient, RecaptchaVerifier};
use crate::session::SessionStore;
use crate::templates::Templates;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Site-level settings the routes need at request time
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// URL prefix static assets are served under
    pub assets_root: String,
    /// Directory holding the static assets
    pub static_dir: PathBuf,
    /// Proxies whose `X-Forwarded-For` is trusted
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            assets_root: "/static".to_string(),
            static_dir: PathBuf::from("static"),
            trusted_proxies: Vec::new(),
        }
    }
}

/// Shared application state
///
/// Cloned into every handler; all members are reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Client-management API
    pub portal: Arc<PortalClient>,
    /// Blog API
    pub blog: Arc<BlogClient>,
    /// reCAPTCHA verification
    pub recaptcha: Arc<RecaptchaVerifier>,
    /// Page templates
    pub templates: Arc<Templates>,
    /// Server-side sessions
    pub sessions: Arc<SessionStore>,
    /// Site settings
    pub site: Arc<SiteConfig>,
}

impl AppState {
    /// Create a new AppState with the given components
    pub fn new(
        portal: PortalClient,
        blog: BlogClient,
        recaptcha: RecaptchaVerifier,
        templates: Templates,
        sessions: SessionStore,
    ) -> Self {
        Self {
            portal: Arc::new(portal),
            blog: Arc::new(blog),
            recaptcha: Arc::new(recaptcha),
            templates: Arc::new(templates),
            sessions: Arc::new(sessions),
            site: Arc::new(SiteConfig::default()),
        }
    }

    /// Set the site settings
    pub fn with_site_config(mut self, site: SiteConfig) -> Self {
        self.site = Arc::new(site);
        self
    }
}
