//! Configuration management for the Intela web daemon
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML or
//! YAML file, `INTELA__SECTION__KEY` environment variables, and the flat
//! variable names the site has always been deployed with (`DEBUG`,
//! `ASSETS_ROOT`, `BLOG_API_BASE_URL`, `RECAPTCHA_*`).

use crate::Result;
use config::{Config, Environment, File};
use intela_http::client::{blog::DEFAULT_BLOG_API_URL, portal::DEFAULT_PORTAL_API_URL, recaptcha};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Prefix of the structured environment variables
pub const ENV_PREFIX: &str = "INTELA";

/// Main daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Verbose logging and configuration dump at startup
    pub debug: bool,
    pub server: ServerConfig,
    pub site: SiteSettings,
    /// Client-management API
    pub portal: UpstreamConfig,
    /// Blog API
    pub blog: UpstreamConfig,
    pub recaptcha: RecaptchaConfig,
    pub session: SessionSettings,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP server
    pub bind: SocketAddr,
}

/// Templates, static assets and proxy trust
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    /// URL prefix templates use for static assets
    pub assets_root: String,
    pub static_dir: PathBuf,
    pub templates_dir: PathBuf,
    /// Proxies allowed to set `X-Forwarded-For`
    pub trusted_proxies: Vec<IpAddr>,
}

/// Upstream REST API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// reCAPTCHA v3 keys and threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecaptchaConfig {
    /// Public key rendered into the login page
    pub site_key: Option<String>,
    /// Server-side key; verification is skipped at login when unset
    pub secret_key: Option<String>,
    pub min_score: f64,
    pub verify_url: String,
    pub timeout_secs: u64,
}

/// Session cookie and store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub cookie_name: String,
    /// Idle sessions older than this are dropped
    pub idle_timeout_secs: u64,
    /// Mark the cookie `Secure`
    pub secure: bool,
    /// How often expired sessions are swept
    pub cleanup_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            server: ServerConfig::default(),
            site: SiteSettings::default(),
            portal: UpstreamConfig {
                base_url: DEFAULT_PORTAL_API_URL.to_string(),
                timeout_secs: 10,
            },
            blog: UpstreamConfig {
                base_url: DEFAULT_BLOG_API_URL.to_string(),
                timeout_secs: 10,
            },
            recaptcha: RecaptchaConfig::default(),
            session: SessionSettings::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5005),
        }
    }
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            assets_root: "/static".to_string(),
            static_dir: PathBuf::from("static"),
            templates_dir: PathBuf::from("templates"),
            trusted_proxies: vec![IpAddr::V4(Ipv4Addr::new(10, 200, 1, 250))],
        }
    }
}

impl Default for RecaptchaConfig {
    fn default() -> Self {
        Self {
            site_key: None,
            secret_key: None,
            min_score: recaptcha::DEFAULT_MIN_SCORE,
            verify_url: recaptcha::DEFAULT_VERIFY_URL.to_string(),
            timeout_secs: recaptcha::DEFAULT_VERIFY_TIMEOUT.as_secs(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "intela_session".to_string(),
            idle_timeout_secs: 24 * 60 * 60,
            secure: false,
            cleanup_interval_secs: 5 * 60,
        }
    }
}

/// Legacy flat variable names and the keys they set
const LEGACY_ENV: &[(&str, &str)] = &[
    ("ASSETS_ROOT", "site.assets_root"),
    ("BLOG_API_BASE_URL", "blog.base_url"),
    ("RECAPTCHA_SITE_KEY", "recaptcha.site_key"),
    ("RECAPTCHA_SECRET_KEY", "recaptcha.secret_key"),
    ("RECAPTCHA_MIN_SCORE", "recaptcha.min_score"),
];

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Settings {
    /// Load configuration from the process environment and an optional file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value does not parse
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    /// Load configuration, resolving the legacy variables through `lookup`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value does not parse
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        // Start with defaults
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("site.trusted_proxies")
                .try_parsing(true),
        );

        builder = builder.set_override_option("debug", lookup("DEBUG").map(|v| is_truthy(&v)))?;
        for (name, key) in LEGACY_ENV {
            builder = builder.set_override_option(*key, lookup(*name))?;
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session.idle_timeout_secs)
    }

    pub fn session_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.session.cleanup_interval_secs.max(1))
    }

    /// Log the effective configuration without leaking secrets
    pub fn log_summary(&self) {
        let site_key = self.recaptcha.site_key.as_deref().map_or_else(
            || "not configured".to_string(),
            |key| format!("{}...", key.chars().take(10).collect::<String>()),
        );
        let secret = if self.recaptcha.secret_key.is_some() {
            "configured"
        } else {
            "not configured"
        };

        info!("Bind address: {}", self.server.bind);
        info!("Assets root: {}", self.site.assets_root);
        info!("Templates: {}", self.site.templates_dir.display());
        info!("Portal API: {}", self.portal.base_url);
        info!("Blog API: {}", self.blog.base_url);
        info!("reCAPTCHA site key: {}", site_key);
        info!("reCAPTCHA secret key: {}", secret);
        info!("reCAPTCHA minimum score: {}", self.recaptcha.min_score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults() {
        let settings = Settings::load_with_env(None, no_env).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.server.bind.port(), 5005);
        assert_eq!(
            settings.site.trusted_proxies,
            vec!["10.200.1.250".parse::<IpAddr>().unwrap()]
        );
        assert_eq!(settings.portal.timeout(), Duration::from_secs(10));
        assert_eq!(settings.recaptcha.timeout_secs, 5);
        assert!((settings.recaptcha.min_score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
debug = true

[server]
bind = "127.0.0.1:8000"

[blog]
base_url = "http://blog.local/api"
timeout_secs = 3
"#
        )
        .unwrap();

        let settings = Settings::load_with_env(Some(file.path()), no_env).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.server.bind, "127.0.0.1:8000".parse().unwrap());
        assert_eq!(settings.blog.base_url, "http://blog.local/api");
        assert_eq!(settings.blog.timeout_secs, 3);
        assert_eq!(settings.portal.base_url, DEFAULT_PORTAL_API_URL);
    }

    #[test]
    fn legacy_variables_win() {
        let env = HashMap::from([
            ("DEBUG", "True"),
            ("ASSETS_ROOT", "https://cdn.example.com/static"),
            ("BLOG_API_BASE_URL", "http://blog.internal/api"),
            ("RECAPTCHA_SITE_KEY", "site-key"),
            ("RECAPTCHA_SECRET_KEY", ""),
            ("RECAPTCHA_MIN_SCORE", "0.7"),
        ]);

        let settings =
            Settings::load_with_env(None, |name| env.get(name).map(|v| (*v).to_string())).unwrap();

        assert!(settings.debug);
        assert_eq!(settings.site.assets_root, "https://cdn.example.com/static");
        assert_eq!(settings.blog.base_url, "http://blog.internal/api");
        assert_eq!(settings.recaptcha.site_key.as_deref(), Some("site-key"));
        assert_eq!(settings.recaptcha.secret_key, None);
        assert!((settings.recaptcha.min_score - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn debug_flag_parsing() {
        assert!(is_truthy("1"));
        assert!(is_truthy(" yes "));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(""));
    }
}
