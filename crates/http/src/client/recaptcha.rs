//! Google reCAPTCHA v3 verification

use super::ClientError;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{error, warn};

/// Google's verification endpoint
pub const DEFAULT_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
/// Minimum accepted score unless configured otherwise
pub const DEFAULT_MIN_SCORE: f64 = 0.5;
/// Timeout applied to verification calls
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a verification
#[derive(Debug, Clone, PartialEq)]
pub struct RecaptchaOutcome {
    /// Token accepted and score at or above the threshold
    pub valid: bool,
    /// Score between 0.0 and 1.0
    pub score: f64,
    /// Reason the token was rejected, if the check itself failed
    pub error: Option<String>,
}

impl RecaptchaOutcome {
    fn rejected(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            score: 0.0,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    score: f64,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Verifies reCAPTCHA tokens against the siteverify endpoint
#[derive(Clone, Debug)]
pub struct RecaptchaVerifier {
    client: Client,
    verify_url: String,
    secret_key: Option<String>,
    min_score: f64,
}

impl RecaptchaVerifier {
    /// Verifier against Google's endpoint
    pub fn new(secret_key: Option<String>, min_score: f64) -> Result<Self, ClientError> {
        Self::with_endpoint(DEFAULT_VERIFY_URL, secret_key, min_score, DEFAULT_VERIFY_TIMEOUT)
    }

    /// Verifier against a custom endpoint
    pub fn with_endpoint(
        verify_url: impl Into<String>,
        secret_key: Option<String>,
        min_score: f64,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = ClientBuilder::new().timeout(timeout).build()?;

        Ok(Self {
            client,
            verify_url: verify_url.into(),
            secret_key: secret_key.filter(|key| !key.is_empty()),
            min_score,
        })
    }

    /// Whether a secret key is available
    pub fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    /// Verify a token obtained by the frontend
    pub async fn verify(&self, token: &str, remote_ip: Option<IpAddr>) -> RecaptchaOutcome {
        let Some(secret) = self.secret_key.as_deref() else {
            warn!("reCAPTCHA secret key is not configured");
            return RecaptchaOutcome::rejected("Configuración de reCAPTCHA incompleta");
        };

        if token.is_empty() {
            return RecaptchaOutcome::rejected("Token de reCAPTCHA no proporcionado");
        }

        let remote_ip = remote_ip.map(|ip| ip.to_string());
        let mut form = vec![("secret", secret), ("response", token)];
        if let Some(ip) = remote_ip.as_deref() {
            form.push(("remoteip", ip));
        }

        let text = match self.send(&form).await {
            Ok(text) => text,
            Err(e) => {
                error!("reCAPTCHA verification request failed: {}", e);
                return RecaptchaOutcome::rejected("Error al conectar con el servicio de reCAPTCHA");
            }
        };

        let result: SiteVerifyResponse = match serde_json::from_str(&text) {
            Ok(result) => result,
            Err(e) => {
                error!("Unexpected reCAPTCHA verification payload: {}", e);
                return RecaptchaOutcome::rejected(
                    "Error al procesar la verificación de reCAPTCHA",
                );
            }
        };

        if !result.success {
            let message = if result.error_codes.is_empty() {
                "Token inválido".to_string()
            } else {
                result.error_codes.join(", ")
            };
            warn!("reCAPTCHA rejected token: {}", message);
            return RecaptchaOutcome::rejected(message);
        }

        let valid = result.score >= self.min_score;
        if !valid {
            warn!(
                "reCAPTCHA score too low: {} (minimum: {})",
                result.score, self.min_score
            );
        }

        RecaptchaOutcome {
            valid,
            score: result.score,
            error: None,
        }
    }

    async fn send(&self, form: &[(&str, &str)]) -> Result<String, reqwest::Error> {
        self.client
            .post(&self.verify_url)
            .form(form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}
