//! Clients for the upstream REST APIs
//!
//! Both the client-portal API and the blog API speak bearer-authenticated
//! JSON. Every call resolves to an [`ApiResponse`], the `(payload, status)`
//! pair handlers branch on; only transport failures surface as errors.

pub mod blog;
pub mod error;
pub mod portal;
pub mod recaptcha;

pub use blog::{BlogClient, PostListQuery};
pub use error::ClientError;
pub use portal::{ClientListQuery, PortalClient};
pub use recaptcha::{RecaptchaOutcome, RecaptchaVerifier};

use reqwest::{Client, ClientBuilder, Method, RequestBuilder, StatusCode, header};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error};

/// Timeout applied to portal and blog API calls
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(10);

/// Payload and status returned by an upstream call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// Whether the upstream answered with a 2xx status
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The upstream's human-readable message, if the payload carries one
    pub fn message(&self) -> Option<&str> {
        self.body
            .get("message")
            .or_else(|| self.body.get("error"))
            .and_then(Value::as_str)
    }

    /// Convert into the payload on success or a status-specific error
    pub fn into_result(self) -> Result<Value, ClientError> {
        if self.status.is_success() {
            return Ok(self.body);
        }

        let message = self
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| {
                self.status
                    .canonical_reason()
                    .unwrap_or("Unknown status")
                    .to_string()
            });
        Err(ClientError::from_status(self.status, message))
    }
}

/// Bearer-authenticated JSON client bound to one API base URL
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a request builder, attaching the bearer token when present
    pub fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let mut request = self.client.request(method, self.url(path));

        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        request
    }

    /// `GET` with query string parameters
    pub async fn get(
        &self,
        path: &str,
        token: Option<&str>,
        query: &[(&str, String)],
    ) -> Result<ApiResponse, ClientError> {
        let request = self.request(Method::GET, path, token).query(query);
        self.execute(Method::GET, path, request).await
    }

    /// `POST` with a JSON body
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<ApiResponse, ClientError> {
        let request = self.request(Method::POST, path, token).json(body);
        self.execute(Method::POST, path, request).await
    }

    /// `PUT` with a JSON body
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<ApiResponse, ClientError> {
        let request = self.request(Method::PUT, path, token).json(body);
        self.execute(Method::PUT, path, request).await
    }

    /// `DELETE` without a body
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<ApiResponse, ClientError> {
        let request = self.request(Method::DELETE, path, token);
        self.execute(Method::DELETE, path, request).await
    }

    /// Send a request and decode the payload
    ///
    /// Bodies that are not JSON are wrapped as `{"message": <text>}`.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        request: RequestBuilder,
    ) -> Result<ApiResponse, ClientError> {
        let result = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        }
        .await;

        match result {
            Ok((status, text)) => {
                debug!(%method, url = %self.url(path), status = status.as_u16(), "Upstream responded");
                let body = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "message": text }));
                Ok(ApiResponse { status, body })
            }
            Err(e) => {
                error!(%method, url = %self.url(path), "Upstream request failed: {}", e);
                Err(ClientError::Request(e))
            }
        }
    }
}

/// Builder for ApiClient
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ApiClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Paths always start with a slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let client = ClientBuilder::new()
            .timeout(self.timeout.unwrap_or(DEFAULT_API_TIMEOUT))
            .user_agent(
                self.user_agent
                    .unwrap_or_else(|| concat!("intela-web/", env!("CARGO_PKG_VERSION")).to_string()),
            )
            .build()?;

        Ok(ApiClient { client, base_url })
    }
}
