//! Client-portal API methods

use super::{ApiClient, ApiResponse, ClientError};
use crate::types::{LoginRequest, NewUser};
use serde_json::{Map, Value};
use tracing::instrument;

/// Default base URL of the client-management API
pub const DEFAULT_PORTAL_API_URL: &str = "https://clientes.arsystech.net/api";

/// Pagination and search forwarded to `GET /clients`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientListQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
}

impl Default for ClientListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            search: None,
        }
    }
}

impl ClientListQuery {
    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.to_string()), ("limit", self.limit.to_string())];
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        pairs
    }
}

/// Client for the client-management API
#[derive(Clone, Debug)]
pub struct PortalClient {
    api: ApiClient,
}

impl PortalClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Exchange credentials for a portal token
    #[instrument(name = "portal.login", skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<ApiResponse, ClientError> {
        self.api
            .post("/auth/login", None, &LoginRequest { email, password })
            .await
    }

    /// List clients (admin)
    #[instrument(name = "portal.list_clients", skip(self, token))]
    pub async fn list_clients(
        &self,
        token: &str,
        query: &ClientListQuery,
    ) -> Result<ApiResponse, ClientError> {
        self.api.get("/clients", Some(token), &query.to_pairs()).await
    }

    /// Client record of the signed-in user
    #[instrument(name = "portal.my_client", skip_all)]
    pub async fn my_client(&self, token: &str) -> Result<ApiResponse, ClientError> {
        self.api.get("/clients/me", Some(token), &[]).await
    }

    /// Update a client with the given fields
    #[instrument(name = "portal.update_client", skip(self, token, fields))]
    pub async fn update_client(
        &self,
        token: &str,
        id: i64,
        fields: &Map<String, Value>,
    ) -> Result<ApiResponse, ClientError> {
        self.api
            .put(&format!("/clients/{id}"), Some(token), fields)
            .await
    }

    /// Create a portal user (admin)
    #[instrument(name = "portal.create_user", skip(self, token, user), fields(email = %user.email, role = %user.role))]
    pub async fn create_user(&self, token: &str, user: &NewUser) -> Result<ApiResponse, ClientError> {
        self.api.post("/users", Some(token), user).await
    }
}
