//! Blog API methods

use super::{ApiClient, ApiResponse, ClientError};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, instrument};

/// Default base URL of the blog API
pub const DEFAULT_BLOG_API_URL: &str = "https://blog.arsystech.net/api";

/// Listing pages scanned when resolving a post by id
const SCAN_MAX_PAGES: u32 = 10;
/// Page size used while scanning
const SCAN_PAGE_SIZE: u32 = 100;

/// Pagination and tag filter forwarded to `GET /posts`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostListQuery {
    pub page: u32,
    pub limit: u32,
    pub tag: Option<String>,
}

impl Default for PostListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            tag: None,
        }
    }
}

impl PostListQuery {
    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.to_string()), ("limit", self.limit.to_string())];
        if let Some(tag) = self.tag.as_deref().filter(|t| !t.is_empty()) {
            pairs.push(("tag", tag.to_string()));
        }
        pairs
    }
}

/// Client for the blog API
///
/// The portal token is forwarded when the visitor is signed in; public reads
/// work without it.
#[derive(Clone, Debug)]
pub struct BlogClient {
    api: ApiClient,
}

impl BlogClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Paginated post listing
    #[instrument(name = "blog.get_posts", skip(self, token))]
    pub async fn get_posts(
        &self,
        token: Option<&str>,
        query: &PostListQuery,
    ) -> Result<ApiResponse, ClientError> {
        self.api.get("/posts", token, &query.to_pairs()).await
    }

    /// Full post by slug
    #[instrument(name = "blog.get_post_by_slug", skip(self, token))]
    pub async fn get_post_by_slug(
        &self,
        token: Option<&str>,
        slug: &str,
    ) -> Result<ApiResponse, ClientError> {
        let path = format!("/posts/{}", urlencoding::encode(slug));
        self.api.get(&path, token, &[]).await
    }

    /// Full post by numeric id
    ///
    /// The API only serves posts by slug, so the listing is scanned page by
    /// page for the id and the post is then fetched by its slug.
    #[instrument(name = "blog.get_post_by_id", skip(self, token))]
    pub async fn get_post_by_id(
        &self,
        token: Option<&str>,
        id: i64,
    ) -> Result<ApiResponse, ClientError> {
        for page in 1..=SCAN_MAX_PAGES {
            let query = PostListQuery {
                page,
                limit: SCAN_PAGE_SIZE,
                tag: None,
            };
            let listing = self.get_posts(token, &query).await?;
            if listing.status != StatusCode::OK {
                break;
            }

            let posts = listing
                .body
                .get("data")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let slug = posts
                .iter()
                .filter(|post| post.get("id").and_then(Value::as_i64) == Some(id))
                .find_map(|post| post.get("slug").and_then(Value::as_str))
                .filter(|slug| !slug.is_empty())
                .map(str::to_owned);

            if let Some(slug) = slug {
                debug!(id, %slug, page, "Resolved post id to slug");
                return self.get_post_by_slug(token, &slug).await;
            }

            if posts.len() < SCAN_PAGE_SIZE as usize {
                break;
            }
        }

        Ok(ApiResponse::new(
            StatusCode::NOT_FOUND,
            json!({ "message": "Post no encontrado" }),
        ))
    }

    /// Create a post
    #[instrument(name = "blog.create_post", skip_all)]
    pub async fn create_post(
        &self,
        token: Option<&str>,
        post: &Value,
    ) -> Result<ApiResponse, ClientError> {
        self.api.post("/posts", token, post).await
    }

    /// Update a post
    #[instrument(name = "blog.update_post", skip(self, token, post))]
    pub async fn update_post(
        &self,
        token: Option<&str>,
        id: i64,
        post: &Value,
    ) -> Result<ApiResponse, ClientError> {
        self.api.put(&format!("/posts/{id}"), token, post).await
    }

    /// Delete a post
    #[instrument(name = "blog.delete_post", skip(self, token))]
    pub async fn delete_post(&self, token: Option<&str>, id: i64) -> Result<ApiResponse, ClientError> {
        self.api.delete(&format!("/posts/{id}"), token).await
    }
}
