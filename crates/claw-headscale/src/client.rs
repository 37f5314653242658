//! REST client for the Headscale control plane.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::error::{HeadscaleError, Result};
use crate::types::{
    ApiNode, ApiUser, CreateUserRequest, CreateUserResponse, GetNodeResponse, HealthResponse,
    ListNodesResponse,
};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const API_PREFIX: [&str; 2] = ["api", "v1"];

/// Client for the Headscale REST API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HeadscaleClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: HttpClient,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for HeadscaleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadscaleClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HeadscaleClient {
    /// Creates a builder for a server at `base_url`.
    #[must_use]
    pub fn builder(base_url: impl Into<String>, api_key: impl Into<String>) -> HeadscaleClientBuilder {
        HeadscaleClientBuilder::new(base_url, api_key)
    }

    /// The server base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Lists nodes, optionally restricted to one user.
    pub async fn list_nodes(&self, user: Option<&str>) -> Result<Vec<ApiNode>> {
        let mut url = self.endpoint(&["node"])?;
        if let Some(user) = user {
            url.query_pairs_mut().append_pair("user", user);
        }

        let body: ListNodesResponse = self.get(url).await?;
        debug!(nodes = body.nodes.len(), user = ?user, "Listed Headscale nodes");
        Ok(body.nodes)
    }

    /// Fetches a single node by id.
    pub async fn get_node(&self, id: &str) -> Result<ApiNode> {
        let url = self.endpoint(&["node", id])?;
        let body: GetNodeResponse = self.get(url).await?;
        Ok(body.node)
    }

    /// Queries server health.
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.endpoint(&["health"])?;
        self.get(url).await
    }

    /// Creates a user.
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<ApiUser> {
        let url = self.endpoint(&["user"])?;
        debug!(url = %url, "POST request");

        let response = self
            .inner
            .http
            .post(url)
            .bearer_auth(&self.inner.api_key)
            .json(request)
            .send()
            .await?;

        let body: CreateUserResponse = handle_response(response).await?;
        Ok(body.user)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(url = %url, "GET request");

        let response = self
            .inner
            .http
            .get(url)
            .bearer_auth(&self.inner.api_key)
            .send()
            .await?;

        handle_response(response).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| HeadscaleError::invalid_url("base URL cannot have a path"))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    } else {
        Err(handle_error(status, response).await)
    }
}

async fn handle_error(status: StatusCode, response: Response) -> HeadscaleError {
    let resource = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            warn!(status = status.as_u16(), "Headscale rejected the API key");
            HeadscaleError::Unauthorized { message }
        }
        StatusCode::NOT_FOUND => HeadscaleError::NotFound { resource },
        _ => HeadscaleError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pulls a message out of an error body: the JSON `error` or `message` field
/// if present, otherwise the trimmed body text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message"]
                .iter()
                .find_map(|key| v.get(key).and_then(|m| m.as_str()).map(String::from))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Builder for [`HeadscaleClient`].
#[derive(Debug, Clone)]
pub struct HeadscaleClientBuilder {
    base_url: String,
    api_key: String,
    timeout: Duration,
    user_agent: String,
}

impl HeadscaleClientBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("claw-headscale/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the User-Agent header.
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Builds the client.
    pub fn build(self) -> Result<HeadscaleClient> {
        let base_url = parse_base_url(&self.base_url)?;
        if self.api_key.is_empty() {
            return Err(HeadscaleError::config("API key cannot be empty"));
        }

        let http = HttpClient::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()?;

        Ok(HeadscaleClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                api_key: self.api_key,
            }),
        })
    }
}

/// Parses and checks a Headscale base URL.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| HeadscaleError::invalid_url(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(HeadscaleError::invalid_url(format!(
            "{raw}: scheme must be http or https"
        )));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(HeadscaleError::invalid_url(format!("{raw}: missing host")));
    }
    Ok(url)
}
