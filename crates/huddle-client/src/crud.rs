//! Authoritative state source.

use std::time::Duration;

use async_trait::async_trait;
use huddle_core::ResourceKey;
use huddle_settings::ClientSettings;
use reqwest::Url;
use tracing::debug;

use crate::errors::{ApplicationError, ClientError};
use crate::view::ResourceSnapshot;

/// Read access to the CRUD API, the source of truth for every resource.
#[async_trait]
pub trait CrudApi: Send + Sync {
    /// Fetch the full current state of `key`.
    async fn fetch_resource(&self, key: &ResourceKey) -> Result<ResourceSnapshot, ClientError>;
}

/// [`CrudApi`] over HTTP: `GET {base}/api/resources/{kind}/{id}`.
///
/// The resource id is sent as a single percent-encoded path segment.
#[derive(Debug)]
pub struct HttpCrudApi {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl HttpCrudApi {
    /// Client for `base_url`, authenticating with `token` as a bearer credential.
    ///
    /// Fails if `base_url` is not an absolute hierarchical URL or the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            ClientError::Transport(format!("invalid CRUD base URL {base_url:?}: {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Transport(format!(
                "CRUD base URL {base_url} cannot carry a path"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("huddle-client/0.1")
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// Client for the `client.crudBaseUrl` setting.
    pub fn from_settings(
        settings: &ClientSettings,
        token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::new(&settings.crud_base_url, token)
    }

    fn resource_url(&self, key: &ResourceKey) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        let _ = url
            .path_segments_mut()
            .map_err(|()| {
                ClientError::Transport(format!("{} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["api", "resources", key.kind().as_str(), key.id()]);
        Ok(url)
    }
}

#[async_trait]
impl CrudApi for HttpCrudApi {
    async fn fetch_resource(&self, key: &ResourceKey) -> Result<ResourceSnapshot, ClientError> {
        let url = self.resource_url(key)?;
        debug!(%url, "fetching snapshot");
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("GET {url} failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ClientError::Auth(format!("CRUD API returned {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApplicationError::from_status(status.as_u16(), body).into());
        }

        let snapshot: ResourceSnapshot = response.json().await.map_err(|e| {
            ApplicationError::Unavailable(format!("invalid snapshot body: {e}"))
        })?;
        if &snapshot.resource_id != key {
            return Err(ApplicationError::Unavailable(format!(
                "asked for {key}, got {}",
                snapshot.resource_id
            ))
            .into());
        }
        Ok(snapshot)
    }
}
