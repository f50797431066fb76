//! Hosting-API collaborator: artifact and release-asset metadata lookups.
//!
//! The [`ArtifactHost`] trait is the seam between the resolver and the
//! source-control hosting API. [`GitHubHost`] is the production
//! implementation; [`MockHost`] backs the tests.

mod redirect;

pub mod mock;

pub use mock::MockHost;
pub use redirect::RedirectResolver;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{GateError, GateResult};

/// Which kind of hosted object a URL refers to.
///
/// Selects the `Accept` header the hosting API expects during the
/// redirect handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A pipeline build artifact.
    Artifact,
    /// A release asset.
    ReleaseAsset,
}

impl TargetKind {
    /// The `Accept` header value the hosting API expects for this kind.
    pub fn accept(&self) -> &'static str {
        match self {
            Self::Artifact => "application/vnd.github+json",
            Self::ReleaseAsset => "application/octet-stream",
        }
    }
}

/// Metadata for a build artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    /// Artifact size in bytes.
    pub size_bytes: u64,

    /// Archive listing URL; must go through the redirect handshake
    /// before it is directly fetchable.
    pub archive_url: String,
}

/// Metadata for a release asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAssetMetadata {
    /// Asset size in bytes.
    pub size_bytes: u64,

    /// Asset API URL; supports the redirect handshake.
    pub asset_url: String,

    /// Public browser download URL. Carried for completeness but never
    /// used for scanning, since it bypasses the redirect handshake.
    pub browser_download_url: Option<String>,
}

/// The hosting-API seam used by the target resolver.
///
/// Implementations perform exactly one network call per method and apply
/// no retry; a failed call is terminal for the invocation.
#[async_trait]
pub trait ArtifactHost: Send + Sync + Debug {
    /// Fetches size and archive URL for a build artifact.
    async fn fetch_artifact_metadata(&self, id: u64) -> GateResult<ArtifactMetadata>;

    /// Fetches size and URLs for a release asset.
    async fn fetch_release_asset_metadata(&self, id: u64) -> GateResult<ReleaseAssetMetadata>;

    /// Exchanges a metadata URL for a short-lived direct-download URL via
    /// an unfollowed redirect.
    async fn resolve_download_url(&self, url: &str, kind: TargetKind) -> GateResult<String>;
}

const USER_AGENT: &str = concat!("scangate/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ArtifactResponse {
    size_in_bytes: u64,
    archive_download_url: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseAssetResponse {
    size: u64,
    url: String,
    browser_download_url: Option<String>,
}

/// GitHub-style hosting API client.
#[derive(Debug, Clone)]
pub struct GitHubHost {
    http: reqwest::Client,
    base_url: String,
    repository: String,
    token: Option<SecretString>,
    redirect: RedirectResolver,
}

impl GitHubHost {
    /// Creates a client for the given API base URL and `owner/repo` slug.
    pub fn new(base_url: impl Into<String>, repository: impl Into<String>) -> GateResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            repository: repository.into(),
            token: None,
            redirect: RedirectResolver::new()?,
        })
    }

    /// Sets the bearer token attached to hosting-API requests.
    pub fn with_token(mut self, token: Option<SecretString>) -> Self {
        self.token = token;
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> GateResult<T> {
        let mut request = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), "hosting API request failed");
            return Err(GateError::HostingApi {
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| {
            tracing::warn!(%url, error = %e, "hosting API returned an unparseable body");
            GateError::HostingApi {
                status: status.as_u16(),
            }
        })
    }
}

#[async_trait]
impl ArtifactHost for GitHubHost {
    async fn fetch_artifact_metadata(&self, id: u64) -> GateResult<ArtifactMetadata> {
        let url = format!(
            "{}/repos/{}/actions/artifacts/{}",
            self.base_url, self.repository, id
        );
        let body: ArtifactResponse = self.get_json(&url).await?;
        Ok(ArtifactMetadata {
            size_bytes: body.size_in_bytes,
            archive_url: body.archive_download_url,
        })
    }

    async fn fetch_release_asset_metadata(&self, id: u64) -> GateResult<ReleaseAssetMetadata> {
        let url = format!(
            "{}/repos/{}/releases/assets/{}",
            self.base_url, self.repository, id
        );
        let body: ReleaseAssetResponse = self.get_json(&url).await?;
        Ok(ReleaseAssetMetadata {
            size_bytes: body.size,
            asset_url: body.url,
            browser_download_url: body.browser_download_url,
        })
    }

    async fn resolve_download_url(&self, url: &str, kind: TargetKind) -> GateResult<String> {
        self.redirect
            .resolve(url, kind.accept(), self.token.as_ref())
            .await
    }
}
