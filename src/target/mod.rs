//! Scan targets and the size-tiered target resolver.
//!
//! A target is one of: a local repository file, a pipeline build artifact,
//! or a release asset. The resolver turns a target into something the
//! scanning service can consume (raw bytes or a short-lived download URL)
//! and the size classifies it into a transport tier.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::error::{GateError, GateResult};
use crate::hosting::{ArtifactHost, TargetKind};

/// Largest file the sync-binary endpoint accepts as a raw upload.
pub const DIRECT_UPLOAD_MAX: u64 = 10 * 1024 * 1024;

/// Smallest size routed to the async submit/poll protocol.
///
/// Exactly this size is async, not sync.
pub const ASYNC_MIN: u64 = 200 * 1024 * 1024;

/// The file to scan, exactly one per invocation.
///
/// Modeled as a sum type so an invalid "no target" or "two targets" state
/// cannot exist past configuration validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    /// A file in the repository checkout.
    LocalFile {
        /// Path, resolved against the working root when relative.
        path: PathBuf,
    },

    /// A pipeline build artifact, addressed by its numeric ID.
    BuildArtifact {
        /// Artifact ID on the hosting API.
        id: u64,
    },

    /// A release asset, addressed by its numeric ID.
    ReleaseAsset {
        /// Asset ID on the hosting API.
        id: u64,
    },
}

impl ScanTarget {
    /// Returns a stable name for the target kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LocalFile { .. } => "local-file",
            Self::BuildArtifact { .. } => "build-artifact",
            Self::ReleaseAsset { .. } => "release-asset",
        }
    }
}

/// How the scanning service can reach the target's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessHandle {
    /// Fully buffered contents, for small local files only.
    Bytes(Vec<u8>),

    /// A short-lived, directly fetchable URL.
    DownloadUrl(String),
}

/// A resolved target, ready for tier classification and transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Size of the target in bytes, from a stat or hosting-API metadata.
    pub size_bytes: u64,

    /// Byte- or URL-accessible handle on the target.
    pub handle: AccessHandle,

    /// Whether dereferencing the URL needs an `Authorization` header
    /// forwarded by the caller.
    pub requires_auth: bool,
}

/// The transport strategy selected for a resolved target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportTier {
    /// Raw bytes POSTed to the sync-binary endpoint.
    DirectUpload,

    /// URL handed to the sync-download endpoint; verdict in the response.
    SyncDownload,

    /// URL submitted to the async endpoint, verdict retrieved by polling.
    AsyncDownload,
}

impl std::fmt::Display for TransportTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DirectUpload => write!(f, "direct-upload"),
            Self::SyncDownload => write!(f, "sync-download"),
            Self::AsyncDownload => write!(f, "async-download"),
        }
    }
}

impl ResolvedTarget {
    /// Classifies this target into a transport tier.
    ///
    /// Buffered bytes always go through direct upload; the resolver never
    /// buffers more than [`DIRECT_UPLOAD_MAX`]. URL handles split on
    /// [`ASYNC_MIN`], with the boundary itself routed async.
    pub fn tier(&self) -> TransportTier {
        match self.handle {
            AccessHandle::Bytes(_) => TransportTier::DirectUpload,
            AccessHandle::DownloadUrl(_) => {
                if self.size_bytes >= ASYNC_MIN {
                    TransportTier::AsyncDownload
                } else {
                    TransportTier::SyncDownload
                }
            }
        }
    }
}

/// Resolves a [`ScanTarget`] into a [`ResolvedTarget`].
///
/// Hosting-API lookups and the redirect handshake go through the
/// [`ArtifactHost`] seam, so the resolver itself performs no I/O beyond
/// reading local files.
#[derive(Debug)]
pub struct TargetResolver<'a> {
    host: &'a dyn ArtifactHost,
    working_root: &'a Path,
    token: Option<&'a SecretString>,
}

impl<'a> TargetResolver<'a> {
    /// Creates a resolver over the given hosting API and working root.
    pub fn new(host: &'a dyn ArtifactHost, working_root: &'a Path) -> Self {
        Self {
            host,
            working_root,
            token: None,
        }
    }

    /// Sets the bearer token used for hosting-API access.
    pub fn with_token(mut self, token: Option<&'a SecretString>) -> Self {
        self.token = token;
        self
    }

    /// Resolves the target to a size and an access handle.
    pub async fn resolve(&self, target: &ScanTarget) -> GateResult<ResolvedTarget> {
        match target {
            ScanTarget::LocalFile { path } => self.resolve_local_file(path).await,
            ScanTarget::BuildArtifact { id } => self.resolve_artifact(*id).await,
            ScanTarget::ReleaseAsset { id } => self.resolve_release_asset(*id).await,
        }
    }

    async fn resolve_local_file(&self, path: &Path) -> GateResult<ResolvedTarget> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_root.join(path)
        };

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GateError::NotFound {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let size_bytes = metadata.len();
        if size_bytes > DIRECT_UPLOAD_MAX {
            return Err(GateError::UnsupportedLocalFileSize {
                size: size_bytes,
                max: DIRECT_UPLOAD_MAX,
            });
        }

        // tokio::fs::read closes the handle on every path, including errors.
        let bytes = tokio::fs::read(&path).await?;

        tracing::debug!(
            path = %path.display(),
            size_bytes,
            "buffered local file for direct upload"
        );

        Ok(ResolvedTarget {
            size_bytes,
            handle: AccessHandle::Bytes(bytes),
            requires_auth: false,
        })
    }

    async fn resolve_artifact(&self, id: u64) -> GateResult<ResolvedTarget> {
        // Checked before any hosting-API call is made.
        if self.token.is_none() {
            return Err(GateError::MissingCredential);
        }

        let metadata = self.host.fetch_artifact_metadata(id).await?;

        // Artifact download URLs expire within about a minute, so the
        // redirect is resolved here and handed straight to the transport.
        let url = self
            .host
            .resolve_download_url(&metadata.archive_url, TargetKind::Artifact)
            .await?;

        tracing::debug!(
            artifact_id = id,
            size_bytes = metadata.size_bytes,
            "resolved build artifact to download URL"
        );

        Ok(ResolvedTarget {
            size_bytes: metadata.size_bytes,
            handle: AccessHandle::DownloadUrl(url),
            requires_auth: self.token.is_some(),
        })
    }

    async fn resolve_release_asset(&self, id: u64) -> GateResult<ResolvedTarget> {
        let metadata = self.host.fetch_release_asset_metadata(id).await?;

        // Only the asset's API URL supports the redirect handshake; the
        // browser download URL is carried in the metadata but never used.
        let url = self
            .host
            .resolve_download_url(&metadata.asset_url, TargetKind::ReleaseAsset)
            .await?;

        tracing::debug!(
            asset_id = id,
            size_bytes = metadata.size_bytes,
            "resolved release asset to download URL"
        );

        Ok(ResolvedTarget {
            size_bytes: metadata.size_bytes,
            handle: AccessHandle::DownloadUrl(url),
            requires_auth: self.token.is_some(),
        })
    }
}
