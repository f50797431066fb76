//! HTTP client for the scanning service.
//!
//! Three request shapes: a raw binary upload to the sync endpoint, a
//! URL-fetch request to the sync endpoint, and a submission to the async
//! endpoint. None of them is retried; a single failed call is terminal
//! for the invocation.

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{GateError, GateResult};
use crate::scanner::ScanVerdict;

const API_KEY_HEADER: &str = "x-api-key";

/// Sync-download and async-submit request body.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadRequest {
    /// URL the scanning service fetches itself.
    pub download_url: String,

    /// Headers the service attaches when fetching, e.g. a forwarded
    /// `Authorization` entry.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub download_headers: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct AsyncSubmitBody<'a> {
    download_url: &'a str,
    #[serde(skip_serializing_if = "map_ref_is_empty")]
    download_headers: &'a HashMap<String, String>,
    trace_id: Uuid,
}

fn map_ref_is_empty(map: &&HashMap<String, String>) -> bool {
    map.is_empty()
}

/// An accepted async submission, consumed by the poll loop.
///
/// Lives only for the current invocation; nothing about the job is
/// persisted.
#[derive(Debug, Clone)]
pub struct AsyncJob {
    /// Client-generated token correlating the submission with its result.
    pub trace_id: Uuid,

    /// When the submission was accepted; the poll deadline counts from here.
    pub submitted_at: Instant,

    /// The URL that was submitted.
    pub download_url: String,

    /// The headers that were forwarded with the submission.
    pub download_headers: HashMap<String, String>,
}

/// Client for the scanning service.
#[derive(Debug, Clone)]
pub struct ScanClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl ScanClient {
    /// Creates a client for the given service base URL and API key.
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> GateResult<Self> {
        // The sync-download path makes the service fetch up to 200 MiB
        // before answering, so the per-request timeout is generous.
        let http = reqwest::Client::builder()
            .user_agent(concat!("scangate/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Scans raw bytes via the sync-binary endpoint.
    pub async fn scan_binary(&self, bytes: Vec<u8>) -> GateResult<ScanVerdict> {
        let size = bytes.len();
        let url = format!("{}/v1/scan/sync/binary", self.base_url);

        tracing::info!(size_bytes = size, "uploading bytes for synchronous scan");

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .body(bytes)
            .send()
            .await?;

        Self::verdict_from_response(response).await
    }

    /// Scans a URL via the sync-download endpoint; the service fetches the
    /// URL itself and answers with the verdict.
    pub async fn scan_download(&self, request: &DownloadRequest) -> GateResult<ScanVerdict> {
        let url = format!("{}/v1/scan/sync/download", self.base_url);

        tracing::info!("submitting download URL for synchronous scan");

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        Self::verdict_from_response(response).await
    }

    /// Submits a URL to the async endpoint.
    ///
    /// The service answers 201 or 204 for an accepted submission and never
    /// returns a verdict here; the verdict is retrieved later via
    /// [`ScanClient::fetch_result`]. Both codes are treated as accepted.
    pub async fn submit_async(
        &self,
        download_url: String,
        download_headers: HashMap<String, String>,
    ) -> GateResult<AsyncJob> {
        let trace_id = Uuid::new_v4();
        let url = format!("{}/v1/scan/async/download", self.base_url);

        tracing::info!(%trace_id, "submitting download URL for asynchronous scan");

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&AsyncSubmitBody {
                download_url: &download_url,
                download_headers: &download_headers,
                trace_id,
            })
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::CREATED && status != reqwest::StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            return Err(GateError::scan_service(status.as_u16(), body));
        }

        Ok(AsyncJob {
            trace_id,
            submitted_at: Instant::now(),
            download_url,
            download_headers,
        })
    }

    /// Fetches the result of an async submission.
    ///
    /// Returns `Ok(None)` while the verdict is not ready (HTTP 404).
    pub async fn fetch_result(&self, trace_id: &Uuid) -> GateResult<Option<ScanVerdict>> {
        let url = format!("{}/v1/scan/async/result", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("trace_id", trace_id.to_string())])
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Self::verdict_from_response(response).await.map(Some)
    }

    async fn verdict_from_response(response: reqwest::Response) -> GateResult<ScanVerdict> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), %body, "scan service rejected the request");
            return Err(GateError::scan_service(status.as_u16(), body));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| GateError::malformed(e.to_string()))
    }
}
