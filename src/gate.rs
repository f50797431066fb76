//! The gate orchestrator.
//!
//! Composes target resolution, transport selection, and the async poll
//! loop into one invocation, then decides whether the verdict fails the
//! pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use secrecy::ExposeSecret;

use crate::config::Config;
use crate::error::GateResult;
use crate::hosting::{ArtifactHost, GitHubHost};
use crate::report::GateReport;
use crate::scanner::{poll_until_verdict, DownloadRequest, PollSettings, ScanClient, ScanVerdict};
use crate::target::{AccessHandle, ResolvedTarget, TargetResolver, TransportTier};

/// One scan-gate invocation.
///
/// Owns every entity it creates; nothing survives past [`Gate::run`].
pub struct Gate {
    config: Config,
    host: Arc<dyn ArtifactHost>,
    client: ScanClient,
}

impl Gate {
    /// Builds a gate with production collaborators from the configuration.
    pub fn new(config: Config) -> GateResult<Self> {
        let repository = config.repository.clone().unwrap_or_default();
        let host = GitHubHost::new(config.api_url.clone(), repository)?
            .with_token(config.token.clone());
        let client = ScanClient::new(config.endpoint.clone(), config.api_key.clone())?;
        Ok(Self::from_parts(config, Arc::new(host), client))
    }

    /// Builds a gate over explicit collaborators, used by tests.
    pub fn from_parts(config: Config, host: Arc<dyn ArtifactHost>, client: ScanClient) -> Self {
        Self {
            config,
            host,
            client,
        }
    }

    /// Runs the scan and returns the normalized outcome.
    ///
    /// Errors from lower components propagate unchanged; the binary
    /// boundary logs them once and maps them to a non-zero exit.
    pub async fn run(&self) -> GateResult<GateReport> {
        let resolver = TargetResolver::new(self.host.as_ref(), &self.config.working_root)
            .with_token(self.config.token.as_ref());
        let resolved = resolver.resolve(&self.config.target).await?;
        let tier = resolved.tier();

        tracing::info!(
            target = self.config.target.kind(),
            size_bytes = resolved.size_bytes,
            %tier,
            "scan target resolved"
        );

        let verdict = self.scan(resolved).await?;
        let report = GateReport::from_verdict(verdict, self.config.fail_on_infected);

        tracing::info!(
            status = %report.verdict.status,
            finding = ?report.verdict.finding,
            failed = report.failed,
            "scan verdict received"
        );

        Ok(report)
    }

    async fn scan(&self, resolved: ResolvedTarget) -> GateResult<ScanVerdict> {
        let tier = resolved.tier();
        let headers = self.download_headers(&resolved);
        match resolved.handle {
            AccessHandle::Bytes(bytes) => self.client.scan_binary(bytes).await,
            AccessHandle::DownloadUrl(url) if tier == TransportTier::AsyncDownload => {
                let job = self.client.submit_async(url, headers).await?;
                let settings = PollSettings {
                    interval: self.config.poll_interval,
                    timeout: self.config.timeout,
                };
                poll_until_verdict(&self.client, &job, settings).await
            }
            AccessHandle::DownloadUrl(url) => {
                self.client
                    .scan_download(&DownloadRequest {
                        download_url: url,
                        download_headers: headers,
                    })
                    .await
            }
        }
    }

    /// Headers the scanning service attaches when it fetches the URL.
    ///
    /// The bearer token is forwarded only for URL-based tiers; a direct
    /// upload involves no third-party fetch, so no credential travels
    /// with it.
    fn download_headers(&self, resolved: &ResolvedTarget) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if resolved.requires_auth {
            if let Some(token) = &self.config.token {
                headers.insert(
                    "Authorization".to_string(),
                    format!("Bearer {}", token.expose_secret()),
                );
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Cli;
    use clap::Parser;
    use secrecy::SecretString;
    use crate::hosting::MockHost;
    use crate::scanner::ScanStatus;
    use crate::target::ScanTarget;
    use mockito::Matcher;
    use std::io::Write;
    use std::path::PathBuf;

    fn config(target: ScanTarget, endpoint: String, fail_on_infected: bool) -> Config {
        Config {
            target,
            endpoint,
            api_key: SecretString::new("key-123".to_string().into()),
            token: Some(SecretString::new("token-abc".to_string().into())),
            repository: Some("acme/widgets".into()),
            api_url: "https://api.github.test".into(),
            timeout: std::time::Duration::from_secs(30),
            poll_interval: std::time::Duration::from_secs(1),
            fail_on_infected,
            working_root: PathBuf::from("."),
        }
    }

    fn gate_for(config: Config, host: MockHost) -> Gate {
        let client = ScanClient::new(
            config.endpoint.clone(),
            SecretString::new("key-123".to_string().into()),
        )
        .unwrap();
        Gate::from_parts(config, Arc::new(host), client)
    }

    #[tokio::test]
    async fn test_local_file_goes_through_direct_upload() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("app.bin")).unwrap();
        file.write_all(b"binary contents").unwrap();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/scan/sync/binary")
            .match_header("x-api-key", "key-123")
            .match_body("binary contents")
            .with_status(200)
            .with_body(r#"{"status": "clean", "size": 15}"#)
            .create_async()
            .await;

        let mut config = config(
            ScanTarget::LocalFile {
                path: PathBuf::from("app.bin"),
            },
            server.url(),
            true,
        );
        config.working_root = dir.path().to_path_buf();

        let report = gate_for(config, MockHost::new()).run().await.unwrap();
        assert_eq!(report.verdict.status, ScanStatus::Clean);
        assert!(!report.failed);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_artifact_goes_through_sync_download_with_forwarded_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/scan/sync/download")
            .match_body(Matcher::Json(serde_json::json!({
                "download_url": "https://blob.test/signed",
                "download_headers": {"Authorization": "Bearer token-abc"}
            })))
            .with_status(200)
            .with_body(r#"{"status": "clean", "size": 5000000}"#)
            .create_async()
            .await;

        let host = MockHost::new()
            .with_artifact(42, 5_000_000, "https://api.github.test/artifacts/42/zip")
            .with_resolved_url("https://blob.test/signed");

        let report = gate_for(
            config(ScanTarget::BuildArtifact { id: 42 }, server.url(), true),
            host,
        )
        .run()
        .await
        .unwrap();

        assert!(!report.failed);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_large_release_asset_goes_async_and_polls() {
        let mut server = mockito::Server::new_async().await;
        let submit = server
            .mock("POST", "/v1/scan/async/download")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "download_url": "https://blob.test/huge"
            })))
            .with_status(201)
            .create_async()
            .await;
        let result = server
            .mock("GET", "/v1/scan/async/result")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status": "clean", "size": 209715200}"#)
            .create_async()
            .await;

        let host = MockHost::new()
            .with_release_asset(9, 200 * 1024 * 1024, "https://api.github.test/assets/9")
            .with_resolved_url("https://blob.test/huge");

        let report = gate_for(
            config(ScanTarget::ReleaseAsset { id: 9 }, server.url(), true),
            host,
        )
        .run()
        .await
        .unwrap();

        assert!(report.verdict.is_clean());
        submit.assert_async().await;
        result.assert_async().await;
    }

    #[tokio::test]
    async fn test_infected_fails_when_flag_set() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/scan/sync/download")
            .with_status(200)
            .with_body(r#"{"status": "infected", "finding": "Eicar-Test-Signature", "size": 68}"#)
            .expect(2)
            .create_async()
            .await;

        let host = || {
            MockHost::new()
                .with_artifact(1, 68, "https://api.github.test/artifacts/1/zip")
                .with_resolved_url("https://blob.test/x")
        };

        let failing = gate_for(
            config(ScanTarget::BuildArtifact { id: 1 }, server.url(), true),
            host(),
        )
        .run()
        .await
        .unwrap();
        assert!(failing.failed);

        let reporting_only = gate_for(
            config(ScanTarget::BuildArtifact { id: 1 }, server.url(), false),
            host(),
        )
        .run()
        .await
        .unwrap();
        assert!(!reporting_only.failed);
        assert_eq!(
            reporting_only.verdict.finding.as_deref(),
            Some("Eicar-Test-Signature")
        );
    }

    #[tokio::test]
    async fn test_unscannable_never_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/scan/sync/download")
            .with_status(200)
            .with_body(r#"{"status": "no", "finding": "encrypted archive", "size": 10}"#)
            .create_async()
            .await;

        let host = MockHost::new()
            .with_artifact(1, 10, "https://api.github.test/artifacts/1/zip")
            .with_resolved_url("https://blob.test/x");

        let report = gate_for(
            config(ScanTarget::BuildArtifact { id: 1 }, server.url(), true),
            host,
        )
        .run()
        .await
        .unwrap();

        assert!(report.verdict.is_unscannable());
        assert!(!report.failed);
    }

    #[tokio::test]
    async fn test_artifact_without_token_makes_no_host_call() {
        let mut config = config(
            ScanTarget::BuildArtifact { id: 1 },
            "https://scan.test".into(),
            true,
        );
        config.token = None;
        let host = Arc::new(MockHost::new());
        let client = ScanClient::new(
            "https://scan.test",
            SecretString::new("key-123".to_string().into()),
        )
        .unwrap();
        let gate = Gate::from_parts(config, Arc::clone(&host) as Arc<dyn ArtifactHost>, client);

        let err = gate.run().await.unwrap_err();
        assert!(matches!(err, crate::error::GateError::MissingCredential));
        assert_eq!(host.artifact_calls(), 0);
    }

    #[test]
    fn test_config_from_cli_builds_a_gate() {
        let cli = Cli::parse_from([
            "scangate",
            "--file",
            "dist/app.zip",
            "--endpoint",
            "https://scan.example.test",
        ]);
        let config = cli
            .with_env(crate::config::EnvInputs {
                api_key: Some("k".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(Gate::new(config).is_ok());
    }
}
