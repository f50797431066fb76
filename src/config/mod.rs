//! CLI and environment configuration.
//!
//! Flags select the scan target and tune the gate; secrets come from the
//! environment only (`SCANGATE_API_KEY`, `SCANGATE_TOKEN`/`GITHUB_TOKEN`)
//! so they never show up in process listings. All validation happens here,
//! before any I/O: exactly one target, seconds ranges, and the repository
//! slug required by hosted targets.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;

use crate::error::{GateError, GateResult};
use crate::target::ScanTarget;

const MIN_SECONDS: u64 = 1;
const MAX_SECONDS: u64 = 3600;

/// Command-line interface of the `scangate` binary.
#[derive(Debug, Parser)]
#[command(
    name = "scangate",
    about = "Submit a file, build artifact, or release asset to a malware-scanning service and gate the pipeline on the verdict"
)]
pub struct Cli {
    /// Path to a repository file to scan, resolved against the working root
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Numeric ID of a pipeline build artifact to scan
    #[arg(long, value_name = "ID")]
    pub artifact_id: Option<u64>,

    /// Numeric ID of a release asset to scan
    #[arg(long, value_name = "ID")]
    pub release_asset_id: Option<u64>,

    /// Base URL of the scanning service
    #[arg(long, value_name = "URL")]
    pub endpoint: String,

    /// Repository slug (owner/repo); defaults to $GITHUB_REPOSITORY
    #[arg(long, value_name = "OWNER/REPO")]
    pub repository: Option<String>,

    /// Base URL of the hosting API
    #[arg(long, value_name = "URL", default_value = "https://api.github.com")]
    pub api_url: String,

    /// Seconds to wait for an async scan verdict before giving up
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,

    /// Seconds between async result polls
    #[arg(long, default_value_t = 5)]
    pub polling_interval: u64,

    /// Whether an infected verdict fails the pipeline
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, value_name = "BOOL")]
    pub fail_on_infected: bool,

    /// Directory local file paths are resolved against; defaults to
    /// $GITHUB_WORKSPACE, then the current directory
    #[arg(long, value_name = "PATH")]
    pub working_root: Option<PathBuf>,
}

/// Values read from the process environment.
#[derive(Debug, Default)]
pub(crate) struct EnvInputs {
    pub api_key: Option<String>,
    pub token: Option<String>,
    pub repository: Option<String>,
    pub workspace: Option<String>,
}

impl EnvInputs {
    fn from_process_env() -> Self {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            api_key: non_empty("SCANGATE_API_KEY"),
            token: non_empty("SCANGATE_TOKEN").or_else(|| non_empty("GITHUB_TOKEN")),
            repository: non_empty("GITHUB_REPOSITORY"),
            workspace: non_empty("GITHUB_WORKSPACE"),
        }
    }
}

/// Validated configuration for one gate invocation.
#[derive(Debug)]
pub struct Config {
    /// The single scan target.
    pub target: ScanTarget,

    /// Scanning-service base URL, without a trailing slash.
    pub endpoint: String,

    /// Scanning-service API key.
    pub api_key: SecretString,

    /// Bearer token for the hosting API, when available.
    pub token: Option<SecretString>,

    /// Repository slug, present for hosted targets.
    pub repository: Option<String>,

    /// Hosting-API base URL.
    pub api_url: String,

    /// Async poll deadline.
    pub timeout: Duration,

    /// Async poll interval.
    pub poll_interval: Duration,

    /// Whether an infected verdict fails the run.
    pub fail_on_infected: bool,

    /// Directory local file paths are resolved against.
    pub working_root: PathBuf,
}

impl Cli {
    /// Validates the CLI inputs against the process environment.
    pub fn into_config(self) -> GateResult<Config> {
        self.with_env(EnvInputs::from_process_env())
    }

    pub(crate) fn with_env(self, env: EnvInputs) -> GateResult<Config> {
        let target = select_target(self.file, self.artifact_id, self.release_asset_id)?;

        let api_key = env
            .api_key
            .ok_or_else(|| GateError::configuration("SCANGATE_API_KEY must be set and non-empty"))?;
        let token = env.token.map(|t| SecretString::new(t.into()));

        let repository = self.repository.or(env.repository);
        if repository.is_none() && !matches!(target, ScanTarget::LocalFile { .. }) {
            return Err(GateError::configuration(
                "a repository (--repository or $GITHUB_REPOSITORY) is required for artifact and release-asset targets",
            ));
        }

        let timeout = seconds_in_range("timeout", self.timeout)?;
        let poll_interval = seconds_in_range("polling-interval", self.polling_interval)?;

        let working_root = self
            .working_root
            .or(env.workspace.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Config {
            target,
            endpoint: self.endpoint.trim_end_matches('/').to_string(),
            api_key: SecretString::new(api_key.into()),
            token,
            repository,
            api_url: self.api_url.trim_end_matches('/').to_string(),
            timeout,
            poll_interval,
            fail_on_infected: self.fail_on_infected,
            working_root,
        })
    }
}

fn select_target(
    file: Option<PathBuf>,
    artifact_id: Option<u64>,
    release_asset_id: Option<u64>,
) -> GateResult<ScanTarget> {
    match (file, artifact_id, release_asset_id) {
        (Some(path), None, None) => Ok(ScanTarget::LocalFile { path }),
        (None, Some(id), None) => Ok(ScanTarget::BuildArtifact { id }),
        (None, None, Some(id)) => Ok(ScanTarget::ReleaseAsset { id }),
        (None, None, None) => Err(GateError::configuration(
            "exactly one of --file, --artifact-id, or --release-asset-id must be given",
        )),
        _ => Err(GateError::configuration(
            "only one of --file, --artifact-id, and --release-asset-id may be given",
        )),
    }
}

fn seconds_in_range(name: &str, value: u64) -> GateResult<Duration> {
    if !(MIN_SECONDS..=MAX_SECONDS).contains(&value) {
        return Err(GateError::configuration(format!(
            "{name} must be between {MIN_SECONDS} and {MAX_SECONDS} seconds, got {value}"
        )));
    }
    Ok(Duration::from_secs(value))
}
