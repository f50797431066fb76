//! # Scangate
//!
//! A CI gate that submits a file to a remote malware-scanning service and
//! fails the pipeline when the verdict is infected.
//!
//! ## Overview
//!
//! One invocation scans exactly one target:
//!
//! - a **local repository file** (up to 10 MiB, uploaded directly),
//! - a **pipeline build artifact** (by numeric ID, fetched by the service
//!   through a short-lived download URL), or
//! - a **release asset** (by numeric ID, likewise URL-based).
//!
//! File size selects the transport: small local files go through the
//! synchronous binary upload, URL-based targets under 200 MiB through the
//! synchronous download endpoint, and anything at or above 200 MiB through
//! the asynchronous submit-then-poll protocol.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use scangate::{Cli, Gate};
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Cli::parse().into_config()?;
//!     let report = Gate::new(config)?.run().await?;
//!     report.emit()?;
//!     std::process::exit(if report.failed { 1 } else { 0 });
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: CLI flags and environment secrets, validated before any I/O
//! - [`target`]: target resolution and transport-tier classification
//! - [`hosting`]: hosting-API metadata lookups and the redirect handshake
//! - [`scanner`]: the scanning-service wire contract and the async poll loop
//! - [`gate`]: the orchestrator tying the layers together
//! - [`report`]: the normalized outcome and step-output emission

pub mod config;
pub mod error;
pub mod gate;
pub mod hosting;
pub mod report;
pub mod scanner;
pub mod target;

pub use config::{Cli, Config};
pub use error::{GateError, GateResult};
pub use gate::Gate;
pub use hosting::{ArtifactHost, GitHubHost, MockHost};
pub use report::GateReport;
pub use scanner::{ScanClient, ScanStatus, ScanVerdict};
pub use target::{ScanTarget, TransportTier};
