//! Remote scanning-service wire contract.
//!
//! The service exposes a sync API (verdict in the response) and an async
//! API (submit, then poll a result endpoint). Both render verdicts in the
//! same JSON shape, parsed here as [`ScanVerdict`].

mod client;
mod poll;

pub use client::{AsyncJob, DownloadRequest, ScanClient};
pub use poll::{poll_until_verdict, PollSettings};

use serde::{Deserialize, Serialize};

/// The verdict status reported by the scanning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// No threat detected.
    Clean,

    /// A threat was detected; `finding` names it.
    Infected,

    /// The service declined to render a verdict, e.g. for an unsupported
    /// file type. Distinct from both `Clean` and `Infected`, and never a
    /// failure by itself.
    #[serde(rename = "no")]
    Unscannable,
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Infected => write!(f, "infected"),
            Self::Unscannable => write!(f, "no"),
        }
    }
}

/// A parsed scan verdict.
///
/// Wire shape: `{"status": "clean"|"infected"|"no", "finding"?, "size",
/// "realfiletype"?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanVerdict {
    /// Verdict status.
    pub status: ScanStatus,

    /// Name of the finding, present when infected or unscannable with a
    /// stated reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finding: Option<String>,

    /// Size of the scanned payload in bytes, as reported by the service.
    #[serde(default)]
    pub size: u64,

    /// File type detected by the service, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realfiletype: Option<String>,
}

impl ScanVerdict {
    /// Returns `true` if the verdict is clean.
    pub fn is_clean(&self) -> bool {
        self.status == ScanStatus::Clean
    }

    /// Returns `true` if the verdict is infected.
    pub fn is_infected(&self) -> bool {
        self.status == ScanStatus::Infected
    }

    /// Returns `true` if the service declined to scan.
    pub fn is_unscannable(&self) -> bool {
        self.status == ScanStatus::Unscannable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_infected_verdict() {
        let verdict: ScanVerdict = serde_json::from_str(
            r#"{"status": "infected", "finding": "Eicar-Test-Signature", "size": 68, "realfiletype": "text/plain"}"#,
        )
        .unwrap();
        assert!(verdict.is_infected());
        assert_eq!(verdict.finding.as_deref(), Some("Eicar-Test-Signature"));
        assert_eq!(verdict.size, 68);
        assert_eq!(verdict.realfiletype.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_parse_minimal_clean_verdict() {
        let verdict: ScanVerdict = serde_json::from_str(r#"{"status": "clean", "size": 42}"#).unwrap();
        assert!(verdict.is_clean());
        assert!(verdict.finding.is_none());
        assert!(verdict.realfiletype.is_none());
    }

    #[test]
    fn test_no_verdict_maps_to_unscannable() {
        let verdict: ScanVerdict =
            serde_json::from_str(r#"{"status": "no", "finding": "encrypted archive", "size": 9}"#).unwrap();
        assert!(verdict.is_unscannable());
        assert!(!verdict.is_clean());
        assert!(!verdict.is_infected());
    }

    #[test]
    fn test_status_display_matches_wire_values() {
        assert_eq!(ScanStatus::Clean.to_string(), "clean");
        assert_eq!(ScanStatus::Infected.to_string(), "infected");
        assert_eq!(ScanStatus::Unscannable.to_string(), "no");
    }
}
