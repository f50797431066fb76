//! Invocation outcome record and step-output emission.
//!
//! The normalized outcome is rendered two ways: a structured JSON event
//! on the log stream, and `key=value` step outputs for the surrounding
//! pipeline (appended to the file named by `$GITHUB_OUTPUT` when set,
//! printed to stdout otherwise).

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::GateResult;
use crate::scanner::ScanVerdict;

/// The normalized outcome of one gate invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateReport {
    /// The scan verdict as reported by the service.
    pub verdict: ScanVerdict,

    /// Whether this verdict fails the pipeline.
    pub failed: bool,
}

impl GateReport {
    /// Normalizes a verdict into an outcome.
    ///
    /// Only an infected verdict can fail the run, and only when the
    /// fail-on-infected policy is set. An unscannable verdict is reported
    /// but never forces failure.
    pub fn from_verdict(verdict: ScanVerdict, fail_on_infected: bool) -> Self {
        let failed = verdict.is_infected() && fail_on_infected;
        Self { verdict, failed }
    }

    /// Step outputs for the surrounding pipeline.
    ///
    /// `finding` and `real-file-type` are emitted only when present.
    pub fn outputs(&self) -> Vec<(&'static str, String)> {
        let mut outputs = vec![
            ("status", self.verdict.status.to_string()),
            ("file-size", self.verdict.size.to_string()),
        ];
        if let Some(finding) = &self.verdict.finding {
            outputs.push(("finding", finding.clone()));
        }
        if let Some(filetype) = &self.verdict.realfiletype {
            outputs.push(("real-file-type", filetype.clone()));
        }
        outputs
    }

    /// Emits the outcome as a JSON log event and as step outputs.
    pub fn emit(&self) -> GateResult<()> {
        match serde_json::to_string(self) {
            Ok(event) => {
                tracing::info!(target: "scangate::report", event = %event, "scan outcome");
            }
            Err(e) => {
                tracing::debug!(error = %e, "could not serialize scan outcome event");
            }
        }

        match std::env::var_os("GITHUB_OUTPUT") {
            Some(path) => self.write_outputs_to(Path::new(&path)),
            None => {
                let stdout = std::io::stdout();
                self.write_outputs(&mut stdout.lock())
            }
        }
    }

    fn write_outputs_to(&self, path: &Path) -> GateResult<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        self.write_outputs(&mut file)
    }

    fn write_outputs(&self, writer: &mut dyn Write) -> GateResult<()> {
        for (name, value) in self.outputs() {
            writeln!(writer, "{name}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ScanStatus;

    fn verdict(status: ScanStatus, finding: Option<&str>) -> ScanVerdict {
        ScanVerdict {
            status,
            finding: finding.map(str::to_string),
            size: 1024,
            realfiletype: Some("application/zip".into()),
        }
    }

    #[test]
    fn test_infected_fails_only_with_flag() {
        let infected = verdict(ScanStatus::Infected, Some("Trojan.Test"));
        assert!(GateReport::from_verdict(infected.clone(), true).failed);
        assert!(!GateReport::from_verdict(infected, false).failed);
    }

    #[test]
    fn test_clean_and_unscannable_never_fail() {
        for status in [ScanStatus::Clean, ScanStatus::Unscannable] {
            let report = GateReport::from_verdict(verdict(status, None), true);
            assert!(!report.failed);
        }
    }

    #[test]
    fn test_outputs_include_optionals_when_present() {
        let report = GateReport::from_verdict(verdict(ScanStatus::Infected, Some("Trojan.Test")), true);
        let outputs = report.outputs();
        assert!(outputs.contains(&("status", "infected".to_string())));
        assert!(outputs.contains(&("file-size", "1024".to_string())));
        assert!(outputs.contains(&("finding", "Trojan.Test".to_string())));
        assert!(outputs.contains(&("real-file-type", "application/zip".to_string())));
    }

    #[test]
    fn test_outputs_skip_absent_optionals() {
        let mut v = verdict(ScanStatus::Clean, None);
        v.realfiletype = None;
        let outputs = GateReport::from_verdict(v, true).outputs();
        assert_eq!(
            outputs,
            vec![
                ("status", "clean".to_string()),
                ("file-size", "1024".to_string()),
            ]
        );
    }

    #[test]
    fn test_written_outputs_are_line_oriented() {
        let report = GateReport::from_verdict(verdict(ScanStatus::Clean, None), true);
        let mut buffer = Vec::new();
        report.write_outputs(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("status=clean\n"));
        assert!(text.contains("file-size=1024\n"));
    }
}
