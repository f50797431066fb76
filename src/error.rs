//! Error types for the scangate crate.
//!
//! Every failure mode is terminal for the invocation: nothing here is
//! retried internally. Errors are surfaced once, at the binary boundary,
//! as a logged message and a non-zero exit.

use thiserror::Error;

/// The main error type for a scan-gate invocation.
#[derive(Debug, Error)]
pub enum GateError {
    /// Bad, missing, or conflicting configuration inputs.
    ///
    /// Always raised before any network call is made.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The local file to scan does not exist.
    #[error("file not found: {path}")]
    NotFound {
        /// Path that was not found.
        path: String,
    },

    /// A local file exceeds the direct-upload ceiling.
    ///
    /// Local files cannot be dereferenced by the scanning service, so there
    /// is no URL-based tier for them to fall back to.
    #[error(
        "local file is {size} bytes but direct upload is capped at {max} bytes; \
         the scanning service cannot fetch local files itself, so upload the file \
         as a build artifact or release asset and scan that instead"
    )]
    UnsupportedLocalFileSize {
        /// Actual file size in bytes.
        size: u64,
        /// Maximum direct-upload size in bytes.
        max: u64,
    },

    /// An artifact scan was requested without a bearer token.
    #[error("scanning a build artifact requires a token; artifacts are never anonymously accessible")]
    MissingCredential,

    /// The hosting API rejected a metadata request.
    #[error("hosting API request failed with status {status}")]
    HostingApi {
        /// HTTP status returned by the hosting API.
        status: u16,
    },

    /// The redirect handshake got a non-redirect response.
    #[error("expected a redirect while resolving the download URL, got status {status}")]
    RedirectExpected {
        /// HTTP status actually returned.
        status: u16,
    },

    /// The redirect handshake got a redirect without a `Location` header.
    #[error("redirect response carried no Location header")]
    MissingRedirectTarget,

    /// The scanning service rejected a request.
    #[error("scan service returned status {status}: {body}")]
    ScanService {
        /// HTTP status returned by the scanning service.
        status: u16,
        /// Raw response body, kept for diagnostics.
        body: String,
    },

    /// The scanning service returned a success response that could not be
    /// parsed as a verdict.
    #[error("scan service returned an unparseable verdict: {details}")]
    MalformedResponse {
        /// Parse error details.
        details: String,
    },

    /// The async poll loop hit its deadline without a verdict.
    #[error("no scan verdict after polling for {elapsed_secs} seconds")]
    PollTimeout {
        /// Seconds elapsed since the async submission.
        elapsed_secs: u64,
    },

    /// An I/O error occurred while reading a local file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A network-layer error (connection reset, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GateError {
    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a `ScanService` error from a status code and response body.
    pub fn scan_service(status: u16, body: impl Into<String>) -> Self {
        Self::ScanService {
            status,
            body: body.into(),
        }
    }

    /// Creates a `MalformedResponse` error.
    pub fn malformed(details: impl Into<String>) -> Self {
        Self::MalformedResponse {
            details: details.into(),
        }
    }

    /// Returns `true` if this error was raised before any network call.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::MissingCredential | Self::UnsupportedLocalFileSize { .. }
        )
    }
}

/// A specialized `Result` type for gate operations.
pub type GateResult<T> = Result<T, GateError>;
