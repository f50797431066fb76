//! Redirect-resolution handshake.
//!
//! The hosting API hands out long-lived metadata URLs that answer a
//! `GET` with a redirect to a short-lived, pre-authenticated blob URL.
//! The scanning service needs the blob URL, so the handshake is performed
//! here with a client that refuses to follow redirects and reads the
//! `Location` header instead.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::{GateError, GateResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Exchanges a metadata URL for its redirect target.
///
/// Performs exactly one network call per resolution and applies no retry.
#[derive(Debug, Clone)]
pub struct RedirectResolver {
    http: reqwest::Client,
}

impl RedirectResolver {
    /// Creates a resolver with a non-following HTTP client.
    pub fn new() -> GateResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("scangate/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http })
    }

    /// Resolves `url` to the target of its redirect.
    ///
    /// Any non-3xx status, including a 2xx, is a protocol violation: the
    /// hosting API is documented to redirect these URLs, so a direct answer
    /// means the wrong URL was used.
    pub async fn resolve(
        &self,
        url: &str,
        accept: &str,
        token: Option<&SecretString>,
    ) -> GateResult<String> {
        let mut request = self.http.get(url).header(reqwest::header::ACCEPT, accept);
        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_redirection() {
            tracing::warn!(%url, status = status.as_u16(), "expected redirect, got direct answer");
            return Err(GateError::RedirectExpected {
                status: status.as_u16(),
            });
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(GateError::MissingRedirectTarget)?;

        tracing::debug!(%url, status = status.as_u16(), "resolved download redirect");
        Ok(location.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn token() -> SecretString {
        SecretString::new("bearer-token".to_string().into())
    }

    #[tokio::test]
    async fn test_redirect_yields_location() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/artifacts/1/zip")
            .match_header("accept", "application/vnd.github+json")
            .match_header("authorization", "Bearer bearer-token")
            .with_status(302)
            .with_header("location", "https://blob.test/signed?sig=abc")
            .create_async()
            .await;

        let resolver = RedirectResolver::new().unwrap();
        let url = format!("{}/artifacts/1/zip", server.url());
        let resolved = resolver
            .resolve(&url, "application/vnd.github+json", Some(&token()))
            .await
            .unwrap();

        assert_eq!(resolved, "https://blob.test/signed?sig=abc");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_success_status_is_protocol_violation() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/assets/2")
            .with_status(200)
            .with_body("not a redirect")
            .create_async()
            .await;

        let resolver = RedirectResolver::new().unwrap();
        let url = format!("{}/assets/2", server.url());
        let err = resolver
            .resolve(&url, "application/octet-stream", None)
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::RedirectExpected { status: 200 }));
    }

    #[tokio::test]
    async fn test_redirect_without_location_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/assets/3")
            .with_status(302)
            .create_async()
            .await;

        let resolver = RedirectResolver::new().unwrap();
        let url = format!("{}/assets/3", server.url());
        let err = resolver
            .resolve(&url, "application/octet-stream", None)
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::MissingRedirectTarget));
    }

    #[tokio::test]
    async fn test_anonymous_request_sends_no_authorization() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/assets/4")
            .match_header("authorization", Matcher::Missing)
            .with_status(307)
            .with_header("location", "https://blob.test/temporary")
            .create_async()
            .await;

        let resolver = RedirectResolver::new().unwrap();
        let url = format!("{}/assets/4", server.url());
        let resolved = resolver
            .resolve(&url, "application/octet-stream", None)
            .await
            .unwrap();

        assert_eq!(resolved, "https://blob.test/temporary");
        mock.assert_async().await;
    }
}
