//! Trust-anchor installation.
//!
//! Builds the CA bundle a client needs to trust certificates issued by the
//! test ACME server. The static root ships as a file; some backends also
//! generate an intermediate root at startup and serve it over HTTPS, which
//! may not be ready immediately after `start()`. The fetch therefore retries
//! on a fixed interval up to a deadline and degrades silently when the
//! window closes: the static root alone carries most scenarios.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, trace, warn};

use crate::error::HarnessError;

/// Overwrite `dest` with the backend's static root certificate.
///
/// Overwriting (rather than appending) keeps repeated installs from
/// accumulating duplicate roots in the same test run.
pub fn install_static_root(src: &Path, dest: &Path) -> Result<(), HarnessError> {
    std::fs::copy(src, dest)?;
    debug!(src = %src.display(), dest = %dest.display(), "Installed static root");
    Ok(())
}

/// Append an additional PEM root to an existing bundle.
pub fn append_root(dest: &Path, pem: &str) -> Result<(), HarnessError> {
    let mut file = std::fs::OpenOptions::new().append(true).open(dest)?;
    file.write_all(pem.as_bytes())?;
    debug!(dest = %dest.display(), bytes = pem.len(), "Appended dynamic root to bundle");
    Ok(())
}

/// HTTP client for the root-bootstrap call.
///
/// Certificate validation is disabled: this call fetches the very root that
/// would be needed to validate the endpoint.
pub fn insecure_client() -> Result<reqwest::Client, HarnessError> {
    Ok(reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()?)
}

/// Poll `url` until it serves the dynamically generated root, retrying every
/// `interval` for up to `timeout`.
///
/// Every transport failure or non-success status within the window counts as
/// "not yet". Returns `None` when the deadline expires; callers treat that
/// as a soft failure.
pub async fn fetch_dynamic_root(
    client: &reqwest::Client,
    url: &str,
    interval: Duration,
    timeout: Duration,
) -> Option<String> {
    let deadline = Instant::now() + timeout;
    loop {
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => {
                    debug!(url = %url, bytes = body.len(), "Fetched dynamic root");
                    return Some(body);
                }
                Err(e) => trace!(url = %url, error = %e, "Root payload unreadable"),
            },
            Ok(resp) => trace!(url = %url, status = %resp.status(), "Root endpoint not ready"),
            Err(e) => trace!(url = %url, error = %e, "Root endpoint unreachable"),
        }

        if Instant::now() + interval > deadline {
            warn!(
                url = %url,
                timeout_secs = timeout.as_secs(),
                "Dynamic root not available before deadline, bundle keeps static root only"
            );
            return None;
        }
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const STATIC_ROOT: &str = "-----BEGIN CERTIFICATE-----\nc3RhdGljLXJvb3Q=\n-----END CERTIFICATE-----\n";
    const DYNAMIC_ROOT: &str = "-----BEGIN CERTIFICATE-----\nZHluYW1pYy1yb290\n-----END CERTIFICATE-----\n";

    fn write_static_root(dir: &TempDir) -> std::path::PathBuf {
        let src = dir.path().join("root.pem");
        std::fs::write(&src, STATIC_ROOT).unwrap();
        src
    }

    #[test]
    fn test_install_overwrites_previous_bundle() {
        let temp_dir = TempDir::new().unwrap();
        let src = write_static_root(&temp_dir);
        let dest = temp_dir.path().join("bundle.pem");

        install_static_root(&src, &dest).unwrap();
        append_root(&dest, DYNAMIC_ROOT).unwrap();
        // A second install starts from a fresh file: no duplicate roots
        install_static_root(&src, &dest).unwrap();

        let bundle = std::fs::read_to_string(&dest).unwrap();
        assert_eq!(bundle, STATIC_ROOT);
    }

    #[test]
    fn test_bundle_is_valid_pem() {
        let temp_dir = TempDir::new().unwrap();
        let src = write_static_root(&temp_dir);
        let dest = temp_dir.path().join("bundle.pem");

        install_static_root(&src, &dest).unwrap();
        append_root(&dest, DYNAMIC_ROOT).unwrap();

        let bundle = std::fs::read(&dest).unwrap();
        let certs: Vec<_> = rustls_pemfile::certs(&mut bundle.as_slice())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(certs.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_returns_payload_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/roots/0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DYNAMIC_ROOT))
            .mount(&server)
            .await;

        let client = insecure_client().unwrap();
        let root = fetch_dynamic_root(
            &client,
            &format!("{}/roots/0", server.uri()),
            Duration::from_millis(50),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(root.as_deref(), Some(DYNAMIC_ROOT));
    }

    #[tokio::test]
    async fn test_fetch_retries_until_endpoint_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/roots/0"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/roots/0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DYNAMIC_ROOT))
            .mount(&server)
            .await;

        let client = insecure_client().unwrap();
        let root = fetch_dynamic_root(
            &client,
            &format!("{}/roots/0", server.uri()),
            Duration::from_millis(20),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(root.as_deref(), Some(DYNAMIC_ROOT));
    }

    #[tokio::test]
    async fn test_fetch_gives_up_at_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/roots/0"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = insecure_client().unwrap();
        let root = fetch_dynamic_root(
            &client,
            &format!("{}/roots/0", server.uri()),
            Duration::from_millis(20),
            Duration::from_millis(100),
        )
        .await;

        assert!(root.is_none());
    }
}
