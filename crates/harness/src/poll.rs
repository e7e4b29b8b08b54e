//! Deadline-bounded status polling.
//!
//! Certificate issuance and renewal happen on the host process's own
//! schedule; scenarios assert synchronously. [`StatusPoller`] bridges the
//! two: it queries per-domain status on a fixed short interval (renewal is
//! driven by a coarse background scheduler, so aggressive polling is cheap
//! and backoff buys nothing) until a predicate over the latest snapshot
//! holds or the deadline expires.
//!
//! Every operation funnels through one primitive so completion, error, and
//! renewal waits share identical timeout and retry semantics. A failed
//! query - connection refused mid-restart, a non-success status, an
//! undecodable body - counts as "not yet", never as a terminal error.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace};

use crate::error::HarnessError;
use crate::status::DomainStatus;

/// Default interval between status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default per-operation deadline. Callers choose per scenario; this suits
/// a responder with validation delays disabled.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Terminal result of a polling operation.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// Every observed domain converged to certificate-present with no
    /// pending renewal error
    Completed(DomainStatus),
    /// The domain reported a classified renewal error
    ErrorMatched(DomainStatus),
    /// The deadline expired without the expected condition
    TimedOut,
}

impl PollOutcome {
    /// Matched status snapshot, if the operation converged.
    pub fn status(&self) -> Option<&DomainStatus> {
        match self {
            Self::Completed(status) | Self::ErrorMatched(status) => Some(status),
            Self::TimedOut => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

/// Polls the host process's per-domain status interface.
#[derive(Debug)]
pub struct StatusPoller {
    client: reqwest::Client,
    base_url: String,
    interval: Duration,
}

impl StatusPoller {
    /// Create a poller against the status base URL
    /// (e.g. `http://localhost:8088/md-status`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, HarnessError> {
        let base_url = base_url.into();
        debug!(base_url = %base_url, "Creating status poller");
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url,
            interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Set the interval between queries.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Fetch one status snapshot. `None` means "not yet".
    async fn fetch(&self, domain: &str) -> Option<DomainStatus> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), domain);
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<DomainStatus>().await {
                Ok(status) => Some(status),
                Err(e) => {
                    trace!(domain = %domain, error = %e, "Status payload not decodable yet");
                    None
                }
            },
            Ok(resp) => {
                trace!(domain = %domain, status = %resp.status(), "Status not served yet");
                None
            }
            Err(e) => {
                // Tolerated: the host may be mid-restart
                trace!(domain = %domain, error = %e, "Status query failed");
                None
            }
        }
    }

    /// One-shot status accessor for callers asserting on a snapshot directly.
    pub async fn status(&self, domain: &str) -> Option<DomainStatus> {
        self.fetch(domain).await
    }

    /// Poll one domain until `pred` holds over a fresh snapshot or `timeout`
    /// expires. The predicate is pure over the latest snapshot; the only
    /// carried state is the deadline.
    async fn poll_domain<P>(&self, domain: &str, timeout: Duration, pred: P) -> Option<DomainStatus>
    where
        P: Fn(&DomainStatus) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.fetch(domain).await {
                if pred(&status) {
                    return Some(status);
                }
            }
            if Instant::now() + self.interval > deadline {
                debug!(
                    domain = %domain,
                    timeout_secs = timeout.as_secs(),
                    "Poll deadline expired"
                );
                return None;
            }
            sleep(self.interval).await;
        }
    }

    /// Wait until every domain reports a certificate with no pending
    /// renewal error. All domains share one deadline; the result does not
    /// depend on query order.
    pub async fn await_completion(&self, domains: &[String], timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        for domain in domains {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if self
                .poll_domain(domain, remaining, DomainStatus::is_complete)
                .await
                .is_none()
            {
                info!(domain = %domain, "Completion not reached before deadline");
                return false;
            }
        }
        true
    }

    /// Wait until the domain reports a renewal error with a classified
    /// problem. Deadline expiry yields [`PollOutcome::TimedOut`], never an
    /// error.
    pub async fn await_error(&self, domain: &str, timeout: Duration) -> PollOutcome {
        match self
            .poll_domain(domain, timeout, DomainStatus::has_renewal_error)
            .await
        {
            Some(status) => {
                info!(domain = %domain, problem = ?status.problem(), "Renewal error observed");
                PollOutcome::ErrorMatched(status)
            }
            None => PollOutcome::TimedOut,
        }
    }

    /// Wait until a new successful renewal is observed for every domain,
    /// detected via the key/algorithm descriptors the host publishes under
    /// `renewal.cert`.
    pub async fn await_renewal(&self, domains: &[String], timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        for domain in domains {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if self
                .poll_domain(domain, remaining, DomainStatus::has_renewed_cert)
                .await
                .is_none()
            {
                info!(domain = %domain, "Renewal not observed before deadline");
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_poller(server: &MockServer) -> StatusPoller {
        StatusPoller::new(format!("{}/md-status", server.uri()))
            .unwrap()
            .with_interval(Duration::from_millis(20))
    }

    async fn mount_status(server: &MockServer, domain: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/md-status/{domain}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_await_error_matches_renewal_failure() {
        let server = MockServer::start().await;
        mount_status(
            &server,
            "bad.org",
            json!({"renewal": {"errors": 2, "last": {"problem": "challenge-mismatch"}}}),
        )
        .await;

        let poller = fast_poller(&server);
        let outcome = poller.await_error("bad.org", Duration::from_secs(2)).await;

        let status = outcome.status().expect("error should match");
        assert_eq!(
            status.problem(),
            Some(crate::status::RenewalProblem::ChallengeMismatch)
        );
    }

    #[tokio::test]
    async fn test_await_error_times_out_without_errors() {
        let server = MockServer::start().await;
        mount_status(&server, "good.org", json!({"cert": {}, "renewal": {"errors": 0}})).await;

        let poller = fast_poller(&server);
        let outcome = poller
            .await_error("good.org", Duration::from_millis(150))
            .await;

        assert!(outcome.is_timed_out());
    }

    #[tokio::test]
    async fn test_await_completion_all_domains() {
        let server = MockServer::start().await;
        mount_status(&server, "a.org", json!({"cert": {}})).await;
        mount_status(&server, "b.org", json!({"cert": {}, "renewal": {"errors": 0}})).await;

        let poller = fast_poller(&server);
        let done = poller
            .await_completion(
                &["a.org".to_string(), "b.org".to_string()],
                Duration::from_secs(2),
            )
            .await;

        assert!(done);
    }

    #[tokio::test]
    async fn test_await_completion_false_when_any_domain_lags() {
        let server = MockServer::start().await;
        mount_status(&server, "a.org", json!({"cert": {}})).await;
        mount_status(&server, "b.org", json!({})).await;

        let poller = fast_poller(&server);

        // The incomplete domain fails the wait regardless of its position
        for domains in [
            ["a.org".to_string(), "b.org".to_string()],
            ["b.org".to_string(), "a.org".to_string()],
        ] {
            let done = poller
                .await_completion(&domains, Duration::from_millis(200))
                .await;
            assert!(!done);
        }
    }

    #[tokio::test]
    async fn test_await_completion_survives_host_restart() {
        let server = MockServer::start().await;
        // Two failing responses first, as seen while the host restarts
        Mock::given(method("GET"))
            .and(path("/md-status/restart.org"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        mount_status(&server, "restart.org", json!({"cert": {}})).await;

        let poller = fast_poller(&server);
        let done = poller
            .await_completion(&["restart.org".to_string()], Duration::from_secs(2))
            .await;

        assert!(done);
    }

    #[tokio::test]
    async fn test_await_completion_converges_once_cert_appears() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/md-status/slow.org"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        mount_status(&server, "slow.org", json!({"cert": {}})).await;

        let poller = fast_poller(&server);
        let done = poller
            .await_completion(&["slow.org".to_string()], Duration::from_secs(2))
            .await;

        assert!(done);
    }

    #[tokio::test]
    async fn test_await_renewal_waits_for_new_descriptors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/md-status/renew.org"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"cert": {}, "renew": true})),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        mount_status(
            &server,
            "renew.org",
            json!({
                "cert": {},
                "renew": true,
                "renewal": {"errors": 0, "cert": {"rsa": {}, "secp384r1": {}}}
            }),
        )
        .await;

        let poller = fast_poller(&server);
        let renewed = poller
            .await_renewal(&["renew.org".to_string()], Duration::from_secs(2))
            .await;

        assert!(renewed);
    }

    #[tokio::test]
    async fn test_await_renewal_times_out_without_renewal() {
        let server = MockServer::start().await;
        mount_status(&server, "static.org", json!({"cert": {}, "renew": true})).await;

        let poller = fast_poller(&server);
        let renewed = poller
            .await_renewal(&["static.org".to_string()], Duration::from_millis(150))
            .await;

        assert!(!renewed);
    }

    #[tokio::test]
    async fn test_unreachable_host_times_out_cleanly() {
        // Port 9 (discard) refuses connections
        let poller = StatusPoller::new("http://127.0.0.1:9/md-status")
            .unwrap()
            .with_interval(Duration::from_millis(20));

        let outcome = poller
            .await_error("gone.org", Duration::from_millis(120))
            .await;
        assert!(outcome.is_timed_out());
    }
}
