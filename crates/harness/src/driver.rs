//! Scenario sequencing.
//!
//! A scenario is always the same dance: install a configuration, restart
//! the host process, poll for the expected terminal condition, and - on a
//! positive outcome - inspect the issued certificate. [`ScenarioDriver`]
//! owns that sequence; the host process itself stays behind the
//! [`HostControl`] seam so tests can swap in a fake.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::certs::CertificateDescriptor;
use crate::error::HarnessError;
use crate::poll::{PollOutcome, StatusPoller, DEFAULT_POLL_TIMEOUT};
use crate::status::{DomainStatus, RenewalProblem};

/// Restart/reload and configuration surface of the host process.
#[async_trait]
pub trait HostControl: Send + Sync {
    /// Install a configuration document.
    async fn install_config(&self, text: &str) -> Result<(), HarnessError>;

    /// Restart or reload the host; returns the command's exit code.
    async fn restart(&self) -> Result<i32, HarnessError>;

    /// Wipe the host's certificate store between scenarios.
    async fn clear_store(&self) -> Result<(), HarnessError>;

    /// On-disk certificate location for a domain, if the host stores one.
    fn certificate_path(&self, domain: &str) -> Option<PathBuf>;
}

/// Host control over a config file, a restart command, and a store
/// directory laid out as `store/domains/<domain>/pubcert.pem`.
#[derive(Debug, Clone)]
pub struct CommandHostControl {
    config_path: PathBuf,
    restart_command: Vec<String>,
    store_dir: PathBuf,
}

impl CommandHostControl {
    pub fn new(
        config_path: impl Into<PathBuf>,
        restart_command: Vec<String>,
        store_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            restart_command,
            store_dir: store_dir.into(),
        }
    }
}

#[async_trait]
impl HostControl for CommandHostControl {
    async fn install_config(&self, text: &str) -> Result<(), HarnessError> {
        tokio::fs::write(&self.config_path, text).await?;
        debug!(path = %self.config_path.display(), bytes = text.len(), "Installed host configuration");
        Ok(())
    }

    async fn restart(&self) -> Result<i32, HarnessError> {
        let (program, args) = self
            .restart_command
            .split_first()
            .ok_or_else(|| HarnessError::Config("empty restart command".to_string()))?;

        let output = Command::new(program).args(args).output().await?;
        let code = output.status.code().unwrap_or(-1);
        info!(program = %program, code = code, "Host restart requested");
        Ok(code)
    }

    async fn clear_store(&self) -> Result<(), HarnessError> {
        let domains = self.store_dir.join("domains");
        if domains.exists() {
            tokio::fs::remove_dir_all(&domains).await?;
        }
        tokio::fs::create_dir_all(&domains).await?;
        debug!(store = %self.store_dir.display(), "Cleared certificate store");
        Ok(())
    }

    fn certificate_path(&self, domain: &str) -> Option<PathBuf> {
        let path = self.store_dir.join("domains").join(domain).join("pubcert.pem");
        path.exists().then_some(path)
    }
}

/// Terminal condition a scenario expects.
#[derive(Debug, Clone)]
pub enum Expectation {
    /// Every domain converges to a present certificate; the issued
    /// certificate must cover each configured name exactly once
    Completion { domains: Vec<String> },
    /// The domain runs into a specific classified renewal error
    Error {
        domain: String,
        problem: RenewalProblem,
    },
    /// A new successful renewal is observed for every domain
    Renewal { domains: Vec<String> },
    /// The host rejects the configuration at restart
    RestartFailure,
}

/// Terminal result of one scenario.
#[derive(Debug)]
pub enum ScenarioOutcome {
    /// Issuance converged; carries the final status and the inspected
    /// certificate
    Completed {
        status: DomainStatus,
        certificate: CertificateDescriptor,
    },
    /// The expected renewal error was observed
    ErrorMatched(DomainStatus),
    /// A new renewal was observed
    Renewed(DomainStatus),
    /// The host rejected the configuration with this exit code
    ConfigRejected(i32),
    /// The deadline expired without the expected condition
    TimedOut,
}

impl ScenarioOutcome {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

/// Sequences install -> restart -> poll -> assert for one scenario.
pub struct ScenarioDriver<H: HostControl> {
    host: H,
    poller: StatusPoller,
    timeout: Duration,
}

impl<H: HostControl> ScenarioDriver<H> {
    pub fn new(host: H, poller: StatusPoller) -> Self {
        Self {
            host,
            poller,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Override the per-scenario deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    /// Run one scenario to its terminal state.
    ///
    /// Setup failures (spawn, rejected restart outside
    /// [`Expectation::RestartFailure`], missing certificate after
    /// completion) propagate as errors; deadline expiry is the
    /// [`ScenarioOutcome::TimedOut`] value.
    pub async fn run(
        &self,
        config: &str,
        expectation: &Expectation,
    ) -> Result<ScenarioOutcome, HarnessError> {
        self.host.install_config(config).await?;
        let code = self.host.restart().await?;

        if let Expectation::RestartFailure = expectation {
            return if code == 0 {
                Err(HarnessError::Config(
                    "host accepted a configuration expected to be rejected".to_string(),
                ))
            } else {
                info!(code = code, "Host rejected configuration as expected");
                Ok(ScenarioOutcome::ConfigRejected(code))
            };
        }
        if code != 0 {
            return Err(HarnessError::RestartFailed(code));
        }

        match expectation {
            Expectation::Completion { domains } => {
                if !self.poller.await_completion(domains, self.timeout).await {
                    return Ok(ScenarioOutcome::TimedOut);
                }
                let primary = domains
                    .first()
                    .ok_or_else(|| HarnessError::Config("scenario without domains".to_string()))?;
                let status = self.poller.status(primary).await.ok_or_else(|| {
                    HarnessError::Config(format!("status for {primary} vanished after completion"))
                })?;
                let certificate = self.certificate(primary)?;
                verify_san_coverage(&certificate, domains)?;
                Ok(ScenarioOutcome::Completed {
                    status,
                    certificate,
                })
            }
            Expectation::Error { domain, problem } => {
                match self.poller.await_error(domain, self.timeout).await {
                    PollOutcome::ErrorMatched(status) => {
                        if status.problem() == Some(*problem) {
                            Ok(ScenarioOutcome::ErrorMatched(status))
                        } else {
                            Err(HarnessError::Config(format!(
                                "renewal failed with {:?}, expected {:?}",
                                status.problem(),
                                problem
                            )))
                        }
                    }
                    _ => Ok(ScenarioOutcome::TimedOut),
                }
            }
            Expectation::Renewal { domains } => {
                if !self.poller.await_renewal(domains, self.timeout).await {
                    return Ok(ScenarioOutcome::TimedOut);
                }
                let primary = domains
                    .first()
                    .ok_or_else(|| HarnessError::Config("scenario without domains".to_string()))?;
                let status = self.poller.status(primary).await.ok_or_else(|| {
                    HarnessError::Config(format!("status for {primary} vanished after renewal"))
                })?;
                Ok(ScenarioOutcome::Renewed(status))
            }
            Expectation::RestartFailure => Ok(ScenarioOutcome::ConfigRejected(code)),
        }
    }

    fn certificate(&self, domain: &str) -> Result<CertificateDescriptor, HarnessError> {
        let path = self.host.certificate_path(domain).ok_or_else(|| {
            HarnessError::CertParse(format!("no certificate on disk for {domain}"))
        })?;
        CertificateDescriptor::from_pem_file(&path)
    }
}

/// Every configured name must appear in the SAN list exactly once.
fn verify_san_coverage(
    certificate: &CertificateDescriptor,
    domains: &[String],
) -> Result<(), HarnessError> {
    for domain in domains {
        let hits = certificate.san_count(domain);
        if hits != 1 {
            return Err(HarnessError::CertParse(format!(
                "{domain} appears {hits} times in SAN list {:?}",
                certificate.san_list()
            )));
        }
    }
    Ok(())
}
