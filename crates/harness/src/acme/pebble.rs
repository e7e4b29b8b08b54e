//! Local pebble-backed ACME responder.
//!
//! Supervises a pebble ACME server together with its pebble-challtestsrv
//! companion, which answers HTTP-01/HTTPS-01/TLS-ALPN-01 challenges. Both
//! processes write into one shared log and are watched by independent
//! monitors. Neither start waits for readiness: correctness relies on the
//! bounded retry in the trust-anchor fetch and on the host process's own
//! challenge retries.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{trust, AcmeServer};
use crate::error::HarnessError;
use crate::supervisor::{LogSink, ProcessHandle, ProcessSpec};

/// Configuration of the local pebble pair.
#[derive(Debug, Clone)]
pub struct PebbleConfig {
    /// pebble binary, resolved via PATH when not absolute
    pub pebble_bin: String,
    /// pebble-challtestsrv binary
    pub challtestsrv_bin: String,
    /// pebble configuration file, relative to `server_dir`
    pub config_path: String,
    /// DNS server bind address passed to pebble
    pub dns_address: String,
    /// Working directory for both processes
    pub server_dir: PathBuf,
    /// Shared log file for both processes
    pub log_path: PathBuf,
    /// Static root certificate shipped with pebble
    pub static_root: PathBuf,
    /// Endpoint serving the dynamically generated intermediate root
    pub root_url: String,
    /// Disable pebble's artificial validation delays so scenarios run
    /// fast and deterministically
    pub va_nosleep: bool,
    /// Retry interval for the dynamic root fetch
    pub root_fetch_interval: Duration,
    /// Retry window for the dynamic root fetch
    pub root_fetch_timeout: Duration,
}

impl PebbleConfig {
    /// Defaults for a pebble checkout at `server_dir`, logging under `gen_dir`.
    pub fn new(server_dir: impl Into<PathBuf>, gen_dir: &Path) -> Self {
        let server_dir = server_dir.into();
        Self {
            pebble_bin: "pebble".to_string(),
            challtestsrv_bin: "pebble-challtestsrv".to_string(),
            config_path: "./test/config/pebble-config.json".to_string(),
            dns_address: ":8053".to_string(),
            static_root: server_dir.join("test/certs/pebble.minica.pem"),
            server_dir,
            log_path: gen_dir.join("pebble.log"),
            root_url: "https://localhost:15000/roots/0".to_string(),
            va_nosleep: true,
            root_fetch_interval: Duration::from_secs(1),
            root_fetch_timeout: Duration::from_secs(20),
        }
    }
}

/// Locally spawned ACME responder pair.
#[derive(Debug)]
pub struct PebbleRunner {
    config: PebbleConfig,
    pebble: Option<ProcessHandle>,
    challtestsrv: Option<ProcessHandle>,
    log: Option<LogSink>,
}

impl PebbleRunner {
    pub fn new(config: PebbleConfig) -> Self {
        Self {
            config,
            pebble: None,
            challtestsrv: None,
            log: None,
        }
    }

    pub fn config(&self) -> &PebbleConfig {
        &self.config
    }

    /// Whether both supervised processes are still alive.
    pub fn is_running(&self) -> bool {
        self.pebble.as_ref().is_some_and(ProcessHandle::is_running)
            && self
                .challtestsrv
                .as_ref()
                .is_some_and(ProcessHandle::is_running)
    }
}

#[async_trait]
impl AcmeServer for PebbleRunner {
    async fn start(&mut self) -> Result<(), HarnessError> {
        let log = LogSink::create(&self.config.log_path)?;

        let mut spec = ProcessSpec::new("pebble", self.config.pebble_bin.as_str())
            .args([
                "-config",
                self.config.config_path.as_str(),
                "-dnsserver",
                self.config.dns_address.as_str(),
            ])
            .cwd(&self.config.server_dir);
        if self.config.va_nosleep {
            spec = spec.env("PEBBLE_VA_NOSLEEP", "1");
        }
        self.pebble = Some(ProcessHandle::spawn(&spec, &log)?);

        let spec = ProcessSpec::new("pebble-challtestsrv", self.config.challtestsrv_bin.as_str())
            .args(["-http01", "", "-https01", "", "-tlsalpn01", ""])
            .cwd(&self.config.server_dir);
        self.challtestsrv = Some(ProcessHandle::spawn(&spec, &log)?);

        self.log = Some(log);
        info!(log = %self.config.log_path.display(), "Started pebble ACME responder pair");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), HarnessError> {
        if let Some(pebble) = self.pebble.take() {
            pebble.terminate();
        }
        if let Some(challtestsrv) = self.challtestsrv.take() {
            challtestsrv.terminate();
        }
        if self.log.take().is_some() {
            debug!("Stopped pebble ACME responder pair");
        }
        Ok(())
    }

    async fn install_ca_bundle(&self, dest: &Path) -> Result<(), HarnessError> {
        trust::install_static_root(&self.config.static_root, dest)?;

        let client = trust::insecure_client()?;
        if let Some(root) = trust::fetch_dynamic_root(
            &client,
            &self.config.root_url,
            self.config.root_fetch_interval,
            self.config.root_fetch_timeout,
        )
        .await
        {
            trust::append_root(dest, &root)?;
        }
        Ok(())
    }
}
