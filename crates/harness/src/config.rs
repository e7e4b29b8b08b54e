//! Harness configuration.
//!
//! Everything the harness needs to know about its environment lives in one
//! flat document: where the ACME responder binaries are, where the host
//! process listens, and how patient the pollers should be. All knobs are
//! explicit fields; nothing is read from ambient process state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::acme::{BoulderConfig, PebbleConfig};
use crate::driver::CommandHostControl;
use crate::error::HarnessError;
use crate::poll::StatusPoller;

/// Harness environment description, loadable from a JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Working directory of the local ACME responder pair
    pub acme_server_dir: PathBuf,
    /// Scratch directory for logs and generated files
    pub gen_dir: PathBuf,
    /// pebble binary
    pub pebble_bin: String,
    /// pebble-challtestsrv binary
    pub challtestsrv_bin: String,
    /// pebble configuration file, relative to `acme_server_dir`
    pub pebble_config: String,
    /// DNS bind address handed to pebble
    pub dns_address: String,
    /// Endpoint serving the dynamically generated root
    pub root_url: String,
    /// Container name of an externally managed boulder
    pub boulder_container: String,
    /// Host status interface base URL
    pub status_url: String,
    /// Command that restarts/reloads the host process
    pub restart_command: Vec<String>,
    /// Configuration file consumed by the host process
    pub host_config_path: PathBuf,
    /// Host certificate store directory
    pub store_dir: PathBuf,
    /// Interval between status queries, milliseconds
    pub poll_interval_ms: u64,
    /// Default per-scenario deadline, seconds
    pub default_timeout_secs: u64,
    /// Disable the responder's artificial validation delays
    pub va_nosleep: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            acme_server_dir: PathBuf::from("acme-server"),
            gen_dir: PathBuf::from("gen"),
            pebble_bin: "pebble".to_string(),
            challtestsrv_bin: "pebble-challtestsrv".to_string(),
            pebble_config: "./test/config/pebble-config.json".to_string(),
            dns_address: ":8053".to_string(),
            root_url: "https://localhost:15000/roots/0".to_string(),
            boulder_container: "boulder_boulder_1".to_string(),
            status_url: "http://localhost:8088/md-status".to_string(),
            restart_command: vec!["hostctl".to_string(), "restart".to_string()],
            host_config_path: PathBuf::from("gen/host.conf"),
            store_dir: PathBuf::from("gen/store"),
            poll_interval_ms: 1_000,
            default_timeout_secs: 60,
            va_nosleep: true,
        }
    }
}

impl HarnessConfig {
    /// Load a configuration document from a JSON file. Absent fields fall
    /// back to the defaults.
    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Derive the local responder configuration.
    pub fn pebble(&self) -> PebbleConfig {
        let mut config = PebbleConfig::new(&self.acme_server_dir, &self.gen_dir);
        config.pebble_bin = self.pebble_bin.clone();
        config.challtestsrv_bin = self.challtestsrv_bin.clone();
        config.config_path = self.pebble_config.clone();
        config.dns_address = self.dns_address.clone();
        config.root_url = self.root_url.clone();
        config.va_nosleep = self.va_nosleep;
        config
    }

    /// Derive the external responder configuration.
    pub fn boulder(&self) -> BoulderConfig {
        BoulderConfig::for_container(&self.boulder_container)
    }

    /// Build a poller against the host status interface.
    pub fn poller(&self) -> Result<StatusPoller, HarnessError> {
        Ok(StatusPoller::new(self.status_url.clone())?.with_interval(self.poll_interval()))
    }

    /// Build the command-driven host control.
    pub fn host_control(&self) -> CommandHostControl {
        CommandHostControl::new(
            self.host_config_path.clone(),
            self.restart_command.clone(),
            self.store_dir.clone(),
        )
    }
}
