//! certdrive harness
//!
//! Test harness verifying the certificate-lifecycle behavior of an
//! externally managed domain-certificate host process. The harness never
//! issues certificates itself: it supervises local ACME test servers,
//! drives configuration changes in the host, and polls the host's status
//! interface for convergence to expected terminal states.
//!
//! # Architecture
//!
//! - [`supervisor`] - child process launching with shared log sinks and
//!   fire-and-forget exit monitors
//! - [`acme`] - the [`AcmeServer`] capability set with a locally spawned
//!   pebble pair and an externally managed boulder variant, plus
//!   trust-anchor installation
//! - [`status`] / [`poll`] - the per-domain status model and the
//!   deadline-bounded [`StatusPoller`]
//! - [`certs`] - serial/SAN inspection of issued certificates
//! - [`conf`] / [`driver`] - host configuration generation and the
//!   [`ScenarioDriver`] sequencing install, restart, poll, assert
//! - [`config`] - the harness environment description tying it together
//!
//! # Example
//!
//! ```ignore
//! use certdrive_harness::{AcmeServer, Expectation, HarnessConfig, PebbleRunner, ScenarioDriver};
//!
//! let config = HarnessConfig::default();
//! let mut acme = PebbleRunner::new(config.pebble());
//! acme.start().await?;
//! acme.install_ca_bundle(&config.gen_dir.join("ca-bundle.pem")).await?;
//!
//! let driver = ScenarioDriver::new(config.host_control(), config.poller()?);
//! let outcome = driver.run(&conf_text, &Expectation::Completion { domains }).await?;
//! acme.stop().await?;
//! ```

pub mod acme;
pub mod certs;
pub mod conf;
pub mod config;
pub mod driver;
pub mod error;
pub mod poll;
pub mod status;
pub mod supervisor;

pub use acme::{AcmeServer, BoulderConfig, BoulderRunner, PebbleConfig, PebbleRunner};
pub use certs::CertificateDescriptor;
pub use conf::HostConfBuilder;
pub use config::HarnessConfig;
pub use driver::{CommandHostControl, Expectation, HostControl, ScenarioDriver, ScenarioOutcome};
pub use error::HarnessError;
pub use poll::{PollOutcome, StatusPoller, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
pub use status::{DomainStatus, RenewalProblem};
pub use supervisor::{LogSink, ProcessHandle, ProcessSpec};

/// Initialize tracing output for harness runs.
///
/// Honors `RUST_LOG` when set, falling back to the given level. Safe to
/// call from multiple tests; later calls are no-ops.
pub fn init_logging(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
