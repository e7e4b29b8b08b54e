//! ACME test-server lifecycle management.
//!
//! Scenarios need a local ACME responder the host process can order
//! certificates from. Two backends implement the same capability set:
//!
//! - [`PebbleRunner`] - spawns and supervises a pebble server plus its
//!   challenge-response companion
//! - [`BoulderRunner`] - a responder running in a pre-existing containerized
//!   environment whose lifecycle is managed outside the harness
//!
//! The rest of the harness is agnostic to which backend is active: it only
//! sees the [`AcmeServer`] contract. The backends differ in lifecycle
//! ownership and in how the trust anchor is obtained (eventual-consistency
//! polling of an HTTPS endpoint vs. one synchronous command execution).

mod boulder;
mod pebble;
pub mod trust;

pub use boulder::{BoulderConfig, BoulderRunner};
pub use pebble::{PebbleConfig, PebbleRunner};

use std::path::Path;

use async_trait::async_trait;

use crate::error::HarnessError;

/// Capability set every ACME test backend provides.
#[async_trait]
pub trait AcmeServer: Send + Sync {
    /// Bring the responder up. Does not wait for readiness; callers rely on
    /// the bounded retry in [`install_ca_bundle`](AcmeServer::install_ca_bundle)
    /// and on the host process's own challenge retries.
    async fn start(&mut self) -> Result<(), HarnessError>;

    /// Tear the responder down. Idempotent and safe without a prior `start`.
    async fn stop(&mut self) -> Result<(), HarnessError>;

    /// Write the backend's trust anchors to `dest` as concatenated PEM.
    async fn install_ca_bundle(&self, dest: &Path) -> Result<(), HarnessError>;
}
