//! Externally managed boulder responder.
//!
//! The responder runs inside a pre-existing containerized environment;
//! lifecycle operations are no-ops. Only the trust anchor retrieval touches
//! it: one command executed in the container, with its captured output
//! written verbatim as the bundle.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::AcmeServer;
use crate::error::HarnessError;

/// Configuration of the external responder.
#[derive(Debug, Clone)]
pub struct BoulderConfig {
    /// Command whose stdout becomes the CA bundle
    pub bundle_command: Vec<String>,
}

impl BoulderConfig {
    /// Bundle command for a boulder container with the stock layout.
    pub fn for_container(container: &str) -> Self {
        Self {
            bundle_command: vec![
                "docker".to_string(),
                "exec".to_string(),
                container.to_string(),
                "bash".to_string(),
                "-c".to_string(),
                "cat /tmp/root*.pem".to_string(),
            ],
        }
    }
}

/// ACME responder whose lifecycle is managed outside the harness.
#[derive(Debug)]
pub struct BoulderRunner {
    config: BoulderConfig,
}

impl BoulderRunner {
    pub fn new(config: BoulderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AcmeServer for BoulderRunner {
    async fn start(&mut self) -> Result<(), HarnessError> {
        // Lifecycle is managed outside the harness
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), HarnessError> {
        Ok(())
    }

    async fn install_ca_bundle(&self, dest: &Path) -> Result<(), HarnessError> {
        let (program, args) = self
            .config
            .bundle_command
            .split_first()
            .ok_or_else(|| HarnessError::Config("empty CA bundle command".to_string()))?;

        debug!(program = %program, "Retrieving CA bundle from external responder");
        let output = Command::new(program).args(args).output().await?;

        if !output.status.success() {
            return Err(HarnessError::CaBundleCommand {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        tokio::fs::write(dest, &output.stdout).await?;
        info!(
            dest = %dest.display(),
            bytes = output.stdout.len(),
            "Installed CA bundle from external responder"
        );
        Ok(())
    }
}
