//! Error types for the harness.
//!
//! Setup and command failures propagate as errors at the call site; polling
//! timeouts are returned values (see [`crate::poll::PollOutcome`]) and never
//! appear here.

use thiserror::Error;

/// Errors that can occur while driving a scenario.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A supervised child process could not be launched
    #[error("failed to spawn {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request could not be issued or completed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Host status payload did not decode
    #[error("invalid status payload: {0}")]
    Status(#[from] serde_json::Error),

    /// External trust-anchor command exited non-zero
    #[error("CA bundle command exited with {code}: {stderr}")]
    CaBundleCommand { code: i32, stderr: String },

    /// Certificate file missing or unparseable
    #[error("failed to inspect certificate: {0}")]
    CertParse(String),

    /// Host restart exited non-zero where success was required
    #[error("host restart exited with {0}")]
    RestartFailed(i32),

    /// Harness configuration error
    #[error("configuration error: {0}")]
    Config(String),
}
