//! Per-domain status snapshots from the host process.
//!
//! The host process exposes a JSON status document per managed domain. The
//! harness only observes: the host is the sole mutator of this state. Each
//! snapshot is decoded into [`DomainStatus`] and evaluated with the pure
//! predicates below; no state is carried between snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

/// Classified failure of the most recent renewal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalProblem {
    /// Configured challenge types cannot satisfy the domain set
    /// (e.g. wildcard names without dns-01)
    ChallengeMismatch,
    /// A challenge setup command failed to run
    ChallengeSetupFailure,
    /// Any classification this harness does not assert on
    Other,
}

impl From<&str> for RenewalProblem {
    fn from(value: &str) -> Self {
        match value {
            "challenge-mismatch" => Self::ChallengeMismatch,
            "challenge-setup-failure" => Self::ChallengeSetupFailure,
            _ => Self::Other,
        }
    }
}

impl<'de> Deserialize<'de> for RenewalProblem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from(value.as_str()))
    }
}

/// Outcome record of the last renewal attempt.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LastOutcome {
    #[serde(default)]
    pub problem: Option<RenewalProblem>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Renewal sub-record of a domain status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenewalStatus {
    /// Consecutive renewal errors
    #[serde(default)]
    pub errors: u64,
    /// Last attempt outcome, absent while no attempt was made
    #[serde(default)]
    pub last: Option<LastOutcome>,
    /// Key type / algorithm descriptors, present once a renewal succeeded
    #[serde(default)]
    pub cert: Option<BTreeMap<String, serde_json::Value>>,
}

/// One managed domain's status as reported by the host process.
///
/// Read-only from the harness's perspective.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainStatus {
    #[serde(default)]
    pub name: Option<String>,
    /// Current certificate descriptor; opaque to the harness, only
    /// presence matters
    #[serde(default)]
    pub cert: Option<serde_json::Value>,
    /// Whether renewal is enabled for this domain
    #[serde(default)]
    pub renew: Option<bool>,
    #[serde(default)]
    pub renewal: Option<RenewalStatus>,
}

impl DomainStatus {
    /// Issuance has converged: a certificate is present and no renewal
    /// error is pending.
    pub fn is_complete(&self) -> bool {
        self.cert.is_some() && self.renewal.as_ref().is_none_or(|r| r.errors == 0)
    }

    /// Renewal has failed with a classified problem.
    pub fn has_renewal_error(&self) -> bool {
        self.renewal
            .as_ref()
            .is_some_and(|r| r.errors > 0 && r.last.as_ref().is_some_and(|l| l.problem.is_some()))
    }

    /// A successful renewal has been observed: the renewal sub-record
    /// carries key/algorithm descriptors of the freshly issued certificate.
    pub fn has_renewed_cert(&self) -> bool {
        self.renewal
            .as_ref()
            .and_then(|r| r.cert.as_ref())
            .is_some_and(|c| !c.is_empty())
    }

    /// Problem classification of the last renewal attempt, if any.
    pub fn problem(&self) -> Option<RenewalProblem> {
        self.renewal.as_ref()?.last.as_ref()?.problem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_status() {
        let status: DomainStatus = serde_json::from_str(
            r#"{"name": "example.org", "cert": {"valid-until": "2026-11-01"}, "renew": true}"#,
        )
        .unwrap();

        assert!(status.is_complete());
        assert!(!status.has_renewal_error());
        assert!(status.renew.unwrap());
        assert!(status.renewal.is_none());
    }

    #[test]
    fn test_challenge_mismatch_status() {
        let status: DomainStatus = serde_json::from_str(
            r#"{
                "name": "example.org",
                "renewal": {
                    "errors": 2,
                    "last": {"problem": "challenge-mismatch", "detail": "no challenge type"}
                }
            }"#,
        )
        .unwrap();

        assert!(status.has_renewal_error());
        assert!(!status.is_complete());
        assert_eq!(status.problem(), Some(RenewalProblem::ChallengeMismatch));
    }

    #[test]
    fn test_challenge_setup_failure_status() {
        let status: DomainStatus = serde_json::from_str(
            r#"{"renewal": {"errors": 1, "last": {"problem": "challenge-setup-failure"}}}"#,
        )
        .unwrap();

        assert_eq!(status.problem(), Some(RenewalProblem::ChallengeSetupFailure));
    }

    #[test]
    fn test_unknown_problem_decodes_as_other() {
        let status: DomainStatus = serde_json::from_str(
            r#"{"renewal": {"errors": 1, "last": {"problem": "account-invalid"}}}"#,
        )
        .unwrap();

        assert_eq!(status.problem(), Some(RenewalProblem::Other));
        assert!(status.has_renewal_error());
    }

    #[test]
    fn test_errors_without_problem_is_not_matched() {
        // An error counter without a classified problem is still in flight
        let status: DomainStatus =
            serde_json::from_str(r#"{"renewal": {"errors": 1}}"#).unwrap();

        assert!(!status.has_renewal_error());
    }

    #[test]
    fn test_pending_renewal_error_blocks_completion() {
        let status: DomainStatus = serde_json::from_str(
            r#"{"cert": {}, "renewal": {"errors": 3, "last": {"problem": "challenge-mismatch"}}}"#,
        )
        .unwrap();

        assert!(!status.is_complete());
    }

    #[test]
    fn test_renewed_cert_descriptors() {
        let status: DomainStatus = serde_json::from_str(
            r#"{
                "cert": {},
                "renewal": {
                    "errors": 0,
                    "cert": {"rsa": {"sha256-fingerprint": "ab"}, "secp384r1": {}}
                }
            }"#,
        )
        .unwrap();

        assert!(status.has_renewed_cert());
        let descriptors = status.renewal.unwrap().cert.unwrap();
        assert!(descriptors.contains_key("rsa"));
        assert!(descriptors.contains_key("secp384r1"));
    }

    #[test]
    fn test_empty_payload_is_incomplete() {
        let status: DomainStatus = serde_json::from_str("{}").unwrap();

        assert!(!status.is_complete());
        assert!(!status.has_renewal_error());
        assert!(!status.has_renewed_cert());
    }
}
