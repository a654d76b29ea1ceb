//! Role definitions.
//!
//! A role maps a local name to an upstream service account plus lease-duration
//! policy. Roles are persisted by the host through a
//! [`RoleStore`](crate::store::RoleStore) and re-read on every issuance and
//! renewal, so policy changes apply to already-issued credentials.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A named mapping from a local identifier to an upstream service account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Unique role name.
    pub name: String,
    /// Upstream service account the issued keys are bound to.
    pub service_account_id: String,
    /// Initial lease duration. Zero means "use the host's default".
    #[serde(default, with = "humantime_serde")]
    pub ttl: Duration,
    /// Absolute upper bound across renewals. Zero means "use the host's default".
    #[serde(default, with = "humantime_serde")]
    pub max_ttl: Duration,
}

impl RoleDefinition {
    /// Check role invariants: a non-blank service account reference and
    /// `ttl <= max_ttl` when both are nonzero.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidRole("role name must not be blank".to_string()));
        }
        if self.service_account_id.trim().is_empty() {
            return Err(Error::InvalidRole(format!(
                "role {:?} has no service account",
                self.name
            )));
        }
        if !self.ttl.is_zero() && !self.max_ttl.is_zero() && self.ttl > self.max_ttl {
            return Err(Error::InvalidRole(format!(
                "role {:?}: ttl exceeds max_ttl",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(ttl: u64, max_ttl: u64) -> RoleDefinition {
        RoleDefinition {
            name: "svc-a".to_string(),
            service_account_id: "sa-123".to_string(),
            ttl: Duration::from_secs(ttl),
            max_ttl: Duration::from_secs(max_ttl),
        }
    }

    #[test]
    fn accepts_ttl_within_max_ttl() {
        assert!(role(3600, 86400).validate().is_ok());
    }

    #[test]
    fn accepts_zero_ttls_as_host_default() {
        assert!(role(0, 0).validate().is_ok());
        // Only one bound set is also fine
        assert!(role(3600, 0).validate().is_ok());
        assert!(role(0, 86400).validate().is_ok());
    }

    #[test]
    fn rejects_ttl_above_max_ttl() {
        let err = role(86400, 3600).validate().expect_err("must reject");
        assert!(matches!(err, Error::InvalidRole(_)));
    }

    #[test]
    fn rejects_blank_service_account() {
        let mut r = role(0, 0);
        r.service_account_id = String::new();
        assert!(matches!(r.validate(), Err(Error::InvalidRole(_))));
    }

    #[test]
    fn durations_round_trip_as_humantime() {
        let r = role(3600, 86400);
        let json = serde_json::to_string(&r).unwrap();
        let back: RoleDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
