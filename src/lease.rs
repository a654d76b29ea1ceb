//! Lease lifecycle — bridges issuance results to the host's lease contract
//! and implements renew/revoke against opaque lease metadata.
//!
//! The only state that survives between issuance and a later revoke or renew
//! is [`LeaseMetadata`]: the key id and the role name, carried inside the
//! lease record the host persists. It is deliberately minimal and validated
//! on every read, so a metadata bug surfaces as
//! [`Error::MissingLeaseMetadata`] instead of a silent no-op revoke.

use std::time::Duration;

use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::issuer::IssuedCredential;
use crate::role::RoleDefinition;
use crate::store::RoleStore;
use crate::upstream::UpstreamClient;
use crate::{Error, Result};

/// Internal lease metadata: the minimum needed to revoke a key and
/// re-resolve its role for renewal policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseMetadata {
    /// Upstream id of the issued key.
    pub api_key_id: String,
    /// Name of the role the key was issued under.
    pub role_name: String,
}

impl LeaseMetadata {
    /// Serialize into the JSON bag the host persists with the lease.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "api_key_id": self.api_key_id,
            "role": self.role_name,
        })
    }

    /// Parse and validate metadata from the host's opaque JSON.
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(Self {
            api_key_id: require_str(value, "api_key_id")?.to_string(),
            role_name: require_str(value, "role")?.to_string(),
        })
    }
}

fn require_str<'a>(value: &'a Value, field: &'static str) -> Result<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(Error::MissingLeaseMetadata(field))
}

/// What issuance hands back to the host: caller-visible data, internal
/// metadata for the lease record, and the lease durations.
#[derive(Debug, Clone)]
pub struct SecretResponse {
    /// Fields the credential consumer needs.
    pub data: Map<String, Value>,
    /// Opaque metadata the host must persist and return on revoke/renew.
    pub internal: Value,
    /// Initial lease duration; `None` means "use the host's default".
    pub ttl: Option<Duration>,
    /// Upper bound across renewals; `None` means "use the host's default".
    pub max_ttl: Option<Duration>,
}

/// Refreshed lease durations returned by a renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseRenewal {
    /// Current role TTL; `None` means "use the host's default".
    pub ttl: Option<Duration>,
    /// Current role MaxTTL; `None` means "use the host's default".
    pub max_ttl: Option<Duration>,
}

/// Whether a revoke tolerates the upstream reporting the key as already
/// gone. An explicit policy choice, never an accident of the upstream
/// error shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevokeNotFoundPolicy {
    /// Surface the upstream not-found error (default). Masking it could
    /// hide a double-revoke bug.
    #[default]
    Error,
    /// Treat an already-deleted key as successfully revoked.
    TreatAsRevoked,
}

/// Packages issuance results and implements revoke/renew.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeaseLifecycle {
    not_found_policy: RevokeNotFoundPolicy,
}

impl LeaseLifecycle {
    /// Lifecycle with the default (strict) revoke policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifecycle with an explicit revoke not-found policy.
    #[must_use]
    pub fn with_policy(not_found_policy: RevokeNotFoundPolicy) -> Self {
        Self { not_found_policy }
    }

    /// Wrap an issued credential into a lease-bearing secret response.
    ///
    /// TTLs come from the role when nonzero; zero maps to `None`, telling
    /// the host to apply its own defaults.
    #[must_use]
    pub fn package_issuance(
        &self,
        issued: IssuedCredential,
        role: &RoleDefinition,
    ) -> SecretResponse {
        let metadata = LeaseMetadata {
            api_key_id: issued.api_key_id.clone(),
            role_name: role.name.clone(),
        };

        let mut data = Map::new();
        data.insert("api_key_id".to_string(), Value::from(issued.api_key_id));
        data.insert(
            "api_key_secret".to_string(),
            Value::from(issued.api_key_secret),
        );
        data.insert("bound_url".to_string(), Value::from(issued.bound_url));

        SecretResponse {
            data,
            internal: metadata.to_value(),
            ttl: nonzero(role.ttl),
            max_ttl: nonzero(role.max_ttl),
        }
    }

    /// Revoke the credential identified by the lease metadata.
    ///
    /// Validates the metadata before any upstream call; revocation is
    /// at-most-once on success.
    pub async fn revoke(&self, client: &UpstreamClient, metadata: &Value) -> Result<()> {
        let api_key_id = require_str(metadata, "api_key_id")?;

        match client.api_keys.delete_api_key(api_key_id).await {
            Ok(()) => {
                info!(api_key_id, "revoked upstream api key");
                Ok(())
            }
            Err(Error::UpstreamNotFound(what))
                if self.not_found_policy == RevokeNotFoundPolicy::TreatAsRevoked =>
            {
                warn!(api_key_id, %what, "key already deleted upstream; treating as revoked");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Refresh the lease durations from the role's *current* policy.
    ///
    /// A role deleted since issuance rejects the renewal rather than
    /// silently granting indefinite life.
    pub async fn renew(&self, metadata: &Value, roles: &dyn RoleStore) -> Result<LeaseRenewal> {
        let role_name = require_str(metadata, "role")?;

        let role = roles
            .get(role_name)
            .await?
            .ok_or_else(|| Error::RoleNotFound(role_name.to_string()))?;

        info!(role = %role.name, "renewed lease from live role policy");
        Ok(LeaseRenewal {
            ttl: nonzero(role.ttl),
            max_ttl: nonzero(role.max_ttl),
        })
    }
}

fn nonzero(d: Duration) -> Option<Duration> {
    if d.is_zero() { None } else { Some(d) }
}
