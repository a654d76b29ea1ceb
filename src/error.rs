//! Error types for the keymint engine.

use thiserror::Error;

/// Result type alias for the keymint engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Lifecycle stage attached to upstream failures so the host can log and
/// audit which phase of the credential lifecycle broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Constructing the authenticated upstream client.
    BuildClient,
    /// Minting a new credential.
    Issue,
    /// Deleting a previously issued credential.
    Revoke,
    /// Refreshing the lease on a credential. Renewal here only re-reads
    /// role policy; this stage is reserved for hosts whose renewals do
    /// touch the upstream service.
    Renew,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BuildClient => "build-client",
            Self::Issue => "issue",
            Self::Revoke => "revoke",
            Self::Renew => "renew",
        };
        f.write_str(s)
    }
}

/// Keymint engine errors.
#[derive(Error, Debug)]
pub enum Error {
    /// No upstream configuration has been written yet.
    #[error("upstream configuration is not set")]
    ConfigMissing,

    /// Required fields for the selected auth mode are blank or malformed.
    #[error("invalid upstream configuration: {0}")]
    InvalidConfig(String),

    /// Role definition violates an invariant (e.g. ttl > max_ttl).
    #[error("invalid role definition: {0}")]
    InvalidRole(String),

    /// The referenced object does not exist upstream.
    #[error("not found upstream: {0}")]
    UpstreamNotFound(String),

    /// Transport or HTTP failure talking to the upstream identity service.
    #[error("upstream request failed during {stage}: {message}")]
    UpstreamRequestFailed {
        /// Lifecycle stage that issued the failing request.
        stage: Stage,
        /// Human-readable failure description (HTTP status or transport error).
        message: String,
        /// Underlying transport error, when one exists.
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Upstream returned a success status but the expected fields are absent.
    #[error("malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),

    /// Lease internal metadata is missing a required field or has the wrong type.
    #[error("lease metadata missing required field: {0}")]
    MissingLeaseMetadata(&'static str),

    /// The named role does not exist (or was deleted since issuance).
    #[error("role not found: {0}")]
    RoleNotFound(String),

    /// Persistence collaborator failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Wrap a transport error with the lifecycle stage it occurred in.
    #[must_use]
    pub fn upstream(stage: Stage, source: reqwest::Error) -> Self {
        Self::UpstreamRequestFailed {
            stage,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Build an upstream failure from a non-success HTTP status.
    #[must_use]
    pub fn upstream_status(stage: Stage, status: reqwest::StatusCode) -> Self {
        Self::UpstreamRequestFailed {
            stage,
            message: format!("unexpected status {status}"),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_renders_in_upstream_error() {
        let err = Error::upstream_status(Stage::Revoke, reqwest::StatusCode::BAD_GATEWAY);
        assert_eq!(
            err.to_string(),
            "upstream request failed during revoke: unexpected status 502 Bad Gateway"
        );
    }

    #[test]
    fn missing_metadata_names_the_field() {
        let err = Error::MissingLeaseMetadata("api_key_id");
        assert!(err.to_string().contains("api_key_id"));
    }
}
