//! Credential issuance — mint one fresh API key bound to a role's service
//! account.

use tracing::info;

use crate::role::RoleDefinition;
use crate::upstream::UpstreamClient;
use crate::{Error, Result};

/// A freshly minted upstream credential.
///
/// Produced once per issuance call, immediately packaged into a lease
/// response and discarded; the engine never caches it.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    /// Upstream identifier of the new key.
    pub api_key_id: String,
    /// Secret value of the new key. Only available at creation time.
    pub api_key_secret: String,
    /// Base URL the key is valid against.
    pub bound_url: String,
}

impl std::fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("api_key_id", &self.api_key_id)
            .field("api_key_secret", &"<redacted>")
            .field("bound_url", &self.bound_url)
            .finish()
    }
}

/// Mint a new API key for `role` against the live upstream client.
///
/// Resolves the role's service account first so a misconfigured role
/// surfaces as [`Error::UpstreamNotFound`] rather than a create failure.
/// No retries: each call mints a distinct key, so retrying on failure is a
/// caller decision.
///
/// # Errors
///
/// [`Error::UpstreamNotFound`] if the service account is absent upstream,
/// [`Error::UpstreamRequestFailed`] on transport/HTTP failures, and
/// [`Error::MalformedUpstreamResponse`] if the create response lacks the
/// key id or secret.
pub async fn issue(client: &UpstreamClient, role: &RoleDefinition) -> Result<IssuedCredential> {
    let account = client
        .iam
        .get_service_account(&role.service_account_id)
        .await?;

    let resource = client.api_keys.create_api_key(&account.id).await?;

    let api_key_id = resource
        .id
        .ok_or_else(|| Error::MalformedUpstreamResponse("api key response missing id".to_string()))?;
    let api_key_secret = resource
        .spec
        .and_then(|spec| spec.secret)
        .ok_or_else(|| {
            Error::MalformedUpstreamResponse("api key response missing secret".to_string())
        })?;

    info!(
        role = %role.name,
        service_account = %account.id,
        api_key_id = %api_key_id,
        "issued upstream api key"
    );

    Ok(IssuedCredential {
        api_key_id,
        api_key_secret,
        bound_url: client.base_url().to_string(),
    })
}
