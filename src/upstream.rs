//! Upstream identity service surface.
//!
//! Two logical sub-APIs, each behind its own trait seam:
//!
//! - [`IamApi`] — service-account lookup.
//! - [`ApiKeysApi`] — API-key create/delete.
//!
//! [`HttpUpstream`] implements both over a shared `reqwest` client with
//! basic or bearer authentication. [`UpstreamClient`] is the opaque handle
//! the rest of the engine works with: it bundles the two sub-clients plus
//! the resolved base URL, and is owned exclusively by the
//! [`ClientCache`](crate::cache::ClientCache).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{AuthMode, UpstreamConfig};
use crate::error::Stage;
use crate::{Error, Result};

/// Base URL used when the configuration does not override it.
pub const DEFAULT_BASE_URL: &str = "https://api.confluent.cloud";

/// Display name attached to keys minted by this engine, so they are
/// recognizable in the upstream console.
const ISSUED_KEY_DISPLAY_NAME: &str = "keymint issued credential";

/// A service account as returned by the upstream IAM API.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    /// Upstream identifier of the service account.
    pub id: String,
    /// Human-readable name, when the upstream provides one.
    #[serde(default)]
    pub display_name: Option<String>,
}

/// An API-key resource as returned by the upstream API-keys API.
///
/// Fields are optional on purpose: upstream contracts can change, and the
/// issuer turns absent fields into [`Error::MalformedUpstreamResponse`]
/// instead of panicking.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyResource {
    /// Generated key identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Key spec carrying the secret value.
    #[serde(default)]
    pub spec: Option<ApiKeySpec>,
}

/// The `spec` object of an API-key resource.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySpec {
    /// Secret value of the key. Only returned at creation time.
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Serialize)]
struct CreateApiKeyRequest<'a> {
    spec: CreateApiKeySpec<'a>,
}

#[derive(Serialize)]
struct CreateApiKeySpec<'a> {
    display_name: &'a str,
    description: &'a str,
    owner: OwnerReference<'a>,
}

#[derive(Serialize)]
struct OwnerReference<'a> {
    id: &'a str,
    kind: &'a str,
}

/// Service-account lookup.
#[async_trait::async_trait]
pub trait IamApi: Send + Sync + 'static {
    /// Resolve a service account by its upstream id.
    ///
    /// Returns [`Error::UpstreamNotFound`] when the account does not exist.
    async fn get_service_account(&self, id: &str) -> Result<ServiceAccount>;
}

/// API-key management.
#[async_trait::async_trait]
pub trait ApiKeysApi: Send + Sync + 'static {
    /// Mint a new API key owned by the given service account.
    async fn create_api_key(&self, service_account_id: &str) -> Result<ApiKeyResource>;

    /// Delete an API key by its id.
    ///
    /// Returns [`Error::UpstreamNotFound`] when the upstream reports the key
    /// as unknown; the lease lifecycle decides whether that is tolerated.
    async fn delete_api_key(&self, id: &str) -> Result<()>;
}

/// Resolved authentication applied to every upstream request.
#[derive(Clone)]
enum AuthContext {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl AuthContext {
    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Basic { username, password } => request.basic_auth(username, Some(password)),
            Self::Bearer { token } => request.bearer_auth(token),
        }
    }
}

/// HTTP implementation of both upstream sub-APIs.
pub struct HttpUpstream {
    http: reqwest::Client,
    base_url: String,
    auth: AuthContext,
}

impl HttpUpstream {
    /// Build an HTTP upstream from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when required credential fields are
    /// blank, the auth mode is `None`, or the base URL does not parse.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        config.validate()?;

        let auth = match &config.auth {
            AuthMode::None => {
                return Err(Error::InvalidConfig(
                    "authentication missing in configuration".to_string(),
                ));
            }
            AuthMode::Basic { username, password } => AuthContext::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            AuthMode::Token { access_token } => AuthContext::Bearer {
                token: access_token.clone(),
            },
        };

        let base_url = resolve_base_url(config.url.as_deref())?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::upstream(Stage::BuildClient, e))?;

        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    /// Base URL this upstream is bound to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Normalize the configured base URL (or the provider default) to a parsed,
/// trailing-slash-free form.
fn resolve_base_url(configured: Option<&str>) -> Result<String> {
    let raw = match configured {
        Some(url) if !url.trim().is_empty() => url,
        _ => DEFAULT_BASE_URL,
    };
    let parsed =
        Url::parse(raw).map_err(|e| Error::InvalidConfig(format!("invalid base url: {e}")))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

#[async_trait::async_trait]
impl IamApi for HttpUpstream {
    async fn get_service_account(&self, id: &str) -> Result<ServiceAccount> {
        let url = format!("{}/iam/v2/service-accounts/{id}", self.base_url);
        let response = self
            .auth
            .apply(self.http.get(&url))
            .send()
            .await
            .map_err(|e| Error::upstream(Stage::Issue, e))?;

        match response.status() {
            status if status.is_success() => response
                .json::<ServiceAccount>()
                .await
                .map_err(|e| Error::MalformedUpstreamResponse(e.to_string())),
            reqwest::StatusCode::NOT_FOUND => Err(Error::UpstreamNotFound(format!(
                "service account {id}"
            ))),
            status => Err(Error::upstream_status(Stage::Issue, status)),
        }
    }
}

#[async_trait::async_trait]
impl ApiKeysApi for HttpUpstream {
    async fn create_api_key(&self, service_account_id: &str) -> Result<ApiKeyResource> {
        let url = format!("{}/iam/v2/api-keys", self.base_url);
        let body = CreateApiKeyRequest {
            spec: CreateApiKeySpec {
                display_name: ISSUED_KEY_DISPLAY_NAME,
                description: ISSUED_KEY_DISPLAY_NAME,
                owner: OwnerReference {
                    id: service_account_id,
                    kind: "service-account",
                },
            },
        };

        let response = self
            .auth
            .apply(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::upstream(Stage::Issue, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::upstream_status(Stage::Issue, status));
        }

        response
            .json::<ApiKeyResource>()
            .await
            .map_err(|e| Error::MalformedUpstreamResponse(e.to_string()))
    }

    async fn delete_api_key(&self, id: &str) -> Result<()> {
        let url = format!("{}/iam/v2/api-keys/{id}", self.base_url);
        let response = self
            .auth
            .apply(self.http.delete(&url))
            .send()
            .await
            .map_err(|e| Error::upstream(Stage::Revoke, e))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            reqwest::StatusCode::NOT_FOUND => {
                Err(Error::UpstreamNotFound(format!("api key {id}")))
            }
            status => Err(Error::upstream_status(Stage::Revoke, status)),
        }
    }
}

/// Opaque handle bundling the two upstream sub-clients and the resolved
/// base URL. At most one live instance exists per engine instance; the
/// [`ClientCache`](crate::cache::ClientCache) owns it.
pub struct UpstreamClient {
    /// IAM sub-client.
    pub iam: Arc<dyn IamApi>,
    /// API-key sub-client.
    pub api_keys: Arc<dyn ApiKeysApi>,
    base_url: String,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UpstreamClient {
    /// Build the HTTP-backed client from a configuration.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        let upstream = Arc::new(HttpUpstream::from_config(config)?);
        let base_url = upstream.base_url().to_string();
        Ok(Self {
            iam: upstream.clone(),
            api_keys: upstream,
            base_url,
        })
    }

    /// Assemble a client from explicit sub-clients. This is the seam used
    /// by tests and by hosts that bring their own transport.
    #[must_use]
    pub fn from_parts(
        iam: Arc<dyn IamApi>,
        api_keys: Arc<dyn ApiKeysApi>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            iam,
            api_keys,
            base_url: base_url.into(),
        }
    }

    /// Base URL every issued credential is bound to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthMode;

    fn basic_config(url: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            url: url.map(String::from),
            auth: AuthMode::Basic {
                username: "alice".to_string(),
                password: "hunter2".to_string(),
            },
        }
    }

    #[test]
    fn build_with_basic_auth_succeeds() {
        let client = UpstreamClient::from_config(&basic_config(None)).unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn build_with_blank_password_fails() {
        let config = UpstreamConfig {
            url: None,
            auth: AuthMode::Basic {
                username: "alice".to_string(),
                password: String::new(),
            },
        };
        let err = UpstreamClient::from_config(&config).expect_err("must reject");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn build_with_no_auth_fails() {
        let config = UpstreamConfig {
            url: None,
            auth: AuthMode::None,
        };
        let err = UpstreamClient::from_config(&config).expect_err("must reject");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn url_override_is_normalized() {
        let client = UpstreamClient::from_config(&basic_config(Some("https://api.example/"))).unwrap();
        assert_eq!(client.base_url(), "https://api.example");
    }

    #[test]
    fn invalid_url_override_is_rejected() {
        let err = UpstreamClient::from_config(&basic_config(Some("not a url")))
            .expect_err("must reject");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn create_request_serializes_owner_reference() {
        let body = CreateApiKeyRequest {
            spec: CreateApiKeySpec {
                display_name: ISSUED_KEY_DISPLAY_NAME,
                description: ISSUED_KEY_DISPLAY_NAME,
                owner: OwnerReference {
                    id: "sa-123",
                    kind: "service-account",
                },
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["spec"]["owner"]["id"], "sa-123");
        assert_eq!(json["spec"]["owner"]["kind"], "service-account");
    }
}
