//! Thin orchestrator wiring stores, the client cache, issuance, and the
//! lease lifecycle into the operations a host mounts behind its own
//! path/verb routing.
//!
//! Configuration writes and deletes invalidate the client cache
//! synchronously, before the operation returns, so the next `issue` or
//! `revoke` is guaranteed to rebuild the client from fresh configuration.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::cache::ClientCache;
use crate::config::{ConfigView, UpstreamConfig};
use crate::lease::{LeaseLifecycle, LeaseRenewal, RevokeNotFoundPolicy, SecretResponse};
use crate::role::RoleDefinition;
use crate::store::{ConfigStore, RoleStore};
use crate::{Error, Result, issuer};

/// The engine's caller-facing surface.
pub struct Backend {
    config_store: Arc<dyn ConfigStore>,
    role_store: Arc<dyn RoleStore>,
    cache: ClientCache,
    lifecycle: LeaseLifecycle,
}

impl Backend {
    /// Create a backend over the given persistence collaborators, with the
    /// default HTTP client builder and strict revoke policy.
    #[must_use]
    pub fn new(config_store: Arc<dyn ConfigStore>, role_store: Arc<dyn RoleStore>) -> Self {
        let cache = ClientCache::new(Arc::clone(&config_store));
        Self::with_parts(config_store, role_store, cache, LeaseLifecycle::new())
    }

    /// Create a backend from explicit parts (custom client builder in the
    /// cache, custom revoke policy in the lifecycle).
    #[must_use]
    pub fn with_parts(
        config_store: Arc<dyn ConfigStore>,
        role_store: Arc<dyn RoleStore>,
        cache: ClientCache,
        lifecycle: LeaseLifecycle,
    ) -> Self {
        Self {
            config_store,
            role_store,
            cache,
            lifecycle,
        }
    }

    /// Choose how revokes treat keys already deleted upstream.
    #[must_use]
    pub fn with_revoke_policy(mut self, policy: RevokeNotFoundPolicy) -> Self {
        self.lifecycle = LeaseLifecycle::with_policy(policy);
        self
    }

    // --- configuration operations ---

    /// Read the stored configuration, secrets masked.
    pub async fn read_config(&self) -> Result<Option<ConfigView>> {
        Ok(self.config_store.get().await?.map(|c| c.view()))
    }

    /// Validate and persist the configuration, then invalidate the cached
    /// client so the next call rebuilds with the new credentials.
    pub async fn write_config(&self, config: UpstreamConfig) -> Result<()> {
        config.validate()?;
        self.config_store.put(config).await?;
        self.cache.invalidate().await;
        info!("upstream configuration updated");
        Ok(())
    }

    /// Delete the configuration and drop the cached client.
    pub async fn delete_config(&self) -> Result<()> {
        self.config_store.delete().await?;
        self.cache.invalidate().await;
        info!("upstream configuration deleted");
        Ok(())
    }

    // --- role operations ---

    /// Read a role definition by name.
    pub async fn read_role(&self, name: &str) -> Result<Option<RoleDefinition>> {
        self.role_store.get(name).await
    }

    /// Validate and persist a role definition.
    pub async fn write_role(&self, role: RoleDefinition) -> Result<()> {
        role.validate()?;
        info!(role = %role.name, service_account = %role.service_account_id, "role written");
        self.role_store.put(role).await
    }

    /// Delete a role by name. Leases already issued under it will fail
    /// renewal but remain revocable.
    pub async fn delete_role(&self, name: &str) -> Result<()> {
        self.role_store.delete(name).await
    }

    /// List all role names.
    pub async fn list_roles(&self) -> Result<Vec<String>> {
        self.role_store.list().await
    }

    // --- credential operations ---

    /// Issue a fresh credential for the named role.
    pub async fn issue(&self, role_name: &str) -> Result<SecretResponse> {
        let role = self
            .role_store
            .get(role_name)
            .await?
            .ok_or_else(|| Error::RoleNotFound(role_name.to_string()))?;

        let client = self.cache.get().await?;
        let issued = issuer::issue(&client, &role).await?;
        Ok(self.lifecycle.package_issuance(issued, &role))
    }

    /// Revoke the credential identified by the lease's internal metadata.
    pub async fn revoke(&self, metadata: &Value) -> Result<()> {
        let client = self.cache.get().await?;
        self.lifecycle.revoke(&client, metadata).await
    }

    /// Renew the lease identified by its internal metadata, returning the
    /// role's current durations.
    pub async fn renew(&self, metadata: &Value) -> Result<LeaseRenewal> {
        self.lifecycle.renew(metadata, self.role_store.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::AuthMode;
    use crate::store::{InMemoryConfigStore, InMemoryRoleStore};

    fn backend() -> Backend {
        Backend::new(
            Arc::new(InMemoryConfigStore::new()),
            Arc::new(InMemoryRoleStore::new()),
        )
    }

    fn config() -> UpstreamConfig {
        UpstreamConfig {
            url: Some("https://api.example".to_string()),
            auth: AuthMode::Token {
                access_token: "tok-123".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn config_read_is_masked() {
        // GIVEN: a backend with basic-auth configuration written
        let backend = backend();
        backend
            .write_config(UpstreamConfig {
                url: None,
                auth: AuthMode::Basic {
                    username: "alice".to_string(),
                    password: "hunter2".to_string(),
                },
            })
            .await
            .unwrap();

        // WHEN: the config is read back
        let view = backend.read_config().await.unwrap().unwrap();

        // THEN: only username and url are visible
        assert_eq!(view.username.as_deref(), Some("alice"));
        assert!(serde_json::to_string(&view).unwrap().contains("alice"));
    }

    #[tokio::test]
    async fn write_config_rejects_invalid() {
        let backend = backend();
        let err = backend
            .write_config(UpstreamConfig {
                url: None,
                auth: AuthMode::Basic {
                    username: "alice".to_string(),
                    password: String::new(),
                },
            })
            .await
            .expect_err("must reject");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn write_role_enforces_ttl_invariant() {
        let backend = backend();
        let err = backend
            .write_role(RoleDefinition {
                name: "svc-a".to_string(),
                service_account_id: "sa-123".to_string(),
                ttl: Duration::from_secs(86400),
                max_ttl: Duration::from_secs(3600),
            })
            .await
            .expect_err("must reject");
        assert!(matches!(err, Error::InvalidRole(_)));
    }

    #[tokio::test]
    async fn role_crud_round_trips() {
        // GIVEN: a backend with one role written
        let backend = backend();
        let role = RoleDefinition {
            name: "svc-a".to_string(),
            service_account_id: "sa-123".to_string(),
            ttl: Duration::ZERO,
            max_ttl: Duration::ZERO,
        };
        backend.write_role(role.clone()).await.unwrap();

        // WHEN/THEN: read, list, delete behave
        assert_eq!(backend.read_role("svc-a").await.unwrap(), Some(role));
        assert_eq!(backend.list_roles().await.unwrap(), vec!["svc-a"]);
        backend.delete_role("svc-a").await.unwrap();
        assert!(backend.read_role("svc-a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn issue_for_unknown_role_fails_before_client_construction() {
        // GIVEN: a backend with configuration but no roles
        let backend = backend();
        backend.write_config(config()).await.unwrap();

        // WHEN/THEN: issuance fails with RoleNotFound
        let err = backend.issue("missing").await.expect_err("must fail");
        assert!(matches!(err, Error::RoleNotFound(_)));
    }

    #[tokio::test]
    async fn issue_without_config_fails_with_config_missing() {
        // GIVEN: a backend with a role but no configuration
        let backend = backend();
        backend
            .write_role(RoleDefinition {
                name: "svc-a".to_string(),
                service_account_id: "sa-123".to_string(),
                ttl: Duration::ZERO,
                max_ttl: Duration::ZERO,
            })
            .await
            .unwrap();

        // WHEN/THEN: issuance fails at client construction
        let err = backend.issue("svc-a").await.expect_err("must fail");
        assert!(matches!(err, Error::ConfigMissing));
    }
}
