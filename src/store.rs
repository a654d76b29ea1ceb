//! Persistence collaborators — configuration and role storage.
//!
//! The [`ConfigStore`] and [`RoleStore`] traits abstract over whatever
//! key-value persistence the host provides. The in-memory implementations
//! ship for embedding and tests; a host wanting durable storage implements
//! the traits over its own backend.

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::Result;
use crate::config::UpstreamConfig;
use crate::role::RoleDefinition;

/// Storage for the single upstream connection configuration.
///
/// Implementations must be `Send + Sync`: the store is shared across
/// request-handling tasks.
#[async_trait::async_trait]
pub trait ConfigStore: Send + Sync + 'static {
    /// Fetch the stored configuration, or `None` if none has been written.
    async fn get(&self) -> Result<Option<UpstreamConfig>>;

    /// Store (overwrite) the configuration.
    async fn put(&self, config: UpstreamConfig) -> Result<()>;

    /// Remove the stored configuration. Idempotent.
    async fn delete(&self) -> Result<()>;
}

/// Storage for role definitions, keyed by role name.
#[async_trait::async_trait]
pub trait RoleStore: Send + Sync + 'static {
    /// Fetch a role by name, or `None` if it does not exist.
    async fn get(&self, name: &str) -> Result<Option<RoleDefinition>>;

    /// Store (overwrite) a role definition under its name.
    async fn put(&self, role: RoleDefinition) -> Result<()>;

    /// Delete a role by name. Idempotent.
    async fn delete(&self, name: &str) -> Result<()>;

    /// List all role names.
    async fn list(&self) -> Result<Vec<String>>;
}

/// In-memory configuration store: a single slot behind a lock.
#[derive(Default)]
pub struct InMemoryConfigStore {
    slot: RwLock<Option<UpstreamConfig>>,
}

impl InMemoryConfigStore {
    /// Create an empty config store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get(&self) -> Result<Option<UpstreamConfig>> {
        Ok(self.slot.read().clone())
    }

    async fn put(&self, config: UpstreamConfig) -> Result<()> {
        *self.slot.write() = Some(config);
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        *self.slot.write() = None;
        Ok(())
    }
}

/// In-memory role store backed by a `DashMap`.
#[derive(Default)]
pub struct InMemoryRoleStore {
    roles: DashMap<String, RoleDefinition>,
}

impl InMemoryRoleStore {
    /// Create an empty role store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn get(&self, name: &str) -> Result<Option<RoleDefinition>> {
        Ok(self.roles.get(name).map(|e| e.value().clone()))
    }

    async fn put(&self, role: RoleDefinition) -> Result<()> {
        self.roles.insert(role.name.clone(), role);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.roles.remove(name);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.roles.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}
