//! Client cache — at most one live upstream client per configuration
//! generation.
//!
//! `get()` takes the read lock first so the common already-constructed case
//! pays no write-lock contention. The slow path re-checks under the write
//! lock: a racing caller may have constructed the client in between, and
//! only one construction may proceed. `invalidate()` must be called
//! synchronously after every successful configuration write or delete so
//! the next `get()` rebuilds from fresh configuration.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::store::ConfigStore;
use crate::upstream::UpstreamClient;
use crate::{Error, Result};

/// Constructs an [`UpstreamClient`] from a configuration.
///
/// The default builder creates the HTTP implementation; tests inject
/// counting or mock builders through this seam.
#[async_trait::async_trait]
pub trait ClientBuilder: Send + Sync + 'static {
    /// Build a fully-constructed client. Partial state must never escape:
    /// the cache only publishes the client after this returns `Ok`.
    async fn build(&self, config: &UpstreamConfig) -> Result<UpstreamClient>;
}

/// Default builder producing the HTTP-backed client.
pub struct HttpClientBuilder;

#[async_trait::async_trait]
impl ClientBuilder for HttpClientBuilder {
    async fn build(&self, config: &UpstreamConfig) -> Result<UpstreamClient> {
        UpstreamClient::from_config(config)
    }
}

/// Lazily-initialized, invalidatable cache of the authenticated upstream
/// client.
pub struct ClientCache {
    config_store: Arc<dyn ConfigStore>,
    builder: Arc<dyn ClientBuilder>,
    slot: RwLock<Option<Arc<UpstreamClient>>>,
}

impl ClientCache {
    /// Create a cache that builds HTTP clients from the given config store.
    #[must_use]
    pub fn new(config_store: Arc<dyn ConfigStore>) -> Self {
        Self::with_builder(config_store, Arc::new(HttpClientBuilder))
    }

    /// Create a cache with a custom client builder.
    #[must_use]
    pub fn with_builder(config_store: Arc<dyn ConfigStore>, builder: Arc<dyn ClientBuilder>) -> Self {
        Self {
            config_store,
            builder,
            slot: RwLock::new(None),
        }
    }

    /// Get the live client, constructing it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigMissing`] when no configuration is stored, or
    /// the builder's error when construction fails. A failed construction
    /// leaves the cache empty; the next caller retries.
    pub async fn get(&self) -> Result<Arc<UpstreamClient>> {
        {
            let slot = self.slot.read().await;
            if let Some(client) = slot.as_ref() {
                return Ok(Arc::clone(client));
            }
        }

        let mut slot = self.slot.write().await;
        // Re-check: a racing caller may have built the client while we
        // waited for the write lock.
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        let config = self
            .config_store
            .get()
            .await?
            .ok_or(Error::ConfigMissing)?;

        let client = Arc::new(self.builder.build(&config).await?);
        *slot = Some(Arc::clone(&client));
        debug!(base_url = %client.base_url(), "constructed upstream client");
        Ok(client)
    }

    /// Drop the cached client unconditionally. Idempotent.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        if slot.take().is_some() {
            debug!("invalidated cached upstream client");
        }
    }
}
