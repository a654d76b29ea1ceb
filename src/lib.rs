//! Keymint — dynamic cloud API-key engine.
//!
//! Issues, renews, and revokes short-lived API credentials for an upstream
//! cloud identity service, on behalf of callers identified by a named role.
//!
//! # Architecture
//!
//! ```text
//! issue(role)  -> RoleStore lookup
//!              -> ClientCache (lazy, invalidatable upstream client)
//!              -> issuer (IAM lookup + API-key create)
//!              -> LeaseLifecycle (package data + internal metadata + TTLs)
//!
//! revoke/renew -> LeaseLifecycle (validate opaque lease metadata,
//!                 delete upstream / re-read live role policy)
//! ```
//!
//! The host owns routing, caller authentication, and lease persistence; the
//! engine owns the credential lifecycle. Persistence is abstracted behind
//! the [`store::ConfigStore`] and [`store::RoleStore`] traits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod issuer;
pub mod lease;
pub mod role;
pub mod store;
pub mod upstream;

pub use backend::Backend;
pub use cache::ClientCache;
pub use config::{AuthMode, UpstreamConfig};
pub use error::{Error, Result, Stage};
pub use lease::{LeaseLifecycle, LeaseMetadata, RevokeNotFoundPolicy, SecretResponse};
pub use role::RoleDefinition;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging for hosts that do not bring their own subscriber.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
