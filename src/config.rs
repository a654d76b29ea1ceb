//! Upstream connection configuration.
//!
//! The engine authenticates to the upstream identity service either with a
//! username/password pair or a bearer access token. The configuration is
//! persisted by the host through a [`ConfigStore`](crate::store::ConfigStore)
//! and read back whenever a client has to be (re)built.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How the engine authenticates to the upstream identity service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthMode {
    /// No credentials. Client construction with this mode is rejected,
    /// kept representable so a config write can be staged before credentials.
    None,
    /// HTTP basic authentication.
    Basic {
        /// Account username.
        username: String,
        /// Account password.
        password: String,
    },
    /// Bearer token authentication.
    Token {
        /// Opaque access token sent as `Authorization: Bearer`.
        access_token: String,
    },
}

impl std::fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Token { .. } => f
                .debug_struct("Token")
                .field("access_token", &"<redacted>")
                .finish(),
        }
    }
}

/// Connection settings for the upstream identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL override. `None` or empty uses the provider default.
    #[serde(default)]
    pub url: Option<String>,
    /// Authentication mode and its credentials.
    pub auth: AuthMode,
}

impl UpstreamConfig {
    /// Build a config from the flat external field surface
    /// (`username`/`password`/`access_token`/`url`, all individually optional).
    ///
    /// A non-empty access token wins over basic credentials, matching the
    /// precedence of the external configuration path.
    pub fn from_parts(
        url: Option<String>,
        username: Option<String>,
        password: Option<String>,
        access_token: Option<String>,
    ) -> Result<Self> {
        let non_blank = |s: Option<String>| s.filter(|v| !v.trim().is_empty());

        let auth = match (
            non_blank(access_token),
            non_blank(username),
            non_blank(password),
        ) {
            (Some(access_token), _, _) => AuthMode::Token { access_token },
            (None, Some(username), Some(password)) => AuthMode::Basic { username, password },
            (None, None, None) => AuthMode::None,
            (None, _, _) => {
                return Err(Error::InvalidConfig(
                    "both username and password must be provided".to_string(),
                ));
            }
        };

        let config = Self {
            url: non_blank(url),
            auth,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the auth-mode invariant: the selected mode's required fields
    /// must be non-blank.
    pub fn validate(&self) -> Result<()> {
        match &self.auth {
            AuthMode::None => Ok(()),
            AuthMode::Basic { username, password } => {
                if username.trim().is_empty() || password.trim().is_empty() {
                    Err(Error::InvalidConfig(
                        "both username and password must be provided".to_string(),
                    ))
                } else {
                    Ok(())
                }
            }
            AuthMode::Token { access_token } => {
                if access_token.trim().is_empty() {
                    Err(Error::InvalidConfig(
                        "access token must be provided".to_string(),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Non-sensitive view of this configuration for read responses.
    #[must_use]
    pub fn view(&self) -> ConfigView {
        ConfigView {
            url: self.url.clone(),
            username: match &self.auth {
                AuthMode::Basic { username, .. } => Some(username.clone()),
                _ => None,
            },
        }
    }
}

/// What a configuration read returns: never the password or token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigView {
    /// Configured base URL override, if any.
    pub url: Option<String>,
    /// Configured username for basic auth, if any.
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn from_parts_prefers_token_over_basic() {
        let config = UpstreamConfig::from_parts(
            None,
            Some("alice".to_string()),
            Some("hunter2".to_string()),
            Some("tok-123".to_string()),
        )
        .unwrap();

        assert_eq!(
            config.auth,
            AuthMode::Token {
                access_token: "tok-123".to_string()
            }
        );
    }

    #[test]
    fn from_parts_rejects_username_without_password() {
        let err = UpstreamConfig::from_parts(None, Some("alice".to_string()), None, None)
            .expect_err("must reject");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn validate_rejects_blank_password() {
        let config = UpstreamConfig {
            url: None,
            auth: AuthMode::Basic {
                username: "alice".to_string(),
                password: "  ".to_string(),
            },
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn view_masks_secrets() {
        let config = UpstreamConfig {
            url: Some("https://api.example".to_string()),
            auth: AuthMode::Basic {
                username: "alice".to_string(),
                password: "hunter2".to_string(),
            },
        };

        let view = config.view();
        assert_eq!(view.username.as_deref(), Some("alice"));
        let rendered = serde_json::to_string(&view).unwrap();
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn debug_redacts_credentials() {
        let config = UpstreamConfig {
            url: None,
            auth: AuthMode::Token {
                access_token: "tok-secret".to_string(),
            },
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("tok-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
