use serde::{Deserialize, Serialize};

/// Base URL used for both the management API and the store endpoint unless
/// overridden.
const DEFAULT_BASE_URL: &str = "https://sentry.io";

/// Indicates an incomplete or invalid forwarder configuration.
///
/// Raised by [`SentryForwarder::new`](crate::SentryForwarder::new) before
/// any network activity takes place.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The management API token is missing or blank.
    #[error("missing required option `token`")]
    MissingToken,

    /// The organisation slug is missing or blank.
    #[error("missing required option `organisation`")]
    MissingOrganisation,

    /// The team slug is missing or blank.
    #[error("missing required option `team`")]
    MissingTeam,

    /// The base URL does not parse.
    #[error("invalid base url")]
    InvalidBaseUrl(#[from] url::ParseError),
}

/// Configuration for a [`SentryForwarder`](crate::SentryForwarder).
///
/// `token`, `organisation` and `team` are required and validated at
/// construction time of the forwarder.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SentryConfig {
    /// Bearer token authenticating the management API calls.
    pub token: String,

    /// Organisation slug the projects live under.
    pub organisation: String,

    /// Team slug new projects are created for.
    pub team: String,

    /// Base URL of the Sentry instance.
    pub base_url: String,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            organisation: String::new(),
            team: String::new(),
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }
}

impl SentryConfig {
    /// Creates a configuration with the default base URL.
    pub fn new(
        token: impl Into<String>,
        organisation: impl Into<String>,
        team: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            organisation: organisation.into(),
            team: team.into(),
            ..Self::default()
        }
    }

    /// Checks that all required options are present.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.organisation.trim().is_empty() {
            return Err(ConfigError::MissingOrganisation);
        }
        if self.team.trim().is_empty() {
            return Err(ConfigError::MissingTeam);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn default_base_url() {
        let config = SentryConfig::new("token", "acme", "backend");
        assert_eq!(config.base_url, "https://sentry.io");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_options_are_rejected() {
        let config = SentryConfig::new("", "acme", "backend");
        assert_eq!(config.validate(), Err(ConfigError::MissingToken));

        let config = SentryConfig::new("token", " ", "backend");
        assert_eq!(config.validate(), Err(ConfigError::MissingOrganisation));

        let config = SentryConfig::new("token", "acme", "");
        assert_eq!(config.validate(), Err(ConfigError::MissingTeam));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: SentryConfig =
            serde_json::from_str(r#"{"token": "t", "organisation": "org", "team": "team"}"#)
                .unwrap();

        assert_eq!(config.base_url, "https://sentry.io");
        assert_eq!(config.token, "t");
    }
}
