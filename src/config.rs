//! Configuration types, loaded from the environment at startup.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Port the webhook endpoint listens on.
    pub port: u16,
    /// Source language assumed when the webhook omits `from`.
    pub default_source: String,
    /// Target language assumed when the webhook omits `to`.
    pub default_target: String,
    /// Reject requests whose detected language disagrees with the
    /// expected language for the origin role.
    pub strict_language: bool,
    /// Language the agent is expected to write in (strict mode).
    pub agent_lang: Option<String>,
    /// Language the client is expected to write in (strict mode).
    pub client_lang: Option<String>,
    /// Timeout applied to each external call (translation, ticket write).
    pub call_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 10000,
            default_source: "auto".to_string(),
            default_target: "ru".to_string(),
            strict_language: false,
            agent_lang: None,
            client_lang: None,
            call_timeout: Duration::from_secs(15),
        }
    }
}

impl RelayConfig {
    /// Load relay configuration from environment variables.
    ///
    /// All values have defaults — only the collaborator configs below can
    /// fail to load.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let default_source =
            std::env::var("RELAY_DEFAULT_SOURCE").unwrap_or(defaults.default_source);
        let default_target =
            std::env::var("RELAY_DEFAULT_TARGET").unwrap_or(defaults.default_target);

        let strict_language = std::env::var("RELAY_STRICT_LANGUAGE")
            .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let agent_lang = std::env::var("RELAY_AGENT_LANG").ok().filter(|s| !s.is_empty());
        let client_lang = std::env::var("RELAY_CLIENT_LANG").ok().filter(|s| !s.is_empty());

        let call_timeout_secs: u64 = std::env::var("RELAY_CALL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(15);

        Self {
            port,
            default_source,
            default_target,
            strict_language,
            agent_lang,
            client_lang,
            call_timeout: Duration::from_secs(call_timeout_secs),
        }
    }
}

/// Translation service connection settings.
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    /// Base URL of the translation API.
    pub base_url: String,
    /// API key, never logged.
    pub api_key: SecretString,
}

impl TranslatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("TRANSLATE_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("TRANSLATE_API_KEY".into()))?;

        let base_url = std::env::var("TRANSLATE_API_URL")
            .unwrap_or_else(|_| "https://api-free.deepl.com".to_string());

        Ok(Self {
            base_url,
            api_key: SecretString::from(api_key),
        })
    }
}

/// Ticketing platform connection settings.
#[derive(Debug, Clone)]
pub struct TicketConfig {
    /// Base URL of the ticketing platform, e.g. `https://acme.zendesk.com`.
    pub base_url: String,
    /// Agent account the relay posts as.
    pub email: String,
    /// API token, never logged.
    pub api_token: SecretString,
}

impl TicketConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("TICKET_BASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("TICKET_BASE_URL".into()))?;
        let email = std::env::var("TICKET_EMAIL")
            .map_err(|_| ConfigError::MissingEnvVar("TICKET_EMAIL".into()))?;
        let api_token = std::env::var("TICKET_API_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("TICKET_API_TOKEN".into()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            email,
            api_token: SecretString::from(api_token),
        })
    }
}
