//! Application configuration loaded from the environment.

use std::net::SocketAddr;

use url::Url;

/// Environment variable names, collected so the docs and the loader cannot
/// drift apart.
mod env_keys {
    pub const BIND_ADDR: &str = "BIND_ADDR";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const TOKEN_ENCRYPTION_KEY: &str = "TOKEN_ENCRYPTION_KEY";
    pub const SYNC_SHARED_SECRET: &str = "SYNC_SHARED_SECRET";
    pub const SERVICE_TOKEN_INTROSPECT_URL: &str = "SERVICE_TOKEN_INTROSPECT_URL";
    pub const GOOGLE_ADS_DEVELOPER_TOKEN: &str = "GOOGLE_ADS_DEVELOPER_TOKEN";
    pub const GOOGLE_ADS_API_BASE: &str = "GOOGLE_ADS_API_BASE";
    pub const META_GRAPH_API_BASE: &str = "META_GRAPH_API_BASE";
    pub const TIKTOK_API_BASE: &str = "TIKTOK_API_BASE";
    pub const PINTEREST_API_BASE: &str = "PINTEREST_API_BASE";
    pub const SYNC_STALE_LOG_MINUTES: &str = "SYNC_STALE_LOG_MINUTES";
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_GOOGLE_BASE: &str = "https://googleads.googleapis.com/";
const DEFAULT_META_BASE: &str = "https://graph.facebook.com/";
const DEFAULT_TIKTOK_BASE: &str = "https://business-api.tiktok.com/open_api/";
const DEFAULT_PINTEREST_BASE: &str = "https://api.pinterest.com/";
const DEFAULT_STALE_LOG_MINUTES: i64 = 30;

/// Errors raised while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is absent.
    #[error("missing required environment variable {name}")]
    Missing { name: &'static str },
    /// A variable is present but cannot be parsed.
    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

impl ConfigError {
    fn missing(name: &'static str) -> Self {
        Self::Missing { name }
    }

    fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            message: message.into(),
        }
    }
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// 64-character hex key for the credential cipher. Held as the raw hex
    /// string; the cipher validates and decodes it.
    pub token_encryption_key: String,
    pub sync_shared_secret: Option<String>,
    pub introspect_url: Url,
    pub google_developer_token: String,
    pub google_api_base: Url,
    pub meta_api_base: Url,
    pub tiktok_api_base: Url,
    pub pinterest_api_base: Url,
    pub stale_log_minutes: i64,
}

impl AppConfig {
    /// Load configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is absent or a value
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary lookup, used by tests to avoid
    /// touching process state.
    pub fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind_addr = lookup(env_keys::BIND_ADDR)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned())
            .parse()
            .map_err(|err| {
                ConfigError::invalid(env_keys::BIND_ADDR, format!("not a socket address: {err}"))
            })?;

        let database_url = require(&lookup, env_keys::DATABASE_URL)?;
        let token_encryption_key = require(&lookup, env_keys::TOKEN_ENCRYPTION_KEY)?;
        let google_developer_token = require(&lookup, env_keys::GOOGLE_ADS_DEVELOPER_TOKEN)?;
        let introspect_url = parse_url(
            env_keys::SERVICE_TOKEN_INTROSPECT_URL,
            &require(&lookup, env_keys::SERVICE_TOKEN_INTROSPECT_URL)?,
        )?;

        let sync_shared_secret = lookup(env_keys::SYNC_SHARED_SECRET).filter(|s| !s.is_empty());

        let google_api_base = base_url(&lookup, env_keys::GOOGLE_ADS_API_BASE, DEFAULT_GOOGLE_BASE)?;
        let meta_api_base = base_url(&lookup, env_keys::META_GRAPH_API_BASE, DEFAULT_META_BASE)?;
        let tiktok_api_base = base_url(&lookup, env_keys::TIKTOK_API_BASE, DEFAULT_TIKTOK_BASE)?;
        let pinterest_api_base =
            base_url(&lookup, env_keys::PINTEREST_API_BASE, DEFAULT_PINTEREST_BASE)?;

        let stale_log_minutes = match lookup(env_keys::SYNC_STALE_LOG_MINUTES) {
            None => DEFAULT_STALE_LOG_MINUTES,
            Some(raw) => raw.parse().map_err(|err| {
                ConfigError::invalid(
                    env_keys::SYNC_STALE_LOG_MINUTES,
                    format!("not an integer: {err}"),
                )
            })?,
        };
        if stale_log_minutes <= 0 {
            return Err(ConfigError::invalid(
                env_keys::SYNC_STALE_LOG_MINUTES,
                "must be positive",
            ));
        }

        Ok(Self {
            bind_addr,
            database_url,
            token_encryption_key,
            sync_shared_secret,
            introspect_url,
            google_developer_token,
            google_api_base,
            meta_api_base,
            tiktok_api_base,
            pinterest_api_base,
            stale_log_minutes,
        })
    }
}

fn require(
    lookup: &impl Fn(&'static str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    lookup(name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ConfigError::missing(name))
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|err| ConfigError::invalid(name, format!("not a URL: {err}")))
}

/// Base URLs must end with `/` or `Url::join` would drop the last path
/// segment when adapters append their routes.
fn base_url(
    lookup: &impl Fn(&'static str) -> Option<String>,
    name: &'static str,
    default: &str,
) -> Result<Url, ConfigError> {
    let mut raw = lookup(name).unwrap_or_else(|| default.to_owned());
    if !raw.ends_with('/') {
        raw.push('/');
    }
    parse_url(name, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use rstest::rstest;

    fn minimal_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/ads".to_owned()),
            ("TOKEN_ENCRYPTION_KEY", "ab".repeat(32)),
            ("GOOGLE_ADS_DEVELOPER_TOKEN", "dev-token".to_owned()),
            (
                "SERVICE_TOKEN_INTROSPECT_URL",
                "https://auth.internal/introspect".to_owned(),
            ),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn minimal_environment_uses_defaults() {
        let config = load(&minimal_env()).expect("config loads");

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.stale_log_minutes, 30);
        assert!(config.sync_shared_secret.is_none());
        assert_eq!(
            config.google_api_base.as_str(),
            "https://googleads.googleapis.com/"
        );
    }

    #[rstest]
    #[case("DATABASE_URL")]
    #[case("TOKEN_ENCRYPTION_KEY")]
    #[case("GOOGLE_ADS_DEVELOPER_TOKEN")]
    #[case("SERVICE_TOKEN_INTROSPECT_URL")]
    fn missing_required_variable_is_an_error(#[case] name: &'static str) {
        let mut env = minimal_env();
        env.remove(name);

        assert!(matches!(load(&env), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn base_url_override_gains_trailing_slash() {
        let mut env = minimal_env();
        env.insert("META_GRAPH_API_BASE", "http://localhost:9321".to_owned());

        let config = load(&env).expect("config loads");
        assert_eq!(config.meta_api_base.as_str(), "http://localhost:9321/");
    }

    #[rstest]
    #[case("0")]
    #[case("-5")]
    #[case("soon")]
    fn bad_stale_log_minutes_is_an_error(#[case] value: &str) {
        let mut env = minimal_env();
        env.insert("SYNC_STALE_LOG_MINUTES", value.to_owned());

        assert!(matches!(load(&env), Err(ConfigError::Invalid { .. })));
    }
}
