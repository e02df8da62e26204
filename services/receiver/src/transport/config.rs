use std::{
    net::{Ipv4Addr, SocketAddr},
    num::NonZeroUsize,
};

use auth::TokenTable;
use thiserror::Error;

pub const PORT_ENV_VAR: &str = "PORT";
pub const API_KEYS_ENV_VAR: &str = "VALID_API_KEYS";
pub const MESSAGE_LIMIT_ENV_VAR: &str = "MESSAGE_LIMIT";
pub const PLATFORM_DESCRIPTOR_ENV_VAR: &str = "VCAP_APPLICATION";
pub const HTTP_WORKERS_ENV_VAR: &str = "RECEIVER_HTTP_WORKERS";

const REQUIRED_ENV_VARS: [&str; 3] = [PORT_ENV_VAR, API_KEYS_ENV_VAR, MESSAGE_LIMIT_ENV_VAR];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingVar(&'static str),
    #[error("{var} failed to json unmarshal: {source}")]
    InvalidTokenTable {
        var: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("message limit configuration invalid: parsing {raw:?}: {reason}")]
    InvalidMessageLimit { raw: String, reason: String },
    #[error("PORT configuration invalid: parsing {raw:?}: {reason}")]
    InvalidPort { raw: String, reason: String },
}

/// Settings read once at startup.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub port: u16,
    pub tokens: TokenTable,
    pub message_limit: NonZeroUsize,
    pub platform_descriptor: Option<String>,
    pub http_workers: usize,
}

impl ReceiverConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Required variables are checked
    /// for presence first, in a fixed order, before any of them is parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingVar(key))
        };
        for key in REQUIRED_ENV_VARS {
            required(key)?;
        }

        let tokens = TokenTable::from_json(&required(API_KEYS_ENV_VAR)?).map_err(|source| {
            ConfigError::InvalidTokenTable {
                var: API_KEYS_ENV_VAR,
                source,
            }
        })?;
        let message_limit = parse_message_limit(&required(MESSAGE_LIMIT_ENV_VAR)?)?;
        let port = parse_port(&required(PORT_ENV_VAR)?)?;
        let http_workers = lookup(HTTP_WORKERS_ENV_VAR)
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|workers| *workers > 0)
            .unwrap_or_else(default_http_workers);

        Ok(Self {
            port,
            tokens,
            message_limit,
            platform_descriptor: lookup(PLATFORM_DESCRIPTOR_ENV_VAR),
            http_workers,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

fn parse_message_limit(raw: &str) -> Result<NonZeroUsize, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidMessageLimit {
        raw: raw.to_string(),
        reason,
    };
    let limit = raw.parse::<usize>().map_err(|err| invalid(err.to_string()))?;
    NonZeroUsize::new(limit).ok_or_else(|| invalid("message limit must be positive".to_string()))
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.parse::<u16>()
        .map_err(|err| ConfigError::InvalidPort {
            raw: raw.to_string(),
            reason: err.to_string(),
        })
}

pub fn default_http_workers() -> usize {
    std::thread::available_parallelism()
        .map(|parallelism| parallelism.get().clamp(1, 32))
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use schema::UserId;

    use super::*;

    fn valid_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (PORT_ENV_VAR, "8080".to_string()),
            (
                API_KEYS_ENV_VAR,
                r#"{"user-id":["1234"],"user-id2":["second-token"]}"#.to_string(),
            ),
            (MESSAGE_LIMIT_ENV_VAR, "50".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<ReceiverConfig, ConfigError> {
        ReceiverConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn loads_valid_configuration() {
        let config = load(&valid_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.message_limit.get(), 50);
        assert_eq!(config.tokens.user_count(), 2);
        assert_eq!(
            config.tokens.authenticate(Some("Bearer second-token")),
            Some(UserId::from("user-id2"))
        );
        assert_eq!(config.platform_descriptor, None);
        assert!(config.http_workers >= 1);
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn each_missing_required_var_is_reported() {
        for key in REQUIRED_ENV_VARS {
            let mut env = valid_env();
            env.remove(key);
            let err = load(&env).unwrap_err();
            assert_eq!(err.to_string(), format!("{key} environment variable not set"));
        }
    }

    #[test]
    fn empty_required_var_counts_as_missing() {
        let mut env = valid_env();
        env.insert(MESSAGE_LIMIT_ENV_VAR, String::new());
        assert!(matches!(
            load(&env),
            Err(ConfigError::MissingVar(MESSAGE_LIMIT_ENV_VAR))
        ));
    }

    #[test]
    fn missing_vars_are_reported_before_parse_errors() {
        let mut env = valid_env();
        env.insert(API_KEYS_ENV_VAR, "not json".to_string());
        env.remove(MESSAGE_LIMIT_ENV_VAR);
        assert!(matches!(load(&env), Err(ConfigError::MissingVar(_))));
    }

    #[test]
    fn rejects_malformed_token_table() {
        let mut env = valid_env();
        env.insert(API_KEYS_ENV_VAR, "totally-not-valid-json-scrub".to_string());
        let err = load(&env).unwrap_err();
        assert!(
            err.to_string()
                .starts_with("VALID_API_KEYS failed to json unmarshal")
        );
    }

    #[test]
    fn rejects_non_numeric_message_limit() {
        let mut env = valid_env();
        env.insert(MESSAGE_LIMIT_ENV_VAR, "{}".to_string());
        let err = load(&env).unwrap_err().to_string();
        assert!(err.starts_with("message limit configuration invalid"));
        assert!(err.contains(r#"parsing "{}""#));
    }

    #[test]
    fn rejects_zero_message_limit() {
        let mut env = valid_env();
        env.insert(MESSAGE_LIMIT_ENV_VAR, "0".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::InvalidMessageLimit { .. })
        ));
    }

    #[test]
    fn rejects_port_outside_u16() {
        for raw in ["-2000", "70000", "http"] {
            let mut env = valid_env();
            env.insert(PORT_ENV_VAR, raw.to_string());
            assert!(matches!(load(&env), Err(ConfigError::InvalidPort { .. })));
        }
    }

    #[test]
    fn optional_settings_are_read() {
        let mut env = valid_env();
        env.insert(
            PLATFORM_DESCRIPTOR_ENV_VAR,
            r#"{"application_name":"receiver"}"#.to_string(),
        );
        env.insert(HTTP_WORKERS_ENV_VAR, "3".to_string());
        let config = load(&env).unwrap();
        assert_eq!(
            config.platform_descriptor.as_deref(),
            Some(r#"{"application_name":"receiver"}"#)
        );
        assert_eq!(config.http_workers, 3);
    }

    #[test]
    fn invalid_worker_count_falls_back_to_default() {
        let mut env = valid_env();
        env.insert(HTTP_WORKERS_ENV_VAR, "0".to_string());
        assert_eq!(load(&env).unwrap().http_workers, default_http_workers());
    }
}
