//! # Configuration
//!
//! Environment-based configuration for the player queue state storage.

use std::env;
use std::str::FromStr;

use playerq_domain::DEFAULT_DELIMITER;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::keys::KeySpace;

/// How Create/Update treat properties that cannot be indexed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParsePolicy {
    /// Store the blob anyway and index whatever scores can be read
    #[default]
    BestEffort,
    /// Reject the write
    Strict,
}

impl FromStr for ParsePolicy {
    type Err = PersistenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "best_effort" | "besteffort" => Ok(Self::BestEffort),
            "strict" => Ok(Self::Strict),
            other => Err(PersistenceError::Config(format!("unknown parse policy '{other}'"))),
        }
    }
}

/// Redis connection configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Player queue storage configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis configuration
    pub redis: RedisConfig,

    /// Prefix applied to every store key (empty for the legacy layout)
    pub key_prefix: String,

    /// Handling of malformed or non-numeric properties on write
    pub parse_policy: ParsePolicy,

    /// Separator between namespace and value in registered index names
    pub registry_delimiter: char,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            key_prefix: String::new(),
            parse_policy: ParsePolicy::default(),
            registry_delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Config`] if a variable is set to an
    /// unusable value.
    pub fn from_env() -> Result<Self, PersistenceError> {
        let defaults = Self::default();

        let parse_policy = match env::var("PLAYERQ_PARSE_POLICY") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.parse_policy,
        };

        let registry_delimiter = match env::var("PLAYERQ_REGISTRY_DELIMITER") {
            Ok(v) => single_char(&v)?,
            Err(_) => defaults.registry_delimiter,
        };

        Ok(Self {
            redis: RedisConfig {
                url: env::var("PLAYERQ_REDIS_URL").unwrap_or(defaults.redis.url),
            },
            key_prefix: env::var("PLAYERQ_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            parse_policy,
            registry_delimiter,
        })
    }

    #[must_use]
    pub fn key_space(&self) -> KeySpace {
        KeySpace::new(self.key_prefix.clone())
    }
}

fn single_char(value: &str) -> Result<char, PersistenceError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(PersistenceError::Config(format!(
            "registry delimiter must be one character, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_legacy_layout() {
        let config = Config::default();
        assert_eq!(config.redis.url, "redis://127.0.0.1:6379");
        assert_eq!(config.key_space(), KeySpace::default());
        assert_eq!(config.parse_policy, ParsePolicy::BestEffort);
        assert_eq!(config.registry_delimiter, ':');
    }

    #[test]
    fn test_parse_policy_from_str() {
        assert_eq!("strict".parse::<ParsePolicy>().unwrap(), ParsePolicy::Strict);
        assert_eq!(" Best-Effort ".parse::<ParsePolicy>().unwrap(), ParsePolicy::BestEffort);
        assert!("lenient".parse::<ParsePolicy>().is_err());
    }

    #[test]
    fn test_single_char_delimiter() {
        assert_eq!(single_char("|").unwrap(), '|');
        assert!(single_char("").is_err());
        assert!(single_char("::").is_err());
    }
}
