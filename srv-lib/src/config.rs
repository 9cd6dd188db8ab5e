//! Process configuration, read once at startup from the environment.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_KEY_PREFIX: &str = "burnlink:";
pub const DEFAULT_MAX_SIZE: usize = 64 * 1024;
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Value of `DATABASE_URL` that selects the in-process store.
pub const MEMORY_STORE_URL: &str = "memory://";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreConfig {
    Memory,
    Postgres(DatabaseConfig),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub tls: bool,
    /// Extra root certificate, for self signed database servers.
    pub cert_location: Option<PathBuf>,
    pub connect_timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub address: String,
    pub port: u16,
    pub store: StoreConfig,
    pub key_prefix: String,
    pub store_timeout: Duration,
    pub max_size: usize,
    pub link: LinkConfig,
}

/// Presentation settings for the links handed back to senders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkConfig {
    pub host_override: Option<String>,
    pub url_prefix: String,
    pub https: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let store_timeout = Duration::from_secs(parse_nonzero(
            &var,
            "STORE_TIMEOUT_SECS",
            DEFAULT_STORE_TIMEOUT.as_secs(),
        )?);

        let url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let store = if url == MEMORY_STORE_URL {
            StoreConfig::Memory
        } else {
            StoreConfig::Postgres(DatabaseConfig {
                url,
                pool_size: parse_nonzero(&var, "POOL_SIZE", DEFAULT_POOL_SIZE)?,
                tls: parse_bool(&var, "DATABASE_TLS", true)?,
                cert_location: var("CERT_LOCATION").map(PathBuf::from),
                connect_timeout: store_timeout,
            })
        };

        // Links are https only when NO_SSL is explicitly false.
        let https = !parse_bool(&var, "NO_SSL", true)?;

        Ok(Self {
            address: var("ADDRESS").unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            port: parse_or(&var, "PORT", DEFAULT_PORT)?,
            store,
            key_prefix: lookup("KEY_PREFIX").unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            store_timeout,
            max_size: parse_or(&var, "MAX_SIZE", DEFAULT_MAX_SIZE)?,
            link: LinkConfig {
                host_override: var("HOST_OVERRIDE"),
                url_prefix: var("URL_PREFIX").unwrap_or_default(),
                https,
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn parse_nonzero<T: std::str::FromStr + Default + PartialEq>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    let value = parse_or(var, name, default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
        });
    }
    Ok(value)
}

fn parse_bool(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn database_url_is_required() {
        assert_eq!(config(&[]), Err(ConfigError::Missing("DATABASE_URL")));
        assert_eq!(
            config(&[("DATABASE_URL", "")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        );
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("DATABASE_URL", "postgres://localhost/burnlink")]).unwrap();
        assert_eq!(cfg.address, DEFAULT_ADDRESS);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.key_prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(cfg.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(cfg.store_timeout, DEFAULT_STORE_TIMEOUT);
        assert_eq!(cfg.link, LinkConfig::default());

        let StoreConfig::Postgres(db) = cfg.store else {
            panic!("expected postgres store");
        };
        assert_eq!(db.pool_size, DEFAULT_POOL_SIZE);
        assert!(db.tls);
        assert_eq!(db.cert_location, None);
    }

    #[test]
    fn memory_url_selects_memory_store() {
        let cfg = config(&[("DATABASE_URL", MEMORY_STORE_URL)]).unwrap();
        assert_eq!(cfg.store, StoreConfig::Memory);
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("DATABASE_URL", "postgres://db/burnlink"),
            ("ADDRESS", "0.0.0.0"),
            ("PORT", "5000"),
            ("KEY_PREFIX", ""),
            ("HOST_OVERRIDE", "secrets.example.com"),
            ("URL_PREFIX", "/share"),
            ("NO_SSL", "false"),
            ("MAX_SIZE", "1024"),
            ("STORE_TIMEOUT_SECS", "2"),
            ("POOL_SIZE", "3"),
            ("DATABASE_TLS", "no"),
            ("CERT_LOCATION", "/etc/ssl/db.pem"),
        ])
        .unwrap();

        assert_eq!(cfg.address, "0.0.0.0");
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.key_prefix, "");
        assert_eq!(cfg.max_size, 1024);
        assert_eq!(cfg.store_timeout, Duration::from_secs(2));
        assert_eq!(
            cfg.link,
            LinkConfig {
                host_override: Some("secrets.example.com".into()),
                url_prefix: "/share".into(),
                https: true,
            }
        );
        assert_eq!(
            cfg.store,
            StoreConfig::Postgres(DatabaseConfig {
                url: "postgres://db/burnlink".into(),
                pool_size: 3,
                tls: false,
                cert_location: Some(PathBuf::from("/etc/ssl/db.pem")),
                connect_timeout: Duration::from_secs(2),
            })
        );
    }

    #[test]
    fn malformed_numbers_are_errors() {
        assert_eq!(
            config(&[("DATABASE_URL", MEMORY_STORE_URL), ("PORT", "http")]),
            Err(ConfigError::Invalid {
                name: "PORT",
                value: "http".into()
            })
        );
        assert!(config(&[("DATABASE_URL", MEMORY_STORE_URL), ("NO_SSL", "maybe")]).is_err());
        assert!(config(&[("DATABASE_URL", MEMORY_STORE_URL), ("STORE_TIMEOUT_SECS", "0")]).is_err());
        assert!(config(&[("DATABASE_URL", "postgres://db/x"), ("POOL_SIZE", "0")]).is_err());
    }
}
