//! Environment-driven daemon configuration.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Error raised for malformed configuration values.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An environment variable held a value that does not parse.
    #[error("invalid value {value:?} for {name}: {message}")]
    Invalid {
        /// Variable name.
        name: String,
        /// The raw value as read.
        value: String,
        /// Parser error message.
        message: String,
    },
}

/// Connection and naming configuration, read from the environment.
///
/// | Variable           | Default                 |
/// |--------------------|-------------------------|
/// | `REDIS_HOST`       | `redis`                 |
/// | `REDIS_PORT`       | `6379`                  |
/// | `REDIS_DB`         | `0`                     |
/// | `MONGO_URI`        | `mongodb://mongo:27017` |
/// | `MONGO_DB`         | `conserver`             |
/// | `MONGO_COLLECTION` | `vcon`                  |
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Source Redis host name.
    pub redis_host: String,
    /// Source Redis port.
    pub redis_port: u16,
    /// Source Redis database index.
    pub redis_db: u32,
    /// Destination MongoDB connection string.
    pub mongo_uri: String,
    /// Destination database name.
    pub mongo_db: String,
    /// Destination collection name.
    pub mongo_collection: String,
}

impl DaemonConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads configuration through `lookup`, falling back to the documented
    /// defaults for unset variables.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            redis_host: lookup("REDIS_HOST").unwrap_or_else(|| "redis".into()),
            redis_port: parsed(&lookup, "REDIS_PORT", 6379)?,
            redis_db: parsed(&lookup, "REDIS_DB", 0)?,
            mongo_uri: lookup("MONGO_URI").unwrap_or_else(|| "mongodb://mongo:27017".into()),
            mongo_db: lookup("MONGO_DB").unwrap_or_else(|| "conserver".into()),
            mongo_collection: lookup("MONGO_COLLECTION").unwrap_or_else(|| "vcon".into()),
        })
    }
}

fn parsed<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name: name.to_owned(),
            value,
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = DaemonConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.redis_host, "redis");
        assert_eq!(config.redis_port, 6379);
        assert_eq!(config.redis_db, 0);
        assert_eq!(config.mongo_uri, "mongodb://mongo:27017");
        assert_eq!(config.mongo_db, "conserver");
        assert_eq!(config.mongo_collection, "vcon");
    }

    #[test]
    fn environment_overrides() {
        let config = DaemonConfig::from_lookup(lookup_from(&[
            ("REDIS_HOST", "redis.internal"),
            ("REDIS_PORT", "6380"),
            ("REDIS_DB", "2"),
            ("MONGO_URI", "mongodb://db.internal:27017"),
            ("MONGO_DB", "conv"),
            ("MONGO_COLLECTION", "calls"),
        ]))
        .unwrap();
        assert_eq!(config.redis_host, "redis.internal");
        assert_eq!(config.redis_port, 6380);
        assert_eq!(config.redis_db, 2);
        assert_eq!(config.mongo_uri, "mongodb://db.internal:27017");
        assert_eq!(config.mongo_db, "conv");
        assert_eq!(config.mongo_collection, "calls");
    }

    #[test]
    fn invalid_numeric_value_is_an_error() {
        let result = DaemonConfig::from_lookup(lookup_from(&[("REDIS_PORT", "not-a-port")]));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("REDIS_PORT"));
        assert!(err.to_string().contains("not-a-port"));
    }

    #[test]
    fn numeric_values_are_trimmed() {
        let config =
            DaemonConfig::from_lookup(lookup_from(&[("REDIS_DB", " 3 ")])).unwrap();
        assert_eq!(config.redis_db, 3);
    }
}
