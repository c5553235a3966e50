//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use whist::{ConfigError, ServerConfig, config};

/// Listen address variable
pub const ADDRESS_VAR: &str = "WHIST_ADDRESS";
/// Listen port variable
pub const PORT_VAR: &str = "WHIST_PORT";
/// Seat count variable
pub const CAPACITY_VAR: &str = "WHIST_CAPACITY";
/// Accept backlog variable
pub const BACKLOG_VAR: &str = "WHIST_BACKLOG";

/// Values given on the command line. Each one wins over its environment
/// variable.
#[derive(Debug, Default)]
pub struct Overrides {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub capacity: Option<usize>,
    pub backlog: Option<u32>,
}

/// Load configuration from environment variables
///
/// # Errors
///
/// Returns error if a variable is set but can't be parsed, or if the
/// resulting configuration is invalid
pub fn from_env(overrides: Overrides) -> Result<ServerConfig, ConfigError> {
    from_lookup(overrides, |key| std::env::var(key).ok())
}

/// Load configuration through `lookup` instead of the process environment
///
/// # Errors
///
/// Returns error if a variable is set but can't be parsed, or if the
/// resulting configuration is invalid
pub fn from_lookup<F>(overrides: Overrides, lookup: F) -> Result<ServerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let address = overrides
        .address
        .or_else(|| lookup(ADDRESS_VAR))
        .unwrap_or_else(|| config::DEFAULT_ADDRESS.to_string());

    let port = match overrides.port {
        Some(port) => port,
        None => parse_var_or(&lookup, PORT_VAR, config::DEFAULT_PORT)?,
    };
    let capacity = match overrides.capacity {
        Some(capacity) => capacity,
        None => parse_var_or(&lookup, CAPACITY_VAR, config::DEFAULT_CAPACITY)?,
    };
    let backlog = match overrides.backlog {
        Some(backlog) => backlog,
        None => parse_var_or(&lookup, BACKLOG_VAR, config::DEFAULT_BACKLOG)?,
    };

    let config = ServerConfig {
        address,
        port,
        capacity,
        backlog,
    };
    config.validate()?;
    Ok(config)
}

/// Helper to parse a variable with default fallback when it is unset
fn parse_var_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("{value:?}: {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = from_lookup(Overrides::default(), lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_env_values() {
        let config = from_lookup(
            Overrides::default(),
            lookup(&[
                (ADDRESS_VAR, "127.0.0.1"),
                (PORT_VAR, "2222"),
                (CAPACITY_VAR, "3"),
                (BACKLOG_VAR, "16"),
            ]),
        )
        .unwrap();
        assert_eq!(config.address, "127.0.0.1");
        assert_eq!(config.port, 2222);
        assert_eq!(config.capacity, 3);
        assert_eq!(config.backlog, 16);
    }

    #[test]
    fn test_overrides_win() {
        let overrides = Overrides {
            port: Some(3333),
            capacity: Some(2),
            ..Overrides::default()
        };
        let config = from_lookup(
            overrides,
            lookup(&[(PORT_VAR, "2222"), (CAPACITY_VAR, "not a number")]),
        )
        .unwrap();
        assert_eq!(config.port, 3333);
        assert_eq!(config.capacity, 2);
    }

    #[test]
    fn test_invalid_port() {
        let err = from_lookup(Overrides::default(), lookup(&[(PORT_VAR, "70000")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == PORT_VAR));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err =
            from_lookup(Overrides::default(), lookup(&[(CAPACITY_VAR, "0")])).unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }
}
