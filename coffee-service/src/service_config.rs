use std::{env::VarError, str::FromStr, time::Duration};

use thiserror::Error;

const LOOKUP_DELAY_VAR: &str = "COFFEE_LOOKUP_DELAY_MS";
const POOL_SIZE_VAR: &str = "COFFEE_POOL_SIZE";
const POOL_NAME_VAR: &str = "COFFEE_POOL_NAME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    // How long every call to the price backend blocks its worker.
    pub lookup_delay: Duration,
    // Number of worker threads in the shared price pool.
    pub pool_size: usize,
    // Prefix for the pool's thread names.
    pub pool_name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a whole number, got {value:?}")]
    NotANumber { var: &'static str, value: String },

    #[error("{0} must be at least 1")]
    Zero(&'static str),

    #[error("{0} is not valid unicode")]
    NotUnicode(&'static str),
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            lookup_delay: Duration::from_secs(1),
            pool_size: 10,
            pool_name: "price-pool".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var))
    }

    /// Builds a config from `lookup`, falling back to the defaults for unset variables.
    ///
    /// `lookup` answers like [`std::env::var`]; a value that is set but not
    /// unicode is an error rather than a silent default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let mut config = Self::default();

        if let Some(value) = read_var(&lookup, LOOKUP_DELAY_VAR)? {
            config.lookup_delay = Duration::from_millis(parse_number(LOOKUP_DELAY_VAR, &value)?);
        }

        if let Some(value) = read_var(&lookup, POOL_SIZE_VAR)? {
            let pool_size: usize = parse_number(POOL_SIZE_VAR, &value)?;
            if pool_size == 0 {
                return Err(ConfigError::Zero(POOL_SIZE_VAR));
            }
            config.pool_size = pool_size;
        }

        if let Some(value) = read_var(&lookup, POOL_NAME_VAR)? {
            let value = value.trim();
            if !value.is_empty() {
                config.pool_name = value.to_string();
            }
        }

        Ok(config)
    }
}

fn read_var<F>(lookup: &F, var: &'static str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    match lookup(var) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode(var)),
    }
}

fn parse_number<N: FromStr>(var: &'static str, value: &str) -> Result<N, ConfigError> {
    value
        .trim()
        .parse::<N>()
        .map_err(|_| ConfigError::NotANumber {
            var,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, ffi::OsString};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, VarError> {
        let vars = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |var| vars.get(var).cloned().ok_or(VarError::NotPresent)
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = ServiceConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.lookup_delay, Duration::from_secs(1));
        assert_eq!(config.pool_size, 10);
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("COFFEE_LOOKUP_DELAY_MS", "250"),
            ("COFFEE_POOL_SIZE", " 1 "),
            ("COFFEE_POOL_NAME", "bar"),
        ]))
        .unwrap();

        assert_eq!(config.lookup_delay, Duration::from_millis(250));
        assert_eq!(config.pool_size, 1);
        assert_eq!(config.pool_name, "bar");
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let error =
            ServiceConfig::from_lookup(lookup_from(&[("COFFEE_LOOKUP_DELAY_MS", "soon")]))
                .unwrap_err();
        assert_eq!(
            error,
            ConfigError::NotANumber {
                var: "COFFEE_LOOKUP_DELAY_MS",
                value: "soon".to_string()
            }
        );

        let error =
            ServiceConfig::from_lookup(lookup_from(&[("COFFEE_POOL_SIZE", "0")])).unwrap_err();
        assert_eq!(error, ConfigError::Zero("COFFEE_POOL_SIZE"));
    }

    #[test]
    fn test_blank_pool_name_keeps_default() {
        let config =
            ServiceConfig::from_lookup(lookup_from(&[("COFFEE_POOL_NAME", "  ")])).unwrap();
        assert_eq!(config.pool_name, "price-pool");
    }

    #[test]
    fn test_pool_size_beyond_usize_is_rejected() {
        let too_big = format!("{}0", usize::MAX);
        let error = ServiceConfig::from_lookup(lookup_from(&[("COFFEE_POOL_SIZE", too_big.as_str())]))
            .unwrap_err();
        assert_eq!(
            error,
            ConfigError::NotANumber {
                var: "COFFEE_POOL_SIZE",
                value: too_big
            }
        );
    }

    #[test]
    fn test_non_unicode_value_is_an_error() {
        let error = ServiceConfig::from_lookup(|var| match var {
            "COFFEE_POOL_NAME" => Err(VarError::NotUnicode(OsString::from("caf\u{e9}"))),
            _ => Err(VarError::NotPresent),
        })
        .unwrap_err();
        assert_eq!(error, ConfigError::NotUnicode("COFFEE_POOL_NAME"));
        assert_eq!(error.to_string(), "COFFEE_POOL_NAME is not valid unicode");
    }
}
