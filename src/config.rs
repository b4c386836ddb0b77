use crate::engine::lots::OversellMode;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub oversell_mode: OversellMode,
    pub reinvest_grace_hours: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let oversell_raw = env_map
            .get("OVERSELL_MODE")
            .map(|s| s.as_str())
            .unwrap_or("short");
        let oversell_mode = OversellMode::parse(oversell_raw).ok_or_else(|| {
            ConfigError::InvalidValue(
                "OVERSELL_MODE".to_string(),
                format!("must be short or reject, got {}", oversell_raw),
            )
        })?;

        let reinvest_grace_hours = env_map
            .get("REINVEST_GRACE_HOURS")
            .map(|s| s.as_str())
            .unwrap_or("48")
            .parse::<i64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "REINVEST_GRACE_HOURS".to_string(),
                    "must be a valid i64".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            oversell_mode,
            reinvest_grace_hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.oversell_mode, OversellMode::Short);
        assert_eq!(config.reinvest_grace_hours, 48);
    }

    #[test]
    fn test_missing_database_path() {
        let result = Config::from_env_map(HashMap::new());
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_oversell_mode() {
        let mut env_map = setup_required_env();
        env_map.insert("OVERSELL_MODE".to_string(), "panic".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "OVERSELL_MODE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_reject_mode_parses() {
        let mut env_map = setup_required_env();
        env_map.insert("OVERSELL_MODE".to_string(), "reject".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.oversell_mode, OversellMode::Reject);
    }
}
