use ::config::{Config, Environment};
use dotenv::dotenv;
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] ::config::ConfigError),
    #[error("DATABASE_URL must be set when STORAGE=postgres")]
    MissingDatabaseUrl,
    #[error("invalid listen address {0}")]
    InvalidAddress(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    Postgres,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageKind,
    pub database_url: Option<String>,
    pub seed_sample_data: bool,
}

impl AppConfig {
    /// Reads `.env` if present, then layers process environment variables
    /// (`HOST`, `PORT`, `STORAGE`, `DATABASE_URL`, `SEED_SAMPLE_DATA`) over
    /// the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_env(Environment::default())
    }

    fn from_env(env: Environment) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 5000)?
            .set_default("storage", "memory")?
            .set_default("seed_sample_data", true)?
            .add_source(env.try_parsing(true))
            .build()?;
        let config: AppConfig = settings.try_deserialize()?;
        if config.storage == StorageKind::Postgres && config.database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        Ok(config)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::default().source(Some(map))
    }

    #[test]
    fn defaults_apply_without_env() {
        let config = AppConfig::from_env(env(&[])).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5000);
        assert_eq!(config.storage, StorageKind::Memory);
        assert!(config.seed_sample_data);
        assert!(config.database_url.is_none());
        assert_eq!(config.listen_addr().unwrap().port(), 5000);
    }

    #[test]
    fn env_overrides_defaults() {
        let config = AppConfig::from_env(env(&[
            ("PORT", "8080"),
            ("HOST", "0.0.0.0"),
            ("SEED_SAMPLE_DATA", "false"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert!(!config.seed_sample_data);
        assert_eq!(config.listen_addr().unwrap().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn postgres_requires_database_url() {
        let err = AppConfig::from_env(env(&[("STORAGE", "postgres")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDatabaseUrl));

        let config = AppConfig::from_env(env(&[
            ("STORAGE", "postgres"),
            ("DATABASE_URL", "postgres://localhost/dao"),
        ]))
        .unwrap();
        assert_eq!(config.storage, StorageKind::Postgres);
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(AppConfig::from_env(env(&[("PORT", "not-a-port")])).is_err());
    }
}
