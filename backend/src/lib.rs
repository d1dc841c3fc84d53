use std::sync::Arc;

pub mod api;
pub mod config;
pub mod models;
#[cfg(feature = "postgres")]
pub mod schema;
pub mod store;
pub mod valuation;

pub use api::{app_router, AppState};

use crate::config::{AppConfig, StorageKind};
use store::{MemStorage, Storage};

/// Opens the backing store named by `config`, loading the demo content when
/// `seed_sample_data` is set.
pub fn build_storage(config: &AppConfig) -> Result<Arc<dyn Storage>, Box<dyn std::error::Error>> {
    match config.storage {
        StorageKind::Memory => {
            let store = if config.seed_sample_data {
                MemStorage::seeded()
            } else {
                MemStorage::new()
            };
            Ok(Arc::new(store))
        }
        StorageKind::Postgres => postgres_storage(config),
    }
}

#[cfg(feature = "postgres")]
fn postgres_storage(config: &AppConfig) -> Result<Arc<dyn Storage>, Box<dyn std::error::Error>> {
    let url = config
        .database_url
        .as_deref()
        .ok_or(crate::config::ConfigError::MissingDatabaseUrl)?;
    let store = store::PgStorage::connect(url)?;
    if config.seed_sample_data {
        store.load_sample_data()?;
    }
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
fn postgres_storage(_config: &AppConfig) -> Result<Arc<dyn Storage>, Box<dyn std::error::Error>> {
    Err("STORAGE=postgres requires building with the `postgres` feature".into())
}
