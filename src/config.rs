// Settings loading: defaults, optional config.toml, then APP_* environment variables.
// Nested keys use a double underscore, e.g. APP_SESSION__TIMEOUT_SECS=900.

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::store;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_address: String,
    // Base URL of the booking backend, without a trailing slash
    pub backend_url: String,
    // When set, visitor storage is kept on disk instead of in memory
    pub storage_dir: Option<String>,
    pub session: SessionSettings,
    pub defaults: SearchDefaults,
    pub storage_keys: StorageKeys,
    pub search_cache: SearchCacheSettings,
    pub memory_storage: MemoryStorageSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub timeout_secs: u64,
}

impl SessionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchDefaults {
    pub currency: String,
    pub nationality: String,
}

/// Names of the visitor-scoped storage entries written by the booking flow.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageKeys {
    pub hotel_info: String,
    pub room_info: String,
    pub selected_hotel: String,
    pub session_start: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            hotel_info: "booking_hotel_info".to_string(),
            room_info: "booking_room_info".to_string(),
            selected_hotel: "booking_selected_hotel".to_string(),
            session_start: "booking_session_start_time".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchCacheSettings {
    pub ttl_secs: u64,
    pub size: usize,
}

/// Bounds of the in-memory visitor storage. `ttl_secs` should outlast a session.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryStorageSettings {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for MemoryStorageSettings {
    fn default() -> Self {
        Self {
            capacity: store::DEFAULT_MEMORY_CAPACITY,
            ttl_secs: store::DEFAULT_MEMORY_TTL_SECS,
        }
    }
}

pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 1800;

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let keys = StorageKeys::default();
        let builder = Config::builder()
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("backend_url", "http://127.0.0.1:8000")?
            .set_default("session.timeout_secs", DEFAULT_SESSION_TIMEOUT_SECS as i64)?
            .set_default("defaults.currency", "USD")?
            .set_default("defaults.nationality", "NG")?
            .set_default("storage_keys.hotel_info", keys.hotel_info)?
            .set_default("storage_keys.room_info", keys.room_info)?
            .set_default("storage_keys.selected_hotel", keys.selected_hotel)?
            .set_default("storage_keys.session_start", keys.session_start)?
            .set_default("search_cache.ttl_secs", 600)?
            .set_default("search_cache.size", 256)?
            .set_default("memory_storage.capacity", store::DEFAULT_MEMORY_CAPACITY as i64)?
            .set_default("memory_storage.ttl_secs", store::DEFAULT_MEMORY_TTL_SECS as i64)?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.backend_url = settings.backend_url.trim_end_matches('/').to_string();
        Ok(settings)
    }

    /// Settings for tests and embedding: everything at its default, pointed at `backend_url`.
    pub fn with_backend(backend_url: &str) -> Self {
        Self {
            server_address: "127.0.0.1:0".to_string(),
            backend_url: backend_url.trim_end_matches('/').to_string(),
            storage_dir: None,
            session: SessionSettings { timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS },
            defaults: SearchDefaults {
                currency: "USD".to_string(),
                nationality: "NG".to_string(),
            },
            storage_keys: StorageKeys::default(),
            search_cache: SearchCacheSettings { ttl_secs: 600, size: 256 },
            memory_storage: MemoryStorageSettings::default(),
        }
    }
}
