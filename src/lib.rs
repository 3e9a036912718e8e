use axum::{extract::FromRef, Router};
use cached::TimedSizedCache;
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;

pub mod backend;
pub mod cache;
pub mod config;
pub mod criteria;
pub mod error;
pub mod flow;
pub mod guest;
pub mod models;
pub mod pricing;
pub mod remarks;
pub mod routes;
pub mod session;
pub mod store;

use crate::{
    backend::HotelBackend,
    cache::BookingCache,
    config::Settings,
    models::HotelSearchPage,
    routes::Visitor,
    session::SharedClock,
    store::{FileStorage, MemoryStorage, PersistenceStore, StorageBackend},
};

/// Recent search pages, keyed by criteria query plus page number.
pub type SearchCache = Arc<Mutex<TimedSizedCache<String, HotelSearchPage>>>;

// Define the application state struct
#[derive(Clone, FromRef)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub backend: Arc<dyn HotelBackend>,
    pub storage: Arc<dyn StorageBackend>,
    pub clock: SharedClock,
    pub search_cache: SearchCache,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        backend: Arc<dyn HotelBackend>,
        storage: Arc<dyn StorageBackend>,
        clock: SharedClock,
    ) -> Self {
        let search_cache = TimedSizedCache::with_size_and_lifespan(
            settings.search_cache.size.max(1),
            settings.search_cache.ttl_secs,
        );
        Self {
            settings,
            backend,
            storage,
            clock,
            search_cache: Arc::new(Mutex::new(search_cache)),
        }
    }

    /// The booking cache scoped to one visitor.
    pub fn booking_cache(&self, visitor: &Visitor) -> BookingCache {
        BookingCache::new(
            PersistenceStore::new(Arc::clone(&self.storage), visitor.id()),
            self.settings.storage_keys.clone(),
        )
    }
}

/// Bounded memory storage unless `storage_dir` is configured.
pub fn storage_from_settings(settings: &Settings) -> anyhow::Result<Arc<dyn StorageBackend>> {
    Ok(match settings.storage_dir.as_deref() {
        Some(dir) if !dir.trim().is_empty() => {
            tracing::info!(dir, "Keeping visitor storage on disk");
            Arc::new(FileStorage::new(dir)?)
        }
        _ => {
            let limits = &settings.memory_storage;
            if limits.ttl_secs < settings.session.timeout_secs {
                tracing::warn!(
                    ttl_secs = limits.ttl_secs,
                    timeout_secs = settings.session.timeout_secs,
                    "Visitor storage forgets entries before a session can time out"
                );
            }
            Arc::new(MemoryStorage::with_limits(limits.capacity, limits.ttl_secs))
        }
    })
}

pub fn create_app(state: AppState) -> Router {
    routes::create_router(state).layer(TraceLayer::new_for_http())
}
