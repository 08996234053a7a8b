use std::sync::Arc;

use tracing::info;

use shared_config::{AppConfig, StorageBackend};
use shared_database::{
    FileStorage, MemoryFileStorage, MemoryStore, RecordStore, SupabaseClient, SupabaseFileStorage,
};

use crate::locks::KeyedLocks;
use crate::notify::{BookingNotifier, LogNotifier, WebhookNotifier};

/// Shared by every router; collaborators sit behind trait objects so tests
/// can swap in the in-memory versions.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn RecordStore>,
    pub files: Arc<dyn FileStorage>,
    pub notifier: Arc<dyn BookingNotifier>,
    pub locks: Arc<KeyedLocks>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn RecordStore>,
        files: Arc<dyn FileStorage>,
        notifier: Arc<dyn BookingNotifier>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            files,
            notifier,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn from_config(config: AppConfig) -> Self {
        let (store, files): (Arc<dyn RecordStore>, Arc<dyn FileStorage>) =
            match config.storage_backend {
                StorageBackend::Supabase => {
                    info!("Using Supabase record store at {}", config.supabase_url);
                    let client = Arc::new(SupabaseClient::new(&config));
                    let files = SupabaseFileStorage::new(client.clone(), &config.supabase_storage_bucket);
                    let store: Arc<dyn RecordStore> = client;
                    let files: Arc<dyn FileStorage> = Arc::new(files);
                    (store, files)
                }
                StorageBackend::Memory => {
                    info!("Using in-memory record store");
                    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
                    let files: Arc<dyn FileStorage> = Arc::new(MemoryFileStorage::new());
                    (store, files)
                }
            };

        let notifier: Arc<dyn BookingNotifier> = match &config.notification_webhook_url {
            Some(url) => {
                info!("Booking notifications go to {}", url);
                Arc::new(WebhookNotifier::new(url))
            }
            None => Arc::new(LogNotifier),
        };

        Self::new(config, store, files, notifier)
    }
}
