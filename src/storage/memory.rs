//! In-memory backend, for tests and throwaway runs.

use std::sync::Mutex;

use super::{Store, StoreBackend, StoreError};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    store: Mutex<Store>,
}

impl MemoryBackend {
    pub fn with_store(store: Store) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&self) -> Result<Store, StoreError> {
        Ok(self
            .store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn save(&self, store: &Store) -> Result<(), StoreError> {
        *self
            .store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = store.clone();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
