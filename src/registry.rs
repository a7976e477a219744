//! Cross-instance store registry and the table destroy path.
//!
//! The registry maps a location string to the handle of the adapter opened
//! for it, so the lifecycle destroy path can resolve the encoded table name
//! and backend without reaching into live adapters. It is an explicit,
//! constructor-injected object rather than process-global state; callers
//! that never destroy tables can keep a throwaway instance per open.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{BackendError, DocumentStore};
use crate::error::{Error, Result};
use crate::store::TableKvDb;

#[derive(Clone)]
struct StoreHandle {
    table: String,
    backend: Arc<dyn DocumentStore>,
}

/// Registry of opened adapters, keyed by location.
///
/// Construction and destruction of adapters may race from multiple tasks;
/// the map is mutex-guarded and never held across a backend call.
#[derive(Default)]
pub struct StoreRegistry {
    inner: Mutex<HashMap<String, StoreHandle>>,
}

impl StoreRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, location: &str, db: &TableKvDb) -> Result<()> {
        let handle = StoreHandle {
            table: db.table().to_string(),
            backend: db.backend(),
        };
        self.lock()?.insert(location.to_string(), handle);
        Ok(())
    }

    /// Whether an adapter is registered for the given location.
    pub fn contains(&self, location: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(location))
    }

    /// Deletes the backend table behind a registered location and waits for
    /// the delete to complete.
    ///
    /// Fails with [`Error::NotFound`] without contacting the backend when no
    /// adapter is registered for the location. A backend reporting the table
    /// as already gone is treated as success.
    pub async fn destroy(&self, location: &str) -> Result<()> {
        let handle = self.lock()?.get(location).cloned().ok_or(Error::NotFound)?;

        match handle.backend.delete_table(&handle.table).await {
            Ok(()) => {
                handle.backend.wait_for_table_gone(&handle.table).await?;
            }
            Err(BackendError::ResourceNotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(location = %location, table = %handle.table, "destroyed backend table");
        self.lock()?.remove(location);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, StoreHandle>>> {
        self.inner
            .lock()
            .map_err(|e| Error::Backend(e.to_string()))
    }
}
