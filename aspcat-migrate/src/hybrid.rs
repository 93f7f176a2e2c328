//! Dual-write shim for the migration cutover window.
//!
//! Reads are served by one manager; writes fan out sequentially to every
//! write manager. A write failure on one backend is recorded and does not
//! stop the fan-out, so backends can be compared and reconciled later.

use log::{error, info};

use aspcat_backend::{BackendError, CatalogManager, ConfigStore};
use aspcat_catalog::{Catalog, ObjectRecord};

use crate::migration::MigrationError;

pub struct HybridBackend {
    read: CatalogManager,
    writes: Vec<CatalogManager>,
    write_errors: Vec<String>,
}

impl HybridBackend {
    pub fn new(read: CatalogManager, writes: Vec<CatalogManager>) -> Self {
        Self {
            read,
            writes,
            write_errors: Vec::new(),
        }
    }

    /// Build the shim from a config store with an open migration window.
    pub fn from_config_store(store: &ConfigStore) -> Result<Self, MigrationError> {
        let settings = store.migration_settings().ok_or_else(|| {
            MigrationError::Failed("migration mode is not enabled".to_string())
        })?;
        let read_config = store.backend_config(settings.read_backend).ok_or_else(|| {
            BackendError::UnknownBackend(settings.read_backend.as_str().to_string())
        })?;
        let read = CatalogManager::open(read_config)?;

        let mut writes = Vec::with_capacity(settings.write_backends.len());
        for kind in &settings.write_backends {
            let config = store
                .backend_config(*kind)
                .ok_or_else(|| BackendError::UnknownBackend(kind.as_str().to_string()))?;
            writes.push(CatalogManager::open(config)?);
        }
        info!(
            "hybrid backend: reads from '{}', writes to {} backends",
            read.backend_name(),
            writes.len()
        );
        Ok(Self::new(read, writes))
    }

    pub fn get_catalog_info(&self) -> Result<Catalog, BackendError> {
        self.read.get_catalog_info()
    }

    pub fn get_object(
        &self,
        volume: &str,
        library: &str,
        object_name: &str,
    ) -> Result<Option<ObjectRecord>, BackendError> {
        self.read.get_object(volume, library, object_name)
    }

    /// Write to every backend. Returns `true` only when all writes landed.
    pub fn update_catalog_info(
        &mut self,
        volume: &str,
        library: &str,
        object_name: &str,
        record: ObjectRecord,
    ) -> bool {
        self.write_errors.clear();
        let mut all_ok = true;
        for manager in &self.writes {
            if let Err(e) =
                manager.update_catalog_info(volume, library, object_name, record.clone())
            {
                let message = format!(
                    "write of {volume}.{library}.{object_name} to '{}' failed: {e}",
                    manager.backend_name()
                );
                error!("{message}");
                self.write_errors.push(message);
                all_ok = false;
            }
        }
        all_ok
    }

    /// Delete from every backend. Returns `true` only when no backend
    /// errored; a miss on one backend is not an error.
    pub fn delete_catalog_entry(
        &mut self,
        volume: &str,
        library: &str,
        object_name: &str,
    ) -> bool {
        self.write_errors.clear();
        let mut all_ok = true;
        for manager in &self.writes {
            if let Err(e) = manager.delete_catalog_entry(volume, library, object_name) {
                let message = format!(
                    "delete of {volume}.{library}.{object_name} from '{}' failed: {e}",
                    manager.backend_name()
                );
                error!("{message}");
                self.write_errors.push(message);
                all_ok = false;
            }
        }
        all_ok
    }

    /// Failures from the most recent write operation.
    pub fn get_write_errors(&self) -> &[String] {
        &self.write_errors
    }

    pub fn close(&self) {
        self.read.close();
        for manager in &self.writes {
            manager.close();
        }
    }
}
