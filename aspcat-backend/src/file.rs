//! JSON file backend.
//!
//! The whole catalog lives in one JSON file. Writes go through a
//! replace-on-write sequence: the live file is renamed to a backup, the new
//! contents are written to a temp file under an exclusive advisory lock,
//! fsynced, and renamed into place. Readers take a shared advisory lock, so
//! a reader never observes a half-written file even across processes. A
//! re-entrant in-process mutex serializes read-modify-write cycles inside
//! one process.

use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use fs2::FileExt;
use log::{debug, warn};
use parking_lot::ReentrantMutex;

use aspcat_catalog::{
    Catalog, ObjectRecord, ObjectType, QueryFilter, QueryRow, SearchHit, SortKey, run_query,
    run_search,
};

use crate::clock;
use crate::config::FileBackendConfig;
use crate::contract::{
    BackendError, BulkOperation, BulkOutcome, CatalogBackend, CatalogStatistics, HealthReport,
    ImportStats,
};

pub struct FileBackend {
    file_path: PathBuf,
    backup_path: PathBuf,
    lock: ReentrantMutex<()>,
}

impl FileBackend {
    /// Open the backend, creating the parent directory and an empty
    /// catalog file when missing.
    pub fn open(config: &FileBackendConfig) -> Result<Self, BackendError> {
        let backend = Self {
            file_path: config.file_path.clone(),
            backup_path: config.backup_path(),
            lock: ReentrantMutex::new(()),
        };
        if let Some(parent) = backend.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if !backend.file_path.exists() {
            backend.save(&Catalog::new())?;
        }
        Ok(backend)
    }

    /// Read the catalog under a shared lock. A missing file or unparsable
    /// contents degrade to an empty catalog rather than an error, so a
    /// corrupted store stays serviceable.
    fn load(&self) -> Result<Catalog, BackendError> {
        let _guard = self.lock.lock();
        let mut file = match File::open(&self.file_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Catalog::new());
            }
            Err(e) => return Err(e.into()),
        };
        file.lock_shared()?;
        let mut contents = String::new();
        let read_result = file.read_to_string(&mut contents);
        let _ = FileExt::unlock(&file);
        read_result?;
        match serde_json::from_str(&contents) {
            Ok(catalog) => Ok(catalog),
            Err(e) => {
                warn!(
                    "catalog file {} is not valid JSON ({e}), treating as empty",
                    self.file_path.display()
                );
                Ok(Catalog::new())
            }
        }
    }

    /// Persist the catalog atomically. On any failure after the live file
    /// was moved aside, the backup is moved back.
    fn save(&self, catalog: &Catalog) -> Result<(), BackendError> {
        let _guard = self.lock.lock();

        let had_previous = self.file_path.exists();
        if had_previous {
            std::fs::rename(&self.file_path, &self.backup_path)?;
        }

        match self.write_replacement(catalog) {
            Ok(()) => {
                if had_previous {
                    if let Err(e) = std::fs::remove_file(&self.backup_path) {
                        warn!(
                            "could not remove backup {}: {e}",
                            self.backup_path.display()
                        );
                    }
                }
                Ok(())
            }
            Err(e) => {
                if had_previous {
                    if let Err(restore) = std::fs::rename(&self.backup_path, &self.file_path) {
                        warn!(
                            "could not restore backup {}: {restore}",
                            self.backup_path.display()
                        );
                    }
                }
                Err(e)
            }
        }
    }

    fn write_replacement(&self, catalog: &Catalog) -> Result<(), BackendError> {
        let tmp_path = {
            let mut path = self.file_path.clone().into_os_string();
            path.push(".tmp");
            PathBuf::from(path)
        };
        let contents = serde_json::to_string_pretty(catalog)?;
        {
            let mut file = File::create(&tmp_path)?;
            file.lock_exclusive()?;
            file.write_all(contents.as_bytes())?;
            file.flush()?;
            file.sync_all()?;
            FileExt::unlock(&file)?;
        }
        std::fs::rename(&tmp_path, &self.file_path)?;
        debug!("wrote catalog file {}", self.file_path.display());
        Ok(())
    }

    fn apply_bulk(catalog: &mut Catalog, operations: &[BulkOperation]) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for operation in operations {
            if let Err(e) = operation.validate() {
                warn!("skipping bulk entry: {e}");
                outcome.errors += 1;
                continue;
            }
            match operation {
                BulkOperation::Update {
                    volume,
                    library,
                    object_name,
                    attributes,
                } => {
                    if catalog.update_object(volume, library, object_name, attributes.clone()) {
                        outcome.created += 1;
                    } else {
                        outcome.updated += 1;
                    }
                }
                BulkOperation::Delete {
                    volume,
                    library,
                    object_name,
                } => {
                    // Deleting a missing object is a no-op, not an error.
                    if catalog.delete_object(volume, library, object_name) {
                        outcome.deleted += 1;
                    }
                }
            }
        }
        outcome
    }
}

impl CatalogBackend for FileBackend {
    fn name(&self) -> &'static str {
        "json_file"
    }

    fn get_all_objects(&self) -> Result<Catalog, BackendError> {
        self.load()
    }

    fn get_object(
        &self,
        volume: &str,
        library: &str,
        object_name: &str,
    ) -> Result<Option<ObjectRecord>, BackendError> {
        Ok(self.load()?.get(volume, library, object_name).cloned())
    }

    fn update_object(
        &self,
        volume: &str,
        library: &str,
        object_name: &str,
        record: ObjectRecord,
    ) -> Result<(), BackendError> {
        let _guard = self.lock.lock();
        let mut catalog = self.load()?;
        catalog.update_object(volume, library, object_name, record);
        self.save(&catalog)
    }

    fn delete_object(
        &self,
        volume: &str,
        library: &str,
        object_name: &str,
    ) -> Result<bool, BackendError> {
        let _guard = self.lock.lock();
        let mut catalog = self.load()?;
        if !catalog.delete_object(volume, library, object_name) {
            return Ok(false);
        }
        self.save(&catalog)?;
        Ok(true)
    }

    fn query_objects(
        &self,
        filter: &QueryFilter,
        sort: &[SortKey],
        limit: Option<usize>,
    ) -> Result<Vec<QueryRow>, BackendError> {
        Ok(run_query(&self.load()?, filter, sort, limit))
    }

    fn search_objects(
        &self,
        query: &str,
        type_filter: Option<ObjectType>,
    ) -> Result<Vec<SearchHit>, BackendError> {
        Ok(run_search(&self.load()?, query, type_filter))
    }

    fn bulk_operations(&self, operations: &[BulkOperation]) -> Result<BulkOutcome, BackendError> {
        let _guard = self.lock.lock();
        let mut catalog = self.load()?;
        let outcome = Self::apply_bulk(&mut catalog, operations);
        self.save(&catalog)?;
        Ok(outcome)
    }

    fn get_statistics(&self) -> Result<CatalogStatistics, BackendError> {
        let catalog = self.load()?;
        let today = clock::utc_today_start();
        let recent_updates = catalog
            .iter_objects()
            .filter(|(_, _, _, record)| {
                record
                    .updated
                    .as_deref()
                    .map(|updated| updated >= today.as_str())
                    .unwrap_or(false)
            })
            .count() as u64;
        let file_size_bytes = std::fs::metadata(&self.file_path).map(|m| m.len()).ok();
        Ok(CatalogStatistics {
            backend: self.name().to_string(),
            total_objects: catalog.object_count() as u64,
            volumes: catalog.volume_count() as u64,
            libraries: catalog.library_count() as u64,
            objects_by_type: catalog.objects_by_type(),
            recent_updates,
            file_size_bytes,
            pool_connections: None,
            timestamp: clock::utc_now(),
        })
    }

    fn import_catalog(&self, data: Catalog, merge: bool) -> Result<ImportStats, BackendError> {
        let _guard = self.lock.lock();
        let incoming_stats = ImportStats {
            volumes: data.volume_count() as u64,
            libraries: data.library_count() as u64,
            objects: data.object_count() as u64,
            errors: 0,
        };
        let catalog = if merge {
            let mut existing = self.load()?;
            existing.merge_from(data);
            existing
        } else {
            data
        };
        self.save(&catalog)?;
        Ok(incoming_stats)
    }

    fn health_check(&self) -> HealthReport {
        let catalog = match self.load() {
            Ok(catalog) => catalog,
            Err(e) => return HealthReport::unhealthy(self.name(), e.to_string()),
        };
        // Prove the directory is writable, not just readable.
        let probe_path = {
            let mut path = self.file_path.clone().into_os_string();
            path.push(".health");
            PathBuf::from(path)
        };
        if let Err(e) = std::fs::write(&probe_path, b"ok") {
            return HealthReport::unhealthy(self.name(), e.to_string());
        }
        let _ = std::fs::remove_file(&probe_path);
        HealthReport::healthy(self.name(), catalog.object_count() as u64)
    }

    fn close(&self) {}
}
