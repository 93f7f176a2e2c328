//! The catalog facade: one backend plus a cache, behind a stable API.
//!
//! The manager owns timestamp stamping (CREATED once, UPDATED always) and
//! the cache-aside protocol: reads consult the cache first, writes
//! invalidate. Legacy helpers at the bottom keep old call sites working
//! with defaulted attributes instead of errors.

use std::path::Path;
use std::time::Duration;

use log::{info, warn};

use aspcat_catalog::{
    Catalog, DatasetAttrs, ObjectRecord, ObjectType, QueryFilter, QueryRow, SearchHit, SortKey,
    TypeAttrs, read_snapshot, write_snapshot,
};

use crate::cache::{CacheLayer, CacheStatistics};
use crate::clock;
use crate::config::ManagerConfig;
use crate::contract::{
    BackendError, BackendKind, BulkOperation, BulkOutcome, CatalogBackend, CatalogStatistics,
    HealthReport, ImportStats,
};
use crate::file::FileBackend;
use crate::sqlite::SqliteBackend;

const CATALOG_KEY: &str = "catalog:all";
const STATS_KEY: &str = "stats:catalog";
const CATALOG_TTL: Duration = Duration::from_secs(300);
const QUERY_TTL: Duration = Duration::from_secs(60);
const STATS_TTL: Duration = Duration::from_secs(300);

/// Instantiate the backend a configuration selects. Recognized but
/// unimplemented kinds fail here, not at first use.
pub fn open_backend(config: &ManagerConfig) -> Result<Box<dyn CatalogBackend>, BackendError> {
    match config.backend {
        BackendKind::JsonFile => {
            let settings = config.json_file.as_ref().ok_or_else(|| {
                BackendError::Validation(
                    "backend 'json_file' selected without json_file settings".to_string(),
                )
            })?;
            Ok(Box::new(FileBackend::open(settings)?))
        }
        BackendKind::Sqlite => {
            let settings = config.sqlite.as_ref().ok_or_else(|| {
                BackendError::Validation(
                    "backend 'sqlite' selected without sqlite settings".to_string(),
                )
            })?;
            Ok(Box::new(SqliteBackend::open(settings)?))
        }
        BackendKind::Postgresql => Err(BackendError::Unsupported("postgresql")),
        BackendKind::Mysql => Err(BackendError::Unsupported("mysql")),
    }
}

pub struct CatalogManager {
    backend: Box<dyn CatalogBackend>,
    cache: CacheLayer,
}

impl CatalogManager {
    pub fn open(config: &ManagerConfig) -> Result<Self, BackendError> {
        let backend = open_backend(config)?;
        let cache = CacheLayer::from_config(&config.cache);
        info!(
            "catalog manager using backend '{}' (cache {})",
            backend.name(),
            if cache.is_enabled() { "on" } else { "off" }
        );
        Ok(Self { backend, cache })
    }

    /// Compose a manager from parts, for callers that build the backend
    /// themselves.
    pub fn with_backend(backend: Box<dyn CatalogBackend>, cache: CacheLayer) -> Self {
        Self { backend, cache }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// The full catalog snapshot, cache-aside.
    pub fn get_catalog_info(&self) -> Result<Catalog, BackendError> {
        if let Some(catalog) = self.cache.get::<Catalog>(CATALOG_KEY) {
            return Ok(catalog);
        }
        let catalog = self.backend.get_all_objects()?;
        self.cache.set(CATALOG_KEY, &catalog, Some(CATALOG_TTL));
        Ok(catalog)
    }

    pub fn get_object(
        &self,
        volume: &str,
        library: &str,
        object_name: &str,
    ) -> Result<Option<ObjectRecord>, BackendError> {
        self.backend.get_object(volume, library, object_name)
    }

    /// Write one object. UPDATED is stamped on every call; CREATED is
    /// stamped only when neither the incoming record nor the stored one
    /// carries it, which keeps it write-once.
    pub fn update_catalog_info(
        &self,
        volume: &str,
        library: &str,
        object_name: &str,
        mut record: ObjectRecord,
    ) -> Result<(), BackendError> {
        let now = clock::utc_now();
        record.updated = Some(now.clone());
        if record.created.is_none() {
            let existing_created = self
                .backend
                .get_object(volume, library, object_name)?
                .and_then(|existing| existing.created);
            record.created = Some(existing_created.unwrap_or(now));
        }
        self.backend
            .update_object(volume, library, object_name, record)?;
        self.invalidate_object(volume, library, object_name);
        Ok(())
    }

    pub fn delete_catalog_entry(
        &self,
        volume: &str,
        library: &str,
        object_name: &str,
    ) -> Result<bool, BackendError> {
        let deleted = self.backend.delete_object(volume, library, object_name)?;
        if deleted {
            self.invalidate_object(volume, library, object_name);
        }
        Ok(deleted)
    }

    pub fn query_objects(
        &self,
        filter: &QueryFilter,
        sort: &[SortKey],
        limit: Option<usize>,
    ) -> Result<Vec<QueryRow>, BackendError> {
        let key = format!(
            "query:{}",
            serde_json::to_string(&(filter, sort, limit))?
        );
        if let Some(rows) = self.cache.get::<Vec<QueryRow>>(&key) {
            return Ok(rows);
        }
        let rows = self.backend.query_objects(filter, sort, limit)?;
        self.cache.set(&key, &rows, Some(QUERY_TTL));
        Ok(rows)
    }

    pub fn search_objects(
        &self,
        query: &str,
        type_filter: Option<ObjectType>,
    ) -> Result<Vec<SearchHit>, BackendError> {
        self.backend.search_objects(query, type_filter)
    }

    /// Bulk batches can touch anything, so the whole cache goes.
    pub fn bulk_operations(
        &self,
        operations: &[BulkOperation],
    ) -> Result<BulkOutcome, BackendError> {
        let outcome = self.backend.bulk_operations(operations)?;
        self.cache.clear();
        Ok(outcome)
    }

    pub fn get_statistics(&self) -> Result<CatalogStatistics, BackendError> {
        if let Some(statistics) = self.cache.get::<CatalogStatistics>(STATS_KEY) {
            return Ok(statistics);
        }
        let statistics = self.backend.get_statistics()?;
        self.cache.set(STATS_KEY, &statistics, Some(STATS_TTL));
        Ok(statistics)
    }

    pub fn import_catalog(
        &self,
        data: Catalog,
        merge: bool,
    ) -> Result<ImportStats, BackendError> {
        let stats = self.backend.import_catalog(data, merge)?;
        self.cache.clear();
        Ok(stats)
    }

    /// Export the catalog as a pretty-printed JSON snapshot file.
    pub fn export_to_json(&self, path: &Path) -> Result<(), BackendError> {
        let catalog = self.get_catalog_info()?;
        write_snapshot(path, &catalog).map_err(|e| BackendError::Storage(e.to_string()))
    }

    /// Import a JSON snapshot file into the backend.
    pub fn import_from_json(&self, path: &Path, merge: bool) -> Result<ImportStats, BackendError> {
        let catalog = read_snapshot(path).map_err(|e| BackendError::Storage(e.to_string()))?;
        self.import_catalog(catalog, merge)
    }

    pub fn health_check(&self) -> HealthReport {
        self.backend.health_check()
    }

    pub fn cache_statistics(&self) -> CacheStatistics {
        self.cache.statistics()
    }

    pub fn close(&self) {
        self.backend.close();
        self.cache.clear();
    }

    fn invalidate_object(&self, volume: &str, library: &str, object_name: &str) {
        self.cache.invalidate("catalog:*");
        self.cache.invalidate("query:*");
        self.cache.invalidate("stats:*");
        self.cache
            .delete(&format!("object:{volume}:{library}:{object_name}"));
    }
}

// ── Legacy lookup helpers ───────────────────────────────────────────────────

/// Look up one object without surfacing errors: any failure is a miss.
pub fn get_object_info(
    config: &ManagerConfig,
    volume: &str,
    library: &str,
    object_name: &str,
) -> Option<ObjectRecord> {
    let manager = match CatalogManager::open(config) {
        Ok(manager) => manager,
        Err(e) => {
            warn!("object lookup could not open backend: {e}");
            return None;
        }
    };
    let result = match manager.get_object(volume, library, object_name) {
        Ok(record) => record,
        Err(e) => {
            warn!("object lookup for {volume}.{library}.{object_name} failed: {e}");
            None
        }
    };
    manager.close();
    result
}

fn default_dataset_record() -> ObjectRecord {
    ObjectRecord::new(TypeAttrs::Dataset(DatasetAttrs {
        rec_type: Some("FB".to_string()),
        rec_len: Some(80),
        encoding: Some("utf-8".to_string()),
    }))
}

/// Legacy FILE lookup, never failing: unknown files come back as a
/// default fixed-block dataset. Accepts either a bare filename, which is
/// searched across every library on the volume, or a `LIB/FILE` pair,
/// which targets one library. Hits merge over the dataset defaults.
pub fn get_file_info(config: &ManagerConfig, volume: &str, filename: &str) -> ObjectRecord {
    let defaults = default_dataset_record();
    let manager = match CatalogManager::open(config) {
        Ok(manager) => manager,
        Err(e) => {
            warn!("file lookup could not open backend: {e}");
            return defaults;
        }
    };
    let catalog = match manager.get_catalog_info() {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!("file lookup for {volume}/{filename} failed: {e}");
            manager.close();
            return defaults;
        }
    };
    manager.close();
    let found = catalog.volumes.get(volume).and_then(|libraries| {
        match filename.split_once('/') {
            Some((library, object_name)) => libraries
                .get(library)
                .and_then(|objects| objects.get(object_name)),
            None => libraries
                .values()
                .find_map(|objects| objects.get(filename)),
        }
    });
    match found.cloned() {
        Some(record) => record.merged_over(&defaults),
        None => defaults,
    }
}
