//! The backend contract: the trait every catalog store implements, plus the
//! error taxonomy and the typed payloads shared across backends.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use aspcat_catalog::{Catalog, ObjectRecord, ObjectType, QueryFilter, QueryRow, SearchHit, SortKey};

/// Errors a backend can raise.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("transaction error: {0}")]
    Transaction(String),
    #[error("unknown backend type: {0}")]
    UnknownBackend(String),
    #[error("backend '{0}' is recognized but not supported by this build")]
    Unsupported(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

/// The backend kinds the configuration surface recognizes. `postgresql`
/// and `mysql` parse but resolve to [`BackendError::Unsupported`] when a
/// backend is actually opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    JsonFile,
    Sqlite,
    Postgresql,
    Mysql,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JsonFile => "json_file",
            Self::Sqlite => "sqlite",
            Self::Postgresql => "postgresql",
            Self::Mysql => "mysql",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json_file" | "json" | "file" => Some(Self::JsonFile),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            "postgresql" | "postgres" => Some(Self::Postgresql),
            "mysql" => Some(Self::Mysql),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in a bulk batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BulkOperation {
    Update {
        volume: String,
        library: String,
        object_name: String,
        attributes: ObjectRecord,
    },
    Delete {
        volume: String,
        library: String,
        object_name: String,
    },
}

impl BulkOperation {
    pub fn names(&self) -> (&str, &str, &str) {
        match self {
            Self::Update {
                volume,
                library,
                object_name,
                ..
            }
            | Self::Delete {
                volume,
                library,
                object_name,
            } => (volume, library, object_name),
        }
    }

    /// Empty hierarchy names are rejected per entry, not per batch.
    pub fn validate(&self) -> Result<(), BackendError> {
        let (volume, library, object_name) = self.names();
        if volume.is_empty() || library.is_empty() || object_name.is_empty() {
            return Err(BackendError::Validation(format!(
                "bulk entry has empty name component: volume='{volume}' library='{library}' object='{object_name}'"
            )));
        }
        Ok(())
    }
}

/// Per-batch counters for [`CatalogBackend::bulk_operations`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub errors: u64,
}

/// Counters for a catalog import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    pub volumes: u64,
    pub libraries: u64,
    pub objects: u64,
    pub errors: u64,
}

/// Aggregate statistics a backend reports about its store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStatistics {
    pub backend: String,
    pub total_objects: u64,
    pub volumes: u64,
    pub libraries: u64,
    pub objects_by_type: BTreeMap<String, u64>,
    /// Objects whose UPDATED falls on the current UTC day.
    pub recent_updates: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_connections: Option<u64>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    NotImplemented,
}

/// A backend's self-diagnosis. Probing never returns `Err`; failures are
/// carried in the report itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

impl HealthReport {
    pub fn healthy(backend: &str, object_count: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            backend: backend.to_string(),
            object_count: Some(object_count),
            error: None,
            timestamp: crate::clock::utc_now(),
        }
    }

    pub fn unhealthy(backend: &str, error: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            backend: backend.to_string(),
            object_count: None,
            error: Some(error),
            timestamp: crate::clock::utc_now(),
        }
    }

    pub fn not_implemented(backend: &str) -> Self {
        Self {
            status: HealthStatus::NotImplemented,
            backend: backend.to_string(),
            object_count: None,
            error: None,
            timestamp: crate::clock::utc_now(),
        }
    }
}

/// The operations every catalog store provides. Methods take `&self`;
/// implementations carry their own interior locking.
pub trait CatalogBackend: Send {
    /// Stable name for logs and reports, e.g. `json_file` or `sqlite`.
    fn name(&self) -> &'static str;

    /// The complete hierarchy snapshot.
    fn get_all_objects(&self) -> Result<Catalog, BackendError>;

    fn get_object(
        &self,
        volume: &str,
        library: &str,
        object_name: &str,
    ) -> Result<Option<ObjectRecord>, BackendError>;

    /// Insert or merge one object. Attributes absent from `record` keep
    /// their stored value; missing parent volume/library are created.
    fn update_object(
        &self,
        volume: &str,
        library: &str,
        object_name: &str,
        record: ObjectRecord,
    ) -> Result<(), BackendError>;

    /// Delete one object, pruning emptied parents. `Ok(false)` when the
    /// object was not there.
    fn delete_object(
        &self,
        volume: &str,
        library: &str,
        object_name: &str,
    ) -> Result<bool, BackendError>;

    fn query_objects(
        &self,
        filter: &QueryFilter,
        sort: &[SortKey],
        limit: Option<usize>,
    ) -> Result<Vec<QueryRow>, BackendError>;

    fn search_objects(
        &self,
        query: &str,
        type_filter: Option<ObjectType>,
    ) -> Result<Vec<SearchHit>, BackendError>;

    /// Apply a batch of updates/deletes against one consistent view of the
    /// store, persisting once. Individual bad entries are counted in
    /// `errors` without failing the batch.
    fn bulk_operations(&self, operations: &[BulkOperation]) -> Result<BulkOutcome, BackendError>;

    fn get_statistics(&self) -> Result<CatalogStatistics, BackendError>;

    /// Import a whole catalog. `merge = false` replaces the store's
    /// contents; `merge = true` deep-merges at the library level.
    fn import_catalog(&self, data: Catalog, merge: bool) -> Result<ImportStats, BackendError>;

    fn health_check(&self) -> HealthReport;

    /// Release held resources. Idempotent.
    fn close(&self);
}
