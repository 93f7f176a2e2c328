//! Storage backends for the aspcat object catalog.
//!
//! Every backend satisfies the [`contract::CatalogBackend`] trait; callers
//! go through the [`manager::CatalogManager`] facade, which composes one
//! backend with an optional TTL cache. Implemented backends: a JSON file
//! store with advisory locking and atomic replace-on-write, and a SQLite
//! store with pooled connections and explicit transactions.

pub mod cache;
mod clock;
pub mod config;
pub mod contract;
pub mod file;
pub mod manager;
pub mod ops;
pub mod schema;
pub mod sqlite;

pub use cache::{CacheLayer, CacheStatistics};
pub use config::{
    CacheConfig, ConfigStore, FileBackendConfig, ManagerConfig, MigrationSettings,
    RelationalServerConfig, SqliteBackendConfig,
};
pub use contract::{
    BackendError, BackendKind, BulkOperation, BulkOutcome, CatalogBackend, CatalogStatistics,
    HealthReport, HealthStatus, ImportStats,
};
pub use file::FileBackend;
pub use manager::{CatalogManager, get_file_info, get_object_info, open_backend};
pub use sqlite::SqliteBackend;
