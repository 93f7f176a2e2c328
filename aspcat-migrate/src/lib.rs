//! Catalog migration between backends: one-shot copy with backup and
//! validation, rollback from a backup snapshot, bidirectional sync, and a
//! dual-write shim for the cutover window.

pub mod hybrid;
pub mod migration;

pub use hybrid::HybridBackend;
pub use migration::{
    MigrationError, MigrationManager, MigrationOptions, MigrationStats, RollbackStats,
    SyncDirection, SyncStats, ValidationReport,
};
