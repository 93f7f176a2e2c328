//! Data model for the aspcat object catalog.
//!
//! The catalog is a three-level hierarchy (Volume → Library → Object) whose
//! unit of record is an [`types::ObjectRecord`]: common attributes plus a
//! closed per-TYPE attribute set. This crate owns the wire format, the
//! hierarchy container with its merge/prune/diff rules, and the query and
//! search helpers shared by every storage backend.

pub mod catalog;
pub mod query;
pub mod snapshot;
pub mod types;

pub use catalog::{Catalog, LibraryMap, ObjectMap, diff_catalogs};
pub use query::{
    QueryFilter, QueryRow, SearchHit, SortDirection, SortKey, run_query, run_search, search_score,
};
pub use snapshot::{SnapshotError, read_snapshot, write_snapshot};
pub use types::{
    CopybookAttrs, DatasetAttrs, JobAttrs, LayoutAttrs, MapAttrs, ObjectRecord, ObjectType,
    PgmAttrs, TypeAttrs,
};
