//! SQLite backend: a small connection pool plus explicit transactions.
//!
//! The pool keeps up to `pool_size` idle connections and admits up to
//! `max_overflow` more under load. At most one explicit transaction is
//! active per backend at a time; it pins a connection until commit or
//! rollback, and every operation issued meanwhile runs on that connection
//! so it sees the uncommitted state.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::warn;
use parking_lot::Mutex;
use rusqlite::{Connection, ToSql};

use aspcat_catalog::{
    Catalog, ObjectRecord, ObjectType, QueryFilter, QueryRow, SearchHit, SortKey, search_score,
};

use crate::clock;
use crate::config::SqliteBackendConfig;
use crate::contract::{
    BackendError, BulkOperation, BulkOutcome, CatalogBackend, CatalogStatistics, HealthReport,
    ImportStats,
};
use crate::{ops, schema};

struct ConnectionPool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    retain: usize,
    capacity: usize,
    open_count: AtomicUsize,
}

impl ConnectionPool {
    fn checkout(&self) -> Result<Connection, BackendError> {
        if let Some(conn) = self.idle.lock().pop() {
            return Ok(conn);
        }
        // Reserve a slot before opening so concurrent checkouts can never
        // exceed the capacity between check and increment.
        let mut count = self.open_count.load(Ordering::Acquire);
        loop {
            if count >= self.capacity {
                return Err(BackendError::Connection(format!(
                    "connection pool exhausted ({} connections in use)",
                    self.capacity
                )));
            }
            match self.open_count.compare_exchange(
                count,
                count + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => count = actual,
            }
        }
        match schema::open_database(&self.path) {
            Ok(conn) => Ok(conn),
            Err(e) => {
                self.open_count.fetch_sub(1, Ordering::AcqRel);
                Err(e)
            }
        }
    }

    fn checkin(&self, conn: Connection) {
        let mut idle = self.idle.lock();
        if idle.len() < self.retain {
            idle.push(conn);
        } else {
            drop(conn);
            self.open_count.fetch_sub(1, Ordering::AcqRel);
        }
    }

    fn drain(&self) {
        let mut idle = self.idle.lock();
        self.open_count.fetch_sub(idle.len(), Ordering::AcqRel);
        idle.clear();
    }
}

pub struct SqliteBackend {
    pool: ConnectionPool,
    tx: Mutex<Option<Connection>>,
}

impl SqliteBackend {
    /// Open the backend, creating the database file and schema as needed.
    pub fn open(config: &SqliteBackendConfig) -> Result<Self, BackendError> {
        let retain = config.pool_size.max(1);
        let pool = ConnectionPool {
            path: config.path.clone(),
            idle: Mutex::new(Vec::new()),
            retain,
            capacity: retain + config.max_overflow,
            open_count: AtomicUsize::new(0),
        };
        // Open one connection up front so schema problems surface here
        // instead of on the first operation.
        let conn = pool.checkout()?;
        pool.checkin(conn);
        Ok(Self {
            pool,
            tx: Mutex::new(None),
        })
    }

    /// Run a read on the transaction connection when one is active,
    /// otherwise on a pooled connection.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let tx = self.tx.lock();
        if let Some(conn) = tx.as_ref() {
            return f(conn);
        }
        drop(tx);
        let conn = self.pool.checkout()?;
        let result = f(&conn);
        self.pool.checkin(conn);
        result
    }

    /// Run a write. Inside an explicit transaction the caller's
    /// commit/rollback governs; otherwise the write gets its own
    /// transaction so multi-statement operations stay atomic.
    fn with_write<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let tx = self.tx.lock();
        if let Some(conn) = tx.as_ref() {
            return f(conn);
        }
        drop(tx);
        let conn = self.pool.checkout()?;
        let result = (|| -> Result<T, BackendError> {
            conn.execute_batch("BEGIN IMMEDIATE")?;
            match f(&conn) {
                Ok(value) => {
                    conn.execute_batch("COMMIT")?;
                    Ok(value)
                }
                Err(e) => {
                    if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                        warn!("rollback after failed write also failed: {rollback}");
                    }
                    Err(e)
                }
            }
        })();
        self.pool.checkin(conn);
        result
    }

    /// Start an explicit transaction. Fails fast when one is already
    /// active.
    pub fn begin_transaction(&self) -> Result<(), BackendError> {
        let mut tx = self.tx.lock();
        if tx.is_some() {
            return Err(BackendError::Transaction(
                "a transaction is already active".to_string(),
            ));
        }
        let conn = self.pool.checkout()?;
        if let Err(e) = conn.execute_batch("BEGIN IMMEDIATE") {
            self.pool.checkin(conn);
            return Err(e.into());
        }
        *tx = Some(conn);
        Ok(())
    }

    pub fn commit_transaction(&self) -> Result<(), BackendError> {
        let mut tx = self.tx.lock();
        let Some(conn) = tx.take() else {
            return Err(BackendError::Transaction(
                "no active transaction".to_string(),
            ));
        };
        let result = conn.execute_batch("COMMIT");
        self.pool.checkin(conn);
        result.map_err(Into::into)
    }

    pub fn rollback_transaction(&self) -> Result<(), BackendError> {
        let mut tx = self.tx.lock();
        let Some(conn) = tx.take() else {
            return Err(BackendError::Transaction(
                "no active transaction".to_string(),
            ));
        };
        let result = conn.execute_batch("ROLLBACK");
        self.pool.checkin(conn);
        result.map_err(Into::into)
    }

    /// Scoped transaction: commits when the closure returns `Ok`, rolls
    /// back when it returns `Err`.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&Self) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        self.begin_transaction()?;
        match f(self) {
            Ok(value) => {
                self.commit_transaction()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.rollback_transaction() {
                    warn!("transaction rollback failed: {rollback}");
                }
                Err(e)
            }
        }
    }

    fn sort_column(field: &str) -> Option<&'static str> {
        match field {
            "volume_name" => Some("v.volume_name"),
            "library_name" => Some("l.library_name"),
            "object_name" => Some("o.object_name"),
            "object_type" | "TYPE" => Some("o.object_type"),
            "created_at" | "CREATED" => Some("o.created_at"),
            "updated_at" | "UPDATED" => Some("o.updated_at"),
            "file_size" | "SIZE" => Some("o.file_size"),
            _ => None,
        }
    }
}

impl CatalogBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn get_all_objects(&self) -> Result<Catalog, BackendError> {
        self.with_conn(ops::get_all)
    }

    fn get_object(
        &self,
        volume: &str,
        library: &str,
        object_name: &str,
    ) -> Result<Option<ObjectRecord>, BackendError> {
        self.with_conn(|conn| ops::get_object(conn, volume, library, object_name))
    }

    fn update_object(
        &self,
        volume: &str,
        library: &str,
        object_name: &str,
        record: ObjectRecord,
    ) -> Result<(), BackendError> {
        let now = clock::utc_now();
        self.with_write(|conn| {
            ops::update_object(conn, volume, library, object_name, &record, &now)?;
            Ok(())
        })
    }

    fn delete_object(
        &self,
        volume: &str,
        library: &str,
        object_name: &str,
    ) -> Result<bool, BackendError> {
        self.with_write(|conn| ops::delete_object(conn, volume, library, object_name))
    }

    fn query_objects(
        &self,
        filter: &QueryFilter,
        sort: &[SortKey],
        limit: Option<usize>,
    ) -> Result<Vec<QueryRow>, BackendError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(object_type) = filter.object_type {
            params.push(Box::new(object_type.as_str().to_string()));
            clauses.push(format!("o.object_type = ?{}", params.len()));
        }
        if let Some(volume) = &filter.volume {
            params.push(Box::new(volume.clone()));
            clauses.push(format!("v.volume_name = ?{}", params.len()));
        }
        if let Some(library) = &filter.library {
            params.push(Box::new(library.clone()));
            clauses.push(format!("l.library_name = ?{}", params.len()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let order_parts: Vec<String> = sort
            .iter()
            .filter_map(|key| match Self::sort_column(&key.field) {
                Some(column) => Some(format!("{column} {}", key.direction.as_sql())),
                None => {
                    warn!("ignoring unsortable query field '{}'", key.field);
                    None
                }
            })
            .collect();
        let order_sql = if order_parts.is_empty() {
            String::new()
        } else {
            format!("ORDER BY {}", order_parts.join(", "))
        };

        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows =
            self.with_conn(|conn| ops::select_rows(conn, &where_sql, &param_refs, &order_sql))?;

        // Attribute predicates span six detail tables, so they apply here
        // rather than in SQL.
        let mut rows: Vec<QueryRow> = rows
            .into_iter()
            .filter(|row| {
                filter
                    .attributes
                    .iter()
                    .all(|(key, value)| {
                        row.attributes.attr_text(key).as_deref() == Some(value.as_str())
                    })
            })
            .collect();
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    fn search_objects(
        &self,
        query: &str,
        type_filter: Option<ObjectType>,
    ) -> Result<Vec<SearchHit>, BackendError> {
        let query_lower = query.to_lowercase();
        let pattern = format!("%{query_lower}%");
        let mut where_sql =
            "WHERE (LOWER(o.object_name) LIKE ?1 OR LOWER(o.description) LIKE ?1)".to_string();
        let type_str = type_filter.map(|t| t.as_str().to_string());
        let mut params: Vec<&dyn ToSql> = vec![&pattern];
        if let Some(type_str) = &type_str {
            where_sql.push_str(" AND o.object_type = ?2");
            params.push(type_str);
        }
        let rows = self.with_conn(|conn| ops::select_rows(conn, &where_sql, &params, ""))?;
        let mut hits: Vec<SearchHit> = rows
            .into_iter()
            .filter_map(|row| {
                search_score(
                    &row.object_name,
                    row.attributes.description.as_deref(),
                    &query_lower,
                )
                .map(|rank| SearchHit { row, rank })
            })
            .collect();
        hits.sort_by(|a, b| b.rank.partial_cmp(&a.rank).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }

    fn bulk_operations(&self, operations: &[BulkOperation]) -> Result<BulkOutcome, BackendError> {
        let now = clock::utc_now();
        self.with_write(|conn| {
            let mut outcome = BulkOutcome::default();
            for operation in operations {
                if let Err(e) = operation.validate() {
                    warn!("skipping bulk entry: {e}");
                    outcome.errors += 1;
                    continue;
                }
                let result = match operation {
                    BulkOperation::Update {
                        volume,
                        library,
                        object_name,
                        attributes,
                    } => ops::update_object(conn, volume, library, object_name, attributes, &now)
                        .map(|created| {
                            if created {
                                outcome.created += 1;
                            } else {
                                outcome.updated += 1;
                            }
                        }),
                    BulkOperation::Delete {
                        volume,
                        library,
                        object_name,
                    } => ops::delete_object(conn, volume, library, object_name).map(|deleted| {
                        // Deleting a missing object is a no-op, not an error.
                        if deleted {
                            outcome.deleted += 1;
                        }
                    }),
                };
                if let Err(e) = result {
                    let (volume, library, object_name) = operation.names();
                    warn!("bulk entry {volume}.{library}.{object_name} failed: {e}");
                    outcome.errors += 1;
                }
            }
            Ok(outcome)
        })
    }

    fn get_statistics(&self) -> Result<CatalogStatistics, BackendError> {
        let today = clock::utc_today_start();
        let pool_connections = self.pool.open_count.load(Ordering::Acquire) as u64;
        self.with_conn(|conn| {
            Ok(CatalogStatistics {
                backend: self.name().to_string(),
                total_objects: ops::count_objects(conn)?,
                volumes: ops::count_volumes(conn)?,
                libraries: ops::count_libraries(conn)?,
                objects_by_type: ops::counts_by_type(conn)?,
                recent_updates: ops::count_updated_since(conn, &today)?,
                file_size_bytes: std::fs::metadata(&self.pool.path).map(|m| m.len()).ok(),
                pool_connections: Some(pool_connections),
                timestamp: clock::utc_now(),
            })
        })
    }

    fn import_catalog(&self, data: Catalog, merge: bool) -> Result<ImportStats, BackendError> {
        let now = clock::utc_now();
        self.with_write(|conn| {
            if !merge {
                ops::clear_all(conn)?;
            }
            let mut stats = ImportStats {
                volumes: data.volume_count() as u64,
                libraries: data.library_count() as u64,
                objects: 0,
                errors: 0,
            };
            for (volume, library, object_name, record) in data.iter_objects() {
                match ops::update_object(conn, volume, library, object_name, record, &now) {
                    Ok(_) => stats.objects += 1,
                    Err(e) => {
                        warn!("import of {volume}.{library}.{object_name} failed: {e}");
                        stats.errors += 1;
                    }
                }
            }
            Ok(stats)
        })
    }

    fn health_check(&self) -> HealthReport {
        match self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            ops::count_objects(conn)
        }) {
            Ok(count) => HealthReport::healthy(self.name(), count),
            Err(e) => HealthReport::unhealthy(self.name(), e.to_string()),
        }
    }

    fn close(&self) {
        let mut tx = self.tx.lock();
        if let Some(conn) = tx.take() {
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                warn!("rolling back open transaction on close failed: {e}");
            }
            self.pool.open_count.fetch_sub(1, Ordering::AcqRel);
            drop(conn);
        }
        drop(tx);
        self.pool.drain();
    }
}
