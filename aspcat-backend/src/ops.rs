//! Row-level operations for the SQLite backend.
//!
//! Free functions over a borrowed [`Connection`], so they run the same
//! whether the caller holds a pooled connection or an explicit
//! transaction. Upserts merge rather than clobber: absent attributes keep
//! their stored value, and per-TYPE defaults apply only on first insert.

use log::debug;
use rusqlite::{Connection, OptionalExtension, ToSql, params};

use aspcat_catalog::{
    Catalog, CopybookAttrs, DatasetAttrs, JobAttrs, LayoutAttrs, MapAttrs, ObjectRecord,
    ObjectType, PgmAttrs, QueryRow, TypeAttrs,
};

use crate::contract::BackendError;
use crate::schema::DETAIL_TABLES;

/// The shared SELECT joining the hierarchy with every detail table. Row
/// shape is fixed; [`row_to_entry`] decodes it.
pub const SELECT_ROWS: &str = "
SELECT v.volume_name, l.library_name, o.object_name, o.object_type,
       o.file_size, o.description, o.created_at, o.updated_at,
       p.pgm_type, p.encoding, p.compile_date,
       d.rec_type, d.rec_len, d.encoding,
       m.map_type, m.width, m.height,
       c.copybook_type, c.encoding,
       j.job_type, j.schedule_info,
       y.layout_type, y.layout_data
FROM objects o
JOIN volumes v ON v.volume_id = o.volume_id
JOIN libraries l ON l.library_id = o.library_id
LEFT JOIN programs p ON p.object_id = o.object_id
LEFT JOIN datasets d ON d.object_id = o.object_id
LEFT JOIN maps m ON m.object_id = o.object_id
LEFT JOIN copybooks c ON c.object_id = o.object_id
LEFT JOIN jobs j ON j.object_id = o.object_id
LEFT JOIN layouts y ON y.object_id = o.object_id
";

fn detail_table(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::Pgm => "programs",
        ObjectType::Dataset => "datasets",
        ObjectType::Map => "maps",
        ObjectType::Copybook => "copybooks",
        ObjectType::Job => "jobs",
        ObjectType::Layout => "layouts",
    }
}

/// Decode one row of [`SELECT_ROWS`] into a flattened catalog entry.
pub fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueryRow> {
    let type_str: String = row.get(3)?;
    let Some(object_type) = ObjectType::from_str_loose(&type_str) else {
        return Err(rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown object type '{type_str}'").into(),
        ));
    };
    let attrs = match object_type {
        ObjectType::Pgm => TypeAttrs::Pgm(PgmAttrs {
            pgm_type: row.get(8)?,
            encoding: row.get(9)?,
            compiled: row.get(10)?,
        }),
        ObjectType::Dataset => TypeAttrs::Dataset(DatasetAttrs {
            rec_type: row.get(11)?,
            rec_len: row.get(12)?,
            encoding: row.get(13)?,
        }),
        ObjectType::Map => TypeAttrs::Map(MapAttrs {
            map_type: row.get(14)?,
            width: row.get(15)?,
            height: row.get(16)?,
        }),
        ObjectType::Copybook => TypeAttrs::Copybook(CopybookAttrs {
            copybook_type: row.get(17)?,
            encoding: row.get(18)?,
        }),
        ObjectType::Job => TypeAttrs::Job(JobAttrs {
            job_type: row.get(19)?,
            schedule: row.get(20)?,
        }),
        ObjectType::Layout => TypeAttrs::Layout(LayoutAttrs {
            layout_type: row.get(21)?,
            // Stored as TEXT; anything unparsable comes back as a string.
            layout_data: row.get::<_, Option<String>>(22)?.map(|raw| {
                serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
            }),
        }),
    };
    Ok(QueryRow {
        volume_name: row.get(0)?,
        library_name: row.get(1)?,
        object_name: row.get(2)?,
        attributes: ObjectRecord {
            attrs,
            created: Some(row.get(6)?),
            updated: Some(row.get(7)?),
            size: row.get(4)?,
            description: row.get(5)?,
        },
    })
}

/// Run [`SELECT_ROWS`] with an optional WHERE clause and ORDER BY.
pub fn select_rows(
    conn: &Connection,
    where_sql: &str,
    params: &[&dyn ToSql],
    order_sql: &str,
) -> Result<Vec<QueryRow>, BackendError> {
    let sql = format!("{SELECT_ROWS} {where_sql} {order_sql}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, row_to_entry)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

fn upsert_volume(conn: &Connection, volume: &str) -> Result<i64, BackendError> {
    conn.execute(
        "INSERT INTO volumes (volume_name, volume_path) VALUES (?1, ?2)
         ON CONFLICT (volume_name) DO NOTHING",
        params![volume, format!("/volume/{volume}")],
    )?;
    let id = conn.query_row(
        "SELECT volume_id FROM volumes WHERE volume_name = ?1",
        [volume],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn upsert_library(
    conn: &Connection,
    volume_id: i64,
    volume: &str,
    library: &str,
) -> Result<i64, BackendError> {
    conn.execute(
        "INSERT INTO libraries (volume_id, library_name, library_path) VALUES (?1, ?2, ?3)
         ON CONFLICT (volume_id, library_name) DO NOTHING",
        params![volume_id, library, format!("/volume/{volume}/{library}")],
    )?;
    let id = conn.query_row(
        "SELECT library_id FROM libraries WHERE volume_id = ?1 AND library_name = ?2",
        params![volume_id, library],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Insert or merge one object, creating parent rows as needed. Returns
/// `true` when the object row was newly created. A TYPE change drops the
/// previous detail row so no stale attributes survive.
pub fn update_object(
    conn: &Connection,
    volume: &str,
    library: &str,
    object_name: &str,
    record: &ObjectRecord,
    now: &str,
) -> Result<bool, BackendError> {
    let volume_id = upsert_volume(conn, volume)?;
    let library_id = upsert_library(conn, volume_id, volume, library)?;

    let previous: Option<(i64, String)> = conn
        .query_row(
            "SELECT object_id, object_type FROM objects
             WHERE volume_id = ?1 AND library_id = ?2 AND object_name = ?3",
            params![volume_id, library_id, object_name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let created = previous.is_none();
    let object_type = record.object_type();
    conn.execute(
        "INSERT INTO objects (volume_id, library_id, object_name, object_type,
                              file_size, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (volume_id, library_id, object_name) DO UPDATE SET
             object_type = excluded.object_type,
             file_size = COALESCE(excluded.file_size, objects.file_size),
             description = COALESCE(excluded.description, objects.description),
             updated_at = excluded.updated_at",
        params![
            volume_id,
            library_id,
            object_name,
            object_type.as_str(),
            record.size,
            record.description,
            record.created.as_deref().unwrap_or(now),
            record.updated.as_deref().unwrap_or(now),
        ],
    )?;

    let object_id = match previous {
        Some((id, prev_type)) => {
            if prev_type != object_type.as_str() {
                if let Some(prev) = ObjectType::from_str_loose(&prev_type) {
                    debug!(
                        "object {volume}.{library}.{object_name} changed TYPE {prev_type} -> {object_type}"
                    );
                    conn.execute(
                        &format!("DELETE FROM {} WHERE object_id = ?1", detail_table(prev)),
                        [id],
                    )?;
                }
            }
            id
        }
        None => conn.last_insert_rowid(),
    };

    upsert_details(conn, object_id, &record.attrs)?;
    Ok(created)
}

fn upsert_details(
    conn: &Connection,
    object_id: i64,
    attrs: &TypeAttrs,
) -> Result<(), BackendError> {
    match attrs {
        TypeAttrs::Pgm(a) => {
            conn.execute(
                "INSERT INTO programs (object_id, pgm_type, encoding, compile_date)
                 VALUES (?1, COALESCE(?2, 'UNKNOWN'), COALESCE(?3, 'UTF-8'), ?4)
                 ON CONFLICT (object_id) DO UPDATE SET
                     pgm_type = COALESCE(?2, programs.pgm_type),
                     encoding = COALESCE(?3, programs.encoding),
                     compile_date = COALESCE(?4, programs.compile_date)",
                params![object_id, a.pgm_type, a.encoding, a.compiled],
            )?;
        }
        TypeAttrs::Dataset(a) => {
            conn.execute(
                "INSERT INTO datasets (object_id, rec_type, rec_len, encoding)
                 VALUES (?1, COALESCE(?2, 'FB'), COALESCE(?3, 80), COALESCE(?4, 'UTF-8'))
                 ON CONFLICT (object_id) DO UPDATE SET
                     rec_type = COALESCE(?2, datasets.rec_type),
                     rec_len = COALESCE(?3, datasets.rec_len),
                     encoding = COALESCE(?4, datasets.encoding)",
                params![object_id, a.rec_type, a.rec_len, a.encoding],
            )?;
        }
        TypeAttrs::Map(a) => {
            conn.execute(
                "INSERT INTO maps (object_id, map_type, width, height)
                 VALUES (?1, COALESCE(?2, 'SMED'), COALESCE(?3, 0), COALESCE(?4, 0))
                 ON CONFLICT (object_id) DO UPDATE SET
                     map_type = COALESCE(?2, maps.map_type),
                     width = COALESCE(?3, maps.width),
                     height = COALESCE(?4, maps.height)",
                params![object_id, a.map_type, a.width, a.height],
            )?;
        }
        TypeAttrs::Copybook(a) => {
            conn.execute(
                "INSERT INTO copybooks (object_id, copybook_type, encoding)
                 VALUES (?1, COALESCE(?2, 'COBOL'), COALESCE(?3, 'UTF-8'))
                 ON CONFLICT (object_id) DO UPDATE SET
                     copybook_type = COALESCE(?2, copybooks.copybook_type),
                     encoding = COALESCE(?3, copybooks.encoding)",
                params![object_id, a.copybook_type, a.encoding],
            )?;
        }
        TypeAttrs::Job(a) => {
            conn.execute(
                "INSERT INTO jobs (object_id, job_type, schedule_info)
                 VALUES (?1, COALESCE(?2, 'BATCH'), COALESCE(?3, ''))
                 ON CONFLICT (object_id) DO UPDATE SET
                     job_type = COALESCE(?2, jobs.job_type),
                     schedule_info = COALESCE(?3, jobs.schedule_info)",
                params![object_id, a.job_type, a.schedule],
            )?;
        }
        TypeAttrs::Layout(a) => {
            let layout_data = a.layout_data.as_ref().map(|v| v.to_string());
            conn.execute(
                "INSERT INTO layouts (object_id, layout_type, layout_data)
                 VALUES (?1, COALESCE(?2, 'SCREEN'), COALESCE(?3, '{}'))
                 ON CONFLICT (object_id) DO UPDATE SET
                     layout_type = COALESCE(?2, layouts.layout_type),
                     layout_data = COALESCE(?3, layouts.layout_data)",
                params![object_id, a.layout_type, layout_data],
            )?;
        }
    }
    Ok(())
}

/// Fetch one object by its hierarchy names.
pub fn get_object(
    conn: &Connection,
    volume: &str,
    library: &str,
    object_name: &str,
) -> Result<Option<ObjectRecord>, BackendError> {
    let entries = select_rows(
        conn,
        "WHERE v.volume_name = ?1 AND l.library_name = ?2 AND o.object_name = ?3",
        &[&volume, &library, &object_name],
        "",
    )?;
    Ok(entries.into_iter().next().map(|entry| entry.attributes))
}

/// Rebuild the full nested catalog from the relational rows.
pub fn get_all(conn: &Connection) -> Result<Catalog, BackendError> {
    let mut catalog = Catalog::new();
    for entry in select_rows(conn, "", &[], "")? {
        catalog
            .volumes
            .entry(entry.volume_name)
            .or_default()
            .entry(entry.library_name)
            .or_default()
            .insert(entry.object_name, entry.attributes);
    }
    Ok(catalog)
}

/// Delete one object, pruning its library and volume when emptied. The
/// detail row goes with it via cascade.
pub fn delete_object(
    conn: &Connection,
    volume: &str,
    library: &str,
    object_name: &str,
) -> Result<bool, BackendError> {
    let ids: Option<(i64, i64, i64)> = conn
        .query_row(
            "SELECT o.object_id, o.library_id, o.volume_id
             FROM objects o
             JOIN volumes v ON v.volume_id = o.volume_id
             JOIN libraries l ON l.library_id = o.library_id
             WHERE v.volume_name = ?1 AND l.library_name = ?2 AND o.object_name = ?3",
            params![volume, library, object_name],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    let Some((object_id, library_id, volume_id)) = ids else {
        return Ok(false);
    };

    conn.execute("DELETE FROM objects WHERE object_id = ?1", [object_id])?;

    let remaining_objects: i64 = conn.query_row(
        "SELECT COUNT(*) FROM objects WHERE library_id = ?1",
        [library_id],
        |row| row.get(0),
    )?;
    if remaining_objects == 0 {
        conn.execute("DELETE FROM libraries WHERE library_id = ?1", [library_id])?;
        let remaining_libraries: i64 = conn.query_row(
            "SELECT COUNT(*) FROM libraries WHERE volume_id = ?1",
            [volume_id],
            |row| row.get(0),
        )?;
        if remaining_libraries == 0 {
            conn.execute("DELETE FROM volumes WHERE volume_id = ?1", [volume_id])?;
        }
    }
    Ok(true)
}

/// Empty every table, detail rows first.
pub fn clear_all(conn: &Connection) -> Result<(), BackendError> {
    for table in DETAIL_TABLES {
        conn.execute(&format!("DELETE FROM {table}"), [])?;
    }
    conn.execute("DELETE FROM objects", [])?;
    conn.execute("DELETE FROM libraries", [])?;
    conn.execute("DELETE FROM volumes", [])?;
    Ok(())
}

pub fn count_objects(conn: &Connection) -> Result<u64, BackendError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0))?;
    Ok(count as u64)
}

pub fn count_volumes(conn: &Connection) -> Result<u64, BackendError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM volumes", [], |row| row.get(0))?;
    Ok(count as u64)
}

pub fn count_libraries(conn: &Connection) -> Result<u64, BackendError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM libraries", [], |row| row.get(0))?;
    Ok(count as u64)
}

pub fn counts_by_type(
    conn: &Connection,
) -> Result<std::collections::BTreeMap<String, u64>, BackendError> {
    let mut stmt =
        conn.prepare("SELECT object_type, COUNT(*) FROM objects GROUP BY object_type")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    let mut counts = std::collections::BTreeMap::new();
    for row in rows {
        let (object_type, count) = row?;
        counts.insert(object_type, count as u64);
    }
    Ok(counts)
}

/// Objects whose `updated_at` is at or after `cutoff`. Timestamps are
/// stored in a fixed RFC 3339 UTC format, so string comparison is
/// chronological.
pub fn count_updated_since(conn: &Connection, cutoff: &str) -> Result<u64, BackendError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM objects WHERE updated_at >= ?1",
        [cutoff],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}
