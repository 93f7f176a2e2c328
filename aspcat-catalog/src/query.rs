//! In-memory query and search over a catalog snapshot.
//!
//! Filters use string-equality on TYPE, volume, library, or any attribute
//! wire key. Sort keys apply in priority order; search ranks by a fixed
//! scoring rule (base 1.0, +0.5 name match, +0.3 description match).

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::types::{ObjectRecord, ObjectType};

/// Sort direction for a [`SortKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One sort criterion: field name plus direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Desc,
        }
    }
}

/// Query predicates, all combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub object_type: Option<ObjectType>,
    pub volume: Option<String>,
    pub library: Option<String>,
    /// String-equality matches on arbitrary attribute wire keys.
    pub attributes: Vec<(String, String)>,
}

impl QueryFilter {
    pub fn is_empty(&self) -> bool {
        self.object_type.is_none()
            && self.volume.is_none()
            && self.library.is_none()
            && self.attributes.is_empty()
    }
}

/// One flattened query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRow {
    pub volume_name: String,
    pub library_name: String,
    pub object_name: String,
    pub attributes: ObjectRecord,
}

/// One search result with its rank score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub row: QueryRow,
    pub rank: f64,
}

/// Flatten a catalog into query rows, hierarchy order.
pub fn flatten(catalog: &Catalog) -> Vec<QueryRow> {
    catalog
        .iter_objects()
        .map(|(volume, library, name, record)| QueryRow {
            volume_name: volume.to_string(),
            library_name: library.to_string(),
            object_name: name.to_string(),
            attributes: record.clone(),
        })
        .collect()
}

fn matches(row: &QueryRow, filter: &QueryFilter) -> bool {
    if let Some(object_type) = filter.object_type {
        if row.attributes.object_type() != object_type {
            return false;
        }
    }
    if let Some(volume) = &filter.volume {
        if &row.volume_name != volume {
            return false;
        }
    }
    if let Some(library) = &filter.library {
        if &row.library_name != library {
            return false;
        }
    }
    for (key, value) in &filter.attributes {
        if row.attributes.attr_text(key).as_deref() != Some(value.as_str()) {
            return false;
        }
    }
    true
}

fn sort_value(row: &QueryRow, field: &str) -> String {
    match field {
        "volume_name" => row.volume_name.clone(),
        "library_name" => row.library_name.clone(),
        "object_name" => row.object_name.clone(),
        _ => row.attributes.attr_text(field).unwrap_or_default(),
    }
}

/// Numeric fields (SIZE, RECLEN, WIDTH, ...) sort by value, matching how
/// a relational store orders its integer columns.
fn compare_values(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Apply sort keys in priority order: stable sorts run lowest-priority
/// first so the first key in the list decides ties last.
pub fn apply_sort(rows: &mut [QueryRow], sort: &[SortKey]) {
    for key in sort.iter().rev() {
        rows.sort_by(|a, b| {
            let ordering = compare_values(&sort_value(a, &key.field), &sort_value(b, &key.field));
            match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }
}

/// Filter, sort, and truncate a catalog snapshot.
pub fn run_query(
    catalog: &Catalog,
    filter: &QueryFilter,
    sort: &[SortKey],
    limit: Option<usize>,
) -> Vec<QueryRow> {
    let mut rows: Vec<QueryRow> = flatten(catalog)
        .into_iter()
        .filter(|row| matches(row, filter))
        .collect();
    apply_sort(&mut rows, sort);
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

/// Score a candidate against a lower-cased query, or `None` when neither
/// the name nor the description contains it.
pub fn search_score(object_name: &str, description: Option<&str>, query_lower: &str) -> Option<f64> {
    let name_hit = object_name.to_lowercase().contains(query_lower);
    let description_hit = description
        .map(|d| d.to_lowercase().contains(query_lower))
        .unwrap_or(false);
    if !name_hit && !description_hit {
        return None;
    }
    let mut rank = 1.0;
    if name_hit {
        rank += 0.5;
    }
    if description_hit {
        rank += 0.3;
    }
    Some(rank)
}

/// Substring search over object name and description, ranked descending.
pub fn run_search(catalog: &Catalog, query: &str, type_filter: Option<ObjectType>) -> Vec<SearchHit> {
    let query_lower = query.to_lowercase();
    let filter = QueryFilter {
        object_type: type_filter,
        ..QueryFilter::default()
    };
    let mut hits: Vec<SearchHit> = run_query(catalog, &filter, &[], None)
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
    hits
}
