//! Object record types and the per-TYPE attribute union.
//!
//! On the wire an object is a flat attribute bag keyed by upper-case names
//! (`{"TYPE":"PGM","PGMTYPE":"JAVA","CREATED":...}`). In memory the TYPE
//! dispatch is a closed tagged union so backends pattern-match on the
//! variant instead of probing string keys.

use serde::{Deserialize, Serialize};

// ── Object Type ─────────────────────────────────────────────────────────────

/// The kind of a cataloged object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    #[serde(rename = "PGM")]
    Pgm,
    #[serde(rename = "DATASET")]
    Dataset,
    #[serde(rename = "MAP")]
    Map,
    #[serde(rename = "COPYBOOK")]
    Copybook,
    #[serde(rename = "JOB")]
    Job,
    #[serde(rename = "LAYOUT")]
    Layout,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pgm => "PGM",
            Self::Dataset => "DATASET",
            Self::Map => "MAP",
            Self::Copybook => "COPYBOOK",
            Self::Job => "JOB",
            Self::Layout => "LAYOUT",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PGM" | "PROGRAM" => Some(Self::Pgm),
            "DATASET" => Some(Self::Dataset),
            "MAP" => Some(Self::Map),
            "COPYBOOK" => Some(Self::Copybook),
            "JOB" => Some(Self::Job),
            "LAYOUT" => Some(Self::Layout),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Per-TYPE Attribute Sets ─────────────────────────────────────────────────

/// Attributes of an executable program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PgmAttrs {
    #[serde(rename = "PGMTYPE", default, skip_serializing_if = "Option::is_none")]
    pub pgm_type: Option<String>,
    #[serde(rename = "ENCODING", default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(rename = "COMPILED", default, skip_serializing_if = "Option::is_none")]
    pub compiled: Option<String>,
}

/// Attributes of a record-oriented dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetAttrs {
    #[serde(rename = "RECTYPE", default, skip_serializing_if = "Option::is_none")]
    pub rec_type: Option<String>,
    #[serde(rename = "RECLEN", default, skip_serializing_if = "Option::is_none")]
    pub rec_len: Option<i64>,
    #[serde(rename = "ENCODING", default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// Attributes of a terminal screen map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapAttrs {
    #[serde(rename = "MAPTYPE", default, skip_serializing_if = "Option::is_none")]
    pub map_type: Option<String>,
    #[serde(rename = "WIDTH", default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(rename = "HEIGHT", default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
}

/// Attributes of a copybook (shared record layout source).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CopybookAttrs {
    #[serde(rename = "COPYBOOKTYPE", default, skip_serializing_if = "Option::is_none")]
    pub copybook_type: Option<String>,
    #[serde(rename = "ENCODING", default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// Attributes of a batch job definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobAttrs {
    #[serde(rename = "JOBTYPE", default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(rename = "SCHEDULE", default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

/// Attributes of a screen/print layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutAttrs {
    #[serde(rename = "LAYOUTTYPE", default, skip_serializing_if = "Option::is_none")]
    pub layout_type: Option<String>,
    #[serde(rename = "LAYOUTDATA", default, skip_serializing_if = "Option::is_none")]
    pub layout_data: Option<serde_json::Value>,
}

/// The closed TYPE union. Serializes internally tagged on `TYPE`, so a
/// record flattens to the flat attribute bag the snapshot format requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "TYPE")]
pub enum TypeAttrs {
    #[serde(rename = "PGM")]
    Pgm(PgmAttrs),
    #[serde(rename = "DATASET")]
    Dataset(DatasetAttrs),
    #[serde(rename = "MAP")]
    Map(MapAttrs),
    #[serde(rename = "COPYBOOK")]
    Copybook(CopybookAttrs),
    #[serde(rename = "JOB")]
    Job(JobAttrs),
    #[serde(rename = "LAYOUT")]
    Layout(LayoutAttrs),
}

impl TypeAttrs {
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Pgm(_) => ObjectType::Pgm,
            Self::Dataset(_) => ObjectType::Dataset,
            Self::Map(_) => ObjectType::Map,
            Self::Copybook(_) => ObjectType::Copybook,
            Self::Job(_) => ObjectType::Job,
            Self::Layout(_) => ObjectType::Layout,
        }
    }

    /// Merge `self` over `existing`: fields the incoming set doesn't carry
    /// keep their stored value. A TYPE change replaces the set wholesale.
    pub fn merged_over(self, existing: &TypeAttrs) -> TypeAttrs {
        match (self, existing) {
            (Self::Pgm(new), Self::Pgm(old)) => Self::Pgm(PgmAttrs {
                pgm_type: new.pgm_type.or_else(|| old.pgm_type.clone()),
                encoding: new.encoding.or_else(|| old.encoding.clone()),
                compiled: new.compiled.or_else(|| old.compiled.clone()),
            }),
            (Self::Dataset(new), Self::Dataset(old)) => Self::Dataset(DatasetAttrs {
                rec_type: new.rec_type.or_else(|| old.rec_type.clone()),
                rec_len: new.rec_len.or(old.rec_len),
                encoding: new.encoding.or_else(|| old.encoding.clone()),
            }),
            (Self::Map(new), Self::Map(old)) => Self::Map(MapAttrs {
                map_type: new.map_type.or_else(|| old.map_type.clone()),
                width: new.width.or(old.width),
                height: new.height.or(old.height),
            }),
            (Self::Copybook(new), Self::Copybook(old)) => Self::Copybook(CopybookAttrs {
                copybook_type: new.copybook_type.or_else(|| old.copybook_type.clone()),
                encoding: new.encoding.or_else(|| old.encoding.clone()),
            }),
            (Self::Job(new), Self::Job(old)) => Self::Job(JobAttrs {
                job_type: new.job_type.or_else(|| old.job_type.clone()),
                schedule: new.schedule.or_else(|| old.schedule.clone()),
            }),
            (Self::Layout(new), Self::Layout(old)) => Self::Layout(LayoutAttrs {
                layout_type: new.layout_type.or_else(|| old.layout_type.clone()),
                layout_data: new.layout_data.or_else(|| old.layout_data.clone()),
            }),
            (new, _) => new,
        }
    }

    /// Text value of a per-TYPE attribute by its wire key.
    pub fn attr_text(&self, key: &str) -> Option<String> {
        match (self, key) {
            (Self::Pgm(a), "PGMTYPE") => a.pgm_type.clone(),
            (Self::Pgm(a), "ENCODING") => a.encoding.clone(),
            (Self::Pgm(a), "COMPILED") => a.compiled.clone(),
            (Self::Dataset(a), "RECTYPE") => a.rec_type.clone(),
            (Self::Dataset(a), "RECLEN") => a.rec_len.map(|v| v.to_string()),
            (Self::Dataset(a), "ENCODING") => a.encoding.clone(),
            (Self::Map(a), "MAPTYPE") => a.map_type.clone(),
            (Self::Map(a), "WIDTH") => a.width.map(|v| v.to_string()),
            (Self::Map(a), "HEIGHT") => a.height.map(|v| v.to_string()),
            (Self::Copybook(a), "COPYBOOKTYPE") => a.copybook_type.clone(),
            (Self::Copybook(a), "ENCODING") => a.encoding.clone(),
            (Self::Job(a), "JOBTYPE") => a.job_type.clone(),
            (Self::Job(a), "SCHEDULE") => a.schedule.clone(),
            (Self::Layout(a), "LAYOUTTYPE") => a.layout_type.clone(),
            (Self::Layout(a), "LAYOUTDATA") => a.layout_data.as_ref().map(|v| v.to_string()),
            _ => None,
        }
    }
}

// ── Object Record ───────────────────────────────────────────────────────────

/// The catalog's unit of record.
///
/// CREATED is set exactly once at first successful write; UPDATED refreshes
/// on every write. Both are RFC 3339 UTC strings with a `Z` suffix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    #[serde(flatten)]
    pub attrs: TypeAttrs,
    #[serde(rename = "CREATED", default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(rename = "UPDATED", default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(rename = "SIZE", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(rename = "DESCRIPTION", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ObjectRecord {
    pub fn new(attrs: TypeAttrs) -> Self {
        Self {
            attrs,
            created: None,
            updated: None,
            size: None,
            description: None,
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.attrs.object_type()
    }

    /// Merge this record over an existing one. Timestamps and common
    /// attributes absent from the incoming record are preserved, which is
    /// what keeps CREATED write-once across updates.
    pub fn merged_over(self, existing: &ObjectRecord) -> ObjectRecord {
        ObjectRecord {
            attrs: self.attrs.merged_over(&existing.attrs),
            created: self.created.or_else(|| existing.created.clone()),
            updated: self.updated.or_else(|| existing.updated.clone()),
            size: self.size.or(existing.size),
            description: self.description.or_else(|| existing.description.clone()),
        }
    }

    /// Text value of any attribute by its wire key, common or per-TYPE.
    pub fn attr_text(&self, key: &str) -> Option<String> {
        match key {
            "TYPE" => Some(self.object_type().as_str().to_string()),
            "CREATED" => self.created.clone(),
            "UPDATED" => self.updated.clone(),
            "SIZE" => self.size.map(|v| v.to_string()),
            "DESCRIPTION" => self.description.clone(),
            _ => self.attrs.attr_text(key),
        }
    }
}
