//! The hierarchy container: Volume → Library → Object.
//!
//! Volumes and libraries are created implicitly on first object write and
//! pruned when a delete leaves them empty. Updates merge into the existing
//! record rather than clobbering it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::ObjectRecord;

/// Objects of one library, keyed by object name.
pub type ObjectMap = BTreeMap<String, ObjectRecord>;

/// Libraries of one volume, keyed by library name.
pub type LibraryMap = BTreeMap<String, ObjectMap>;

/// The full catalog snapshot. Serializes as the nested mapping
/// `{volume: {library: {object: attributes}}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    pub volumes: BTreeMap<String, LibraryMap>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn get(&self, volume: &str, library: &str, object_name: &str) -> Option<&ObjectRecord> {
        self.volumes.get(volume)?.get(library)?.get(object_name)
    }

    /// Insert or merge an object, creating parent volume and library as
    /// needed. Returns `true` when the object did not exist before.
    pub fn update_object(
        &mut self,
        volume: &str,
        library: &str,
        object_name: &str,
        record: ObjectRecord,
    ) -> bool {
        let objects = self
            .volumes
            .entry(volume.to_string())
            .or_default()
            .entry(library.to_string())
            .or_default();

        match objects.get(object_name) {
            Some(existing) => {
                let merged = record.merged_over(existing);
                objects.insert(object_name.to_string(), merged);
                false
            }
            None => {
                objects.insert(object_name.to_string(), record);
                true
            }
        }
    }

    /// Delete an object. Returns `false` when it did not exist. An emptied
    /// library is removed, and an emptied volume in turn.
    pub fn delete_object(&mut self, volume: &str, library: &str, object_name: &str) -> bool {
        let Some(libraries) = self.volumes.get_mut(volume) else {
            return false;
        };
        let Some(objects) = libraries.get_mut(library) else {
            return false;
        };
        if objects.remove(object_name).is_none() {
            return false;
        }
        if objects.is_empty() {
            libraries.remove(library);
            if libraries.is_empty() {
                self.volumes.remove(volume);
            }
        }
        true
    }

    /// Deep-merge another catalog into this one at the library level:
    /// incoming objects overwrite existing ones of the same name.
    pub fn merge_from(&mut self, other: Catalog) {
        for (volume, libraries) in other.volumes {
            let target = self.volumes.entry(volume).or_default();
            for (library, objects) in libraries {
                target.entry(library).or_default().extend(objects);
            }
        }
    }

    pub fn object_count(&self) -> usize {
        self.volumes
            .values()
            .flat_map(|libs| libs.values())
            .map(|objs| objs.len())
            .sum()
    }

    pub fn volume_count(&self) -> usize {
        self.volumes.len()
    }

    pub fn library_count(&self) -> usize {
        self.volumes.values().map(|libs| libs.len()).sum()
    }

    /// Object counts grouped by TYPE, keyed by the wire name.
    pub fn objects_by_type(&self) -> BTreeMap<String, u64> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for (_, _, _, record) in self.iter_objects() {
            *counts
                .entry(record.object_type().as_str().to_string())
                .or_default() += 1;
        }
        counts
    }

    /// Iterate every object as `(volume, library, name, record)`.
    pub fn iter_objects(&self) -> impl Iterator<Item = (&str, &str, &str, &ObjectRecord)> {
        self.volumes.iter().flat_map(|(volume, libraries)| {
            libraries.iter().flat_map(move |(library, objects)| {
                objects.iter().map(move |(name, record)| {
                    (volume.as_str(), library.as_str(), name.as_str(), record)
                })
            })
        })
    }
}

/// Three-level recursive diff between two catalogs, in both directions.
///
/// Reports missing volumes/libraries/objects and TYPE mismatches from the
/// source's point of view, then extras present only in the target. Every
/// discrepancy is a human-readable string.
pub fn diff_catalogs(source: &Catalog, target: &Catalog) -> Vec<String> {
    let mut differences = Vec::new();

    for (volume, libraries) in &source.volumes {
        let Some(target_libraries) = target.volumes.get(volume) else {
            differences.push(format!("Missing volume: {volume}"));
            continue;
        };
        for (library, objects) in libraries {
            let Some(target_objects) = target_libraries.get(library) else {
                differences.push(format!("Missing library: {volume}.{library}"));
                continue;
            };
            for (name, record) in objects {
                match target_objects.get(name) {
                    None => {
                        differences.push(format!("Missing object: {volume}.{library}.{name}"));
                    }
                    Some(target_record) => {
                        if record.object_type() != target_record.object_type() {
                            differences.push(format!("Type mismatch: {volume}.{library}.{name}"));
                        }
                    }
                }
            }
        }
    }

    for (volume, libraries) in &target.volumes {
        let Some(source_libraries) = source.volumes.get(volume) else {
            differences.push(format!("Extra volume in target: {volume}"));
            continue;
        };
        for (library, objects) in libraries {
            let Some(source_objects) = source_libraries.get(library) else {
                differences.push(format!("Extra library in target: {volume}.{library}"));
                continue;
            };
            for name in objects.keys() {
                if !source_objects.contains_key(name) {
                    differences.push(format!("Extra object in target: {volume}.{library}.{name}"));
                }
            }
        }
    }

    differences
}
