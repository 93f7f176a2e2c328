//! One-shot catalog migration between two configured backends.
//!
//! The happy path: back up the source, copy everything into the target
//! (replace, not merge), then validate the two stores object-by-object.
//! Dry runs read the source and report what would move without touching
//! anything. Rollback re-imports a backup snapshot into the target.

use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use aspcat_backend::{BackendError, BackendKind, CatalogManager, ImportStats, ManagerConfig};
use aspcat_catalog::{SnapshotError, diff_catalogs, read_snapshot, write_snapshot};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration failed: {0}")]
    Failed(String),
    #[error("backup file not found: {0}")]
    BackupNotFound(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Knobs for one migration run.
#[derive(Debug, Clone, Copy)]
pub struct MigrationOptions {
    pub backup_before: bool,
    pub validate_after: bool,
    pub dry_run: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            backup_before: true,
            validate_after: true,
            dry_run: false,
        }
    }
}

/// Object-by-object comparison of source and target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub success: bool,
    pub source_objects: u64,
    pub target_objects: u64,
    pub count_match: bool,
    pub differences: Vec<String>,
}

/// Everything one migration run did, shaped for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationStats {
    pub migration_id: String,
    pub source_backend: BackendKind,
    pub target_backend: BackendKind,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub dry_run: bool,
    pub backup_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    pub source_objects: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    pub errors: Vec<String>,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackStats {
    pub backup_path: PathBuf,
    pub restored_objects: u64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    SourceToTarget,
    TargetToSource,
}

impl SyncDirection {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "source_to_target" | "source-to-target" | "forward" => Some(Self::SourceToTarget),
            "target_to_source" | "target-to-source" | "reverse" => Some(Self::TargetToSource),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStats {
    pub direction: SyncDirection,
    pub import: ImportStats,
    pub timestamp: String,
}

/// Orchestrates migration between one source and one target configuration.
pub struct MigrationManager {
    source: ManagerConfig,
    target: ManagerConfig,
}

impl MigrationManager {
    pub fn new(source: ManagerConfig, target: ManagerConfig) -> Self {
        Self { source, target }
    }

    fn backup_dir(&self) -> PathBuf {
        self.target.backup_location()
    }

    /// Copy the source catalog into the target, replacing its contents.
    pub fn migrate_catalog(
        &self,
        options: MigrationOptions,
    ) -> Result<MigrationStats, MigrationError> {
        let migration_id = Utc::now().format("migration_%Y%m%d_%H%M%S").to_string();
        let mut stats = MigrationStats {
            migration_id: migration_id.clone(),
            source_backend: self.source.backend,
            target_backend: self.target.backend,
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
            dry_run: options.dry_run,
            backup_created: false,
            backup_path: None,
            source_objects: 0,
            import: None,
            validation: None,
            errors: Vec::new(),
            success: false,
        };
        info!(
            "starting migration {migration_id}: {} -> {} (dry_run={})",
            self.source.backend, self.target.backend, options.dry_run
        );

        let source = CatalogManager::open(&self.source)?;
        let catalog = match source.get_catalog_info() {
            Ok(catalog) => catalog,
            Err(e) => {
                source.close();
                return Err(e.into());
            }
        };
        stats.source_objects = catalog.object_count() as u64;

        if options.dry_run {
            source.close();
            info!(
                "dry run: would migrate {} objects to {}",
                stats.source_objects, self.target.backend
            );
            stats.completed_at = Some(Utc::now().to_rfc3339());
            stats.success = true;
            return Ok(stats);
        }

        if options.backup_before {
            match self.create_backup(&source, &migration_id) {
                Ok(path) => {
                    stats.backup_created = true;
                    stats.backup_path = Some(path);
                }
                Err(e) => {
                    source.close();
                    return Err(e);
                }
            }
        }
        source.close();

        let target = CatalogManager::open(&self.target)?;
        let import = match target.import_catalog(catalog, false) {
            Ok(import) => import,
            Err(e) => {
                target.close();
                return Err(e.into());
            }
        };
        target.close();
        if import.errors > 0 {
            stats
                .errors
                .push(format!("{} objects failed to import", import.errors));
        }
        stats.import = Some(import);

        if options.validate_after {
            let validation = self.validate()?;
            if !validation.success {
                warn!(
                    "migration {migration_id} validation found {} differences",
                    validation.differences.len()
                );
                stats.errors.push("validation failed".to_string());
            }
            stats.validation = Some(validation);
        }

        stats.completed_at = Some(Utc::now().to_rfc3339());
        stats.success = stats.errors.is_empty();
        info!(
            "migration {migration_id} finished (success={})",
            stats.success
        );
        Ok(stats)
    }

    /// Write the source catalog to the backup directory. For a file-backed
    /// source, the raw file is copied alongside the snapshot so a byte-exact
    /// original survives.
    fn create_backup(
        &self,
        source: &CatalogManager,
        migration_id: &str,
    ) -> Result<PathBuf, MigrationError> {
        let dir = self.backup_dir();
        std::fs::create_dir_all(&dir).map_err(BackendError::from)?;

        let backup_path = dir.join(format!("catalog_backup_{migration_id}.json"));
        let catalog = source.get_catalog_info()?;
        write_snapshot(&backup_path, &catalog)?;
        info!("backup written to {}", backup_path.display());

        if let Some(file_settings) = self
            .source
            .json_file
            .as_ref()
            .filter(|_| self.source.backend == BackendKind::JsonFile)
        {
            let original_copy = dir.join(format!("catalog_original_{migration_id}.json"));
            if let Err(e) = std::fs::copy(&file_settings.file_path, &original_copy) {
                warn!(
                    "could not copy original catalog file {}: {e}",
                    file_settings.file_path.display()
                );
            }
        }
        Ok(backup_path)
    }

    /// Compare source and target catalogs in both directions.
    pub fn validate(&self) -> Result<ValidationReport, MigrationError> {
        let source = CatalogManager::open(&self.source)?;
        let source_catalog = match source.get_catalog_info() {
            Ok(catalog) => catalog,
            Err(e) => {
                source.close();
                return Err(e.into());
            }
        };
        source.close();

        let target = CatalogManager::open(&self.target)?;
        let target_catalog = match target.get_catalog_info() {
            Ok(catalog) => catalog,
            Err(e) => {
                target.close();
                return Err(e.into());
            }
        };
        target.close();

        let differences = diff_catalogs(&source_catalog, &target_catalog);
        let source_objects = source_catalog.object_count() as u64;
        let target_objects = target_catalog.object_count() as u64;
        Ok(ValidationReport {
            success: differences.is_empty(),
            source_objects,
            target_objects,
            count_match: source_objects == target_objects,
            differences,
        })
    }

    /// Restore the target from a backup snapshot, replacing its contents.
    pub fn rollback_migration(&self, backup_path: &Path) -> Result<RollbackStats, MigrationError> {
        if !backup_path.exists() {
            return Err(MigrationError::BackupNotFound(
                backup_path.display().to_string(),
            ));
        }
        let catalog = read_snapshot(backup_path)?;
        let restored_objects = catalog.object_count() as u64;

        let target = CatalogManager::open(&self.target)?;
        let result = target.import_catalog(catalog, false);
        target.close();
        result?;

        info!(
            "rolled back target {} from {}",
            self.target.backend,
            backup_path.display()
        );
        Ok(RollbackStats {
            backup_path: backup_path.to_path_buf(),
            restored_objects,
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    /// Merge one backend's catalog into the other. Sync merges rather than
    /// replaces, so objects only in the destination survive.
    pub fn sync_backends(&self, direction: SyncDirection) -> Result<SyncStats, MigrationError> {
        let (from, to) = match direction {
            SyncDirection::SourceToTarget => (&self.source, &self.target),
            SyncDirection::TargetToSource => (&self.target, &self.source),
        };

        let origin = CatalogManager::open(from)?;
        let catalog = match origin.get_catalog_info() {
            Ok(catalog) => catalog,
            Err(e) => {
                origin.close();
                return Err(e.into());
            }
        };
        origin.close();

        let destination = CatalogManager::open(to)?;
        let result = destination.import_catalog(catalog, true);
        destination.close();
        let import = result?;

        info!(
            "synced {} -> {}: {} objects",
            from.backend, to.backend, import.objects
        );
        Ok(SyncStats {
            direction,
            import,
            timestamp: Utc::now().to_rfc3339(),
        })
    }
}
