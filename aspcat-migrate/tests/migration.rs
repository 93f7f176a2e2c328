use aspcat_backend::{BackendKind, CatalogManager, ManagerConfig};
use aspcat_catalog::*;
use aspcat_migrate::{MigrationError, MigrationManager, MigrationOptions, SyncDirection};
use tempfile::TempDir;

fn pgm(pgm_type: &str) -> ObjectRecord {
    ObjectRecord::new(TypeAttrs::Pgm(PgmAttrs {
        pgm_type: Some(pgm_type.to_string()),
        encoding: None,
        compiled: None,
    }))
}

/// A file-backed source with two objects and a SQLite target, both under
/// one temp dir with the backup location pointed inside it.
fn seeded_pair(dir: &TempDir) -> (ManagerConfig, ManagerConfig) {
    let source = ManagerConfig::json_file(dir.path().join("catalog.json"));
    let mut target = ManagerConfig::sqlite(dir.path().join("catalog.db"));
    target.backup_location = Some(dir.path().join("backups"));

    let manager = CatalogManager::open(&source).unwrap();
    manager
        .update_catalog_info("DISK01", "TESTLIB", "PGM1", pgm("JAVA"))
        .unwrap();
    manager
        .update_catalog_info("DISK01", "DATALIB", "PGM2", pgm("COBOL"))
        .unwrap();
    manager.close();

    (source, target)
}

#[test]
fn dry_run_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let (source, target) = seeded_pair(&dir);
    let manager = MigrationManager::new(source, target);

    let stats = manager
        .migrate_catalog(MigrationOptions {
            dry_run: true,
            ..MigrationOptions::default()
        })
        .unwrap();

    assert!(stats.success);
    assert!(stats.dry_run);
    assert_eq!(stats.source_objects, 2);
    assert!(!stats.backup_created);
    assert!(stats.import.is_none());
    assert!(!dir.path().join("catalog.db").exists());
    assert!(!dir.path().join("backups").exists());
}

#[test]
fn full_migration_copies_backs_up_and_validates() {
    let dir = TempDir::new().unwrap();
    let (source, target) = seeded_pair(&dir);
    let manager = MigrationManager::new(source, target.clone());

    let stats = manager.migrate_catalog(MigrationOptions::default()).unwrap();
    assert!(stats.success, "errors: {:?}", stats.errors);
    assert!(stats.backup_created);
    let backup_path = stats.backup_path.unwrap();
    assert!(backup_path.exists());
    // The raw source file is copied alongside the snapshot.
    assert!(
        std::fs::read_dir(dir.path().join("backups"))
            .unwrap()
            .count()
            >= 2
    );

    let import = stats.import.unwrap();
    assert_eq!(import.objects, 2);
    assert_eq!(import.errors, 0);

    let validation = stats.validation.unwrap();
    assert!(validation.success);
    assert!(validation.count_match);

    let target_manager = CatalogManager::open(&target).unwrap();
    let copied = target_manager
        .get_object("DISK01", "TESTLIB", "PGM1")
        .unwrap()
        .unwrap();
    assert_eq!(copied.attr_text("PGMTYPE").as_deref(), Some("JAVA"));
    target_manager.close();
}

#[test]
fn validation_reports_differences() {
    let dir = TempDir::new().unwrap();
    let (source, target) = seeded_pair(&dir);
    let manager = MigrationManager::new(source, target.clone());
    manager.migrate_catalog(MigrationOptions::default()).unwrap();

    // Drift the target.
    let target_manager = CatalogManager::open(&target).unwrap();
    target_manager
        .update_catalog_info("DISK01", "TESTLIB", "EXTRA", pgm("SHELL"))
        .unwrap();
    target_manager.close();

    let report = manager.validate().unwrap();
    assert!(!report.success);
    assert!(!report.count_match);
    assert!(
        report
            .differences
            .contains(&"Extra object in target: DISK01.TESTLIB.EXTRA".to_string())
    );
}

#[test]
fn rollback_restores_the_backup_snapshot() {
    let dir = TempDir::new().unwrap();
    let (source, target) = seeded_pair(&dir);
    let manager = MigrationManager::new(source, target.clone());
    let stats = manager.migrate_catalog(MigrationOptions::default()).unwrap();
    let backup_path = stats.backup_path.unwrap();

    // Damage the target, then roll back.
    let target_manager = CatalogManager::open(&target).unwrap();
    target_manager
        .delete_catalog_entry("DISK01", "TESTLIB", "PGM1")
        .unwrap();
    target_manager.close();

    let rollback = manager.rollback_migration(&backup_path).unwrap();
    assert_eq!(rollback.restored_objects, 2);

    let report = manager.validate().unwrap();
    assert!(report.success);
}

#[test]
fn rollback_of_missing_backup_is_an_error() {
    let dir = TempDir::new().unwrap();
    let (source, target) = seeded_pair(&dir);
    let manager = MigrationManager::new(source, target);
    let result = manager.rollback_migration(&dir.path().join("nope.json"));
    assert!(matches!(result, Err(MigrationError::BackupNotFound(_))));
}

#[test]
fn sync_merges_instead_of_replacing() {
    let dir = TempDir::new().unwrap();
    let (source, target) = seeded_pair(&dir);

    // Give the target an object of its own before syncing.
    let target_manager = CatalogManager::open(&target).unwrap();
    target_manager
        .update_catalog_info("DISK09", "LOCALLIB", "LOCAL1", pgm("SHELL"))
        .unwrap();
    target_manager.close();

    let manager = MigrationManager::new(source, target.clone());
    let stats = manager.sync_backends(SyncDirection::SourceToTarget).unwrap();
    assert_eq!(stats.import.objects, 2);

    let target_manager = CatalogManager::open(&target).unwrap();
    let catalog = target_manager.get_catalog_info().unwrap();
    target_manager.close();
    assert_eq!(catalog.object_count(), 3);
    assert!(catalog.get("DISK09", "LOCALLIB", "LOCAL1").is_some());
    assert!(catalog.get("DISK01", "TESTLIB", "PGM1").is_some());
}

#[test]
fn sync_runs_in_both_directions() {
    let dir = TempDir::new().unwrap();
    let (source, target) = seeded_pair(&dir);

    let target_manager = CatalogManager::open(&target).unwrap();
    target_manager
        .update_catalog_info("DISK09", "LOCALLIB", "LOCAL1", pgm("SHELL"))
        .unwrap();
    target_manager.close();

    let manager = MigrationManager::new(source.clone(), target);
    manager.sync_backends(SyncDirection::TargetToSource).unwrap();

    let source_manager = CatalogManager::open(&source).unwrap();
    let catalog = source_manager.get_catalog_info().unwrap();
    source_manager.close();
    assert_eq!(catalog.object_count(), 3);
}

#[test]
fn migration_preserves_source_timestamps() {
    let dir = TempDir::new().unwrap();
    let (source, target) = seeded_pair(&dir);

    let source_manager = CatalogManager::open(&source).unwrap();
    let original = source_manager
        .get_object("DISK01", "TESTLIB", "PGM1")
        .unwrap()
        .unwrap();
    source_manager.close();

    let manager = MigrationManager::new(source, target.clone());
    manager.migrate_catalog(MigrationOptions::default()).unwrap();

    let target_manager = CatalogManager::open(&target).unwrap();
    let copied = target_manager
        .get_object("DISK01", "TESTLIB", "PGM1")
        .unwrap()
        .unwrap();
    target_manager.close();
    assert_eq!(copied.created, original.created);
    assert_eq!(copied.updated, original.updated);
}
