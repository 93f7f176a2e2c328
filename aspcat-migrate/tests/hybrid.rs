use aspcat_backend::{BackendKind, CatalogManager, ConfigStore, ManagerConfig};
use aspcat_catalog::*;
use aspcat_migrate::HybridBackend;
use tempfile::TempDir;

fn pgm(pgm_type: &str) -> ObjectRecord {
    ObjectRecord::new(TypeAttrs::Pgm(PgmAttrs {
        pgm_type: Some(pgm_type.to_string()),
        encoding: None,
        compiled: None,
    }))
}

fn manager(config: &ManagerConfig) -> CatalogManager {
    CatalogManager::open(config).unwrap()
}

#[test]
fn writes_fan_out_to_every_backend() {
    let dir = TempDir::new().unwrap();
    let file_config = ManagerConfig::json_file(dir.path().join("catalog.json"));
    let sqlite_config = ManagerConfig::sqlite(dir.path().join("catalog.db"));

    let mut hybrid = HybridBackend::new(
        manager(&file_config),
        vec![manager(&file_config), manager(&sqlite_config)],
    );
    assert!(hybrid.update_catalog_info("DISK01", "TESTLIB", "PGM1", pgm("JAVA")));
    assert!(hybrid.get_write_errors().is_empty());

    // Reads come from the read manager (the file backend).
    assert!(hybrid.get_object("DISK01", "TESTLIB", "PGM1").unwrap().is_some());
    hybrid.close();

    let sqlite = manager(&sqlite_config);
    assert!(sqlite.get_object("DISK01", "TESTLIB", "PGM1").unwrap().is_some());
    sqlite.close();
}

#[test]
fn one_failing_backend_does_not_stop_the_fan_out() {
    let dir = TempDir::new().unwrap();
    let good_config = ManagerConfig::json_file(dir.path().join("catalog.json"));
    // A catalog path that is a directory: the backend opens, but every
    // read-modify-write cycle fails.
    let broken_path = dir.path().join("broken");
    std::fs::create_dir_all(&broken_path).unwrap();
    let broken_config = ManagerConfig::json_file(broken_path);

    let mut hybrid = HybridBackend::new(
        manager(&good_config),
        vec![manager(&good_config), manager(&broken_config)],
    );

    let all_ok = hybrid.update_catalog_info("DISK01", "TESTLIB", "PGM1", pgm("JAVA"));
    assert!(!all_ok);
    assert_eq!(hybrid.get_write_errors().len(), 1);

    // The healthy backend still took the write.
    assert!(hybrid.get_object("DISK01", "TESTLIB", "PGM1").unwrap().is_some());

    // The error list is per operation, not cumulative.
    hybrid.delete_catalog_entry("DISK01", "TESTLIB", "PGM1");
    assert_eq!(hybrid.get_write_errors().len(), 1);
    hybrid.close();
}

#[test]
fn deletes_fan_out_and_misses_are_not_errors() {
    let dir = TempDir::new().unwrap();
    let file_config = ManagerConfig::json_file(dir.path().join("catalog.json"));
    let sqlite_config = ManagerConfig::sqlite(dir.path().join("catalog.db"));

    let mut hybrid = HybridBackend::new(
        manager(&file_config),
        vec![manager(&file_config), manager(&sqlite_config)],
    );
    hybrid.update_catalog_info("DISK01", "TESTLIB", "PGM1", pgm("JAVA"));

    assert!(hybrid.delete_catalog_entry("DISK01", "TESTLIB", "PGM1"));
    assert!(hybrid.delete_catalog_entry("DISK01", "TESTLIB", "PGM1"));
    assert!(hybrid.get_write_errors().is_empty());
    hybrid.close();
}

#[test]
fn builds_from_a_config_store_migration_window() {
    let dir = TempDir::new().unwrap();
    let mut store = ConfigStore::load(dir.path().join("catalog_backend.json")).unwrap();
    store
        .enable_migration(
            BackendKind::JsonFile,
            vec![BackendKind::JsonFile, BackendKind::Sqlite],
        )
        .unwrap();

    let mut hybrid = HybridBackend::from_config_store(&store).unwrap();
    assert!(hybrid.update_catalog_info("DISK01", "TESTLIB", "PGM1", pgm("JAVA")));
    assert_eq!(hybrid.get_catalog_info().unwrap().object_count(), 1);
    hybrid.close();

    // Both write backends now hold the object.
    let sqlite = manager(store.backend_config(BackendKind::Sqlite).unwrap());
    assert!(sqlite.get_object("DISK01", "TESTLIB", "PGM1").unwrap().is_some());
    sqlite.close();
}

#[test]
fn requires_an_open_migration_window() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::load(dir.path().join("catalog_backend.json")).unwrap();
    assert!(HybridBackend::from_config_store(&store).is_err());
}
