use aspcat_backend::*;
use tempfile::TempDir;

fn store_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("catalog_backend.json")
}

#[test]
fn missing_file_seeds_defaults() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::load(store_path(&dir)).unwrap();
    assert_eq!(store.active_backend(), BackendKind::JsonFile);
    assert!(!store.migration_mode());
    assert!(store.backend_config(BackendKind::JsonFile).is_some());
    assert!(store.backend_config(BackendKind::Sqlite).is_some());
}

#[test]
fn save_then_load_round_trips() {
    let dir = TempDir::new().unwrap();
    let mut store = ConfigStore::load(store_path(&dir)).unwrap();
    store.set_active_backend(BackendKind::Sqlite).unwrap();

    let reloaded = ConfigStore::load(store_path(&dir)).unwrap();
    assert_eq!(reloaded.active_backend(), BackendKind::Sqlite);
}

#[test]
fn switching_to_unsupported_backend_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut store = ConfigStore::load(store_path(&dir)).unwrap();
    assert!(matches!(
        store.set_active_backend(BackendKind::Postgresql),
        Err(BackendError::Unsupported("postgresql"))
    ));
    assert_eq!(store.active_backend(), BackendKind::JsonFile);
}

#[test]
fn migration_window_persists() {
    let dir = TempDir::new().unwrap();
    let mut store = ConfigStore::load(store_path(&dir)).unwrap();
    store
        .enable_migration(
            BackendKind::JsonFile,
            vec![BackendKind::JsonFile, BackendKind::Sqlite],
        )
        .unwrap();

    let reloaded = ConfigStore::load(store_path(&dir)).unwrap();
    assert!(reloaded.migration_mode());
    let settings = reloaded.migration_settings().unwrap();
    assert_eq!(settings.read_backend, BackendKind::JsonFile);
    assert_eq!(settings.write_backends.len(), 2);

    let mut reloaded = reloaded;
    reloaded.disable_migration().unwrap();
    assert!(!reloaded.migration_mode());
    assert!(reloaded.migration_settings().is_none());
}

#[test]
fn migration_needs_a_write_backend() {
    let dir = TempDir::new().unwrap();
    let mut store = ConfigStore::load(store_path(&dir)).unwrap();
    assert!(matches!(
        store.enable_migration(BackendKind::JsonFile, vec![]),
        Err(BackendError::Validation(_))
    ));
}

#[test]
fn cache_config_uses_the_type_wire_key() {
    let config: CacheConfig = serde_json::from_value(serde_json::json!({
        "enabled": true,
        "type": "memory",
        "max_size": 50,
        "default_ttl": 120
    }))
    .unwrap();
    assert_eq!(config.cache_type, "memory");

    let value = serde_json::to_value(&config).unwrap();
    assert_eq!(value["type"], "memory");
    assert!(value.get("cache_type").is_none());
}

#[test]
fn status_probes_every_configured_backend() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::load(store_path(&dir)).unwrap();
    let status = store.status();

    assert_eq!(status["active_backend"], "json_file");
    let backends = status["backends"].as_object().unwrap();
    assert_eq!(backends["json_file"]["status"], "healthy");
    assert_eq!(backends["sqlite"]["status"], "healthy");
}

#[test]
fn probe_of_unsupported_backend_reports_not_implemented() {
    let dir = TempDir::new().unwrap();
    let mut store = ConfigStore::load(store_path(&dir)).unwrap();
    let mut config = ManagerConfig::json_file(dir.path().join("catalog.json"));
    config.backend = BackendKind::Postgresql;
    store.set_backend_config(BackendKind::Postgresql, config);

    let report = store.probe_backend(BackendKind::Postgresql);
    assert_eq!(report.status, HealthStatus::NotImplemented);
}
