use aspcat_catalog::*;
use tempfile::TempDir;

fn sample() -> Catalog {
    let mut catalog = Catalog::new();
    let mut record = ObjectRecord::new(TypeAttrs::Pgm(PgmAttrs {
        pgm_type: Some("JAVA".to_string()),
        encoding: None,
        compiled: None,
    }));
    record.created = Some("2025-01-01T00:00:00Z".to_string());
    catalog.update_object("DISK01", "TESTLIB", "PGM1", record);
    catalog
}

#[test]
fn snapshot_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    let catalog = sample();

    write_snapshot(&path, &catalog).unwrap();
    let restored = read_snapshot(&path).unwrap();
    assert_eq!(restored, catalog);
}

#[test]
fn write_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deep").join("snapshot.json");
    write_snapshot(&path, &sample()).unwrap();
    assert!(path.exists());
}

#[test]
fn read_of_missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let result = read_snapshot(&dir.path().join("absent.json"));
    assert!(matches!(result, Err(SnapshotError::Io { .. })));
}

#[test]
fn read_of_invalid_json_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{not json").unwrap();
    let result = read_snapshot(&path);
    assert!(matches!(result, Err(SnapshotError::Parse { .. })));
}
