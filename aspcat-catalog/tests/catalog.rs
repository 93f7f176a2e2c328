use aspcat_catalog::*;

fn pgm(pgm_type: &str) -> ObjectRecord {
    ObjectRecord::new(TypeAttrs::Pgm(PgmAttrs {
        pgm_type: Some(pgm_type.to_string()),
        encoding: None,
        compiled: None,
    }))
}

fn dataset() -> ObjectRecord {
    ObjectRecord::new(TypeAttrs::Dataset(DatasetAttrs {
        rec_type: Some("FB".to_string()),
        rec_len: Some(80),
        encoding: None,
    }))
}

#[test]
fn update_creates_parents_implicitly() {
    let mut catalog = Catalog::new();
    let created = catalog.update_object("DISK01", "TESTLIB", "PGM1", pgm("JAVA"));
    assert!(created);
    assert_eq!(catalog.volume_count(), 1);
    assert_eq!(catalog.library_count(), 1);
    assert!(catalog.get("DISK01", "TESTLIB", "PGM1").is_some());
}

#[test]
fn second_update_merges_instead_of_replacing() {
    let mut catalog = Catalog::new();
    let mut first = pgm("JAVA");
    first.created = Some("2025-01-01T00:00:00Z".to_string());
    catalog.update_object("DISK01", "TESTLIB", "PGM1", first);

    let mut second = ObjectRecord::new(TypeAttrs::Pgm(PgmAttrs::default()));
    second.description = Some("nightly".to_string());
    let created = catalog.update_object("DISK01", "TESTLIB", "PGM1", second);
    assert!(!created);

    let stored = catalog.get("DISK01", "TESTLIB", "PGM1").unwrap();
    assert_eq!(stored.attr_text("PGMTYPE").as_deref(), Some("JAVA"));
    assert_eq!(stored.created.as_deref(), Some("2025-01-01T00:00:00Z"));
    assert_eq!(stored.description.as_deref(), Some("nightly"));
}

#[test]
fn delete_prunes_emptied_parents() {
    let mut catalog = Catalog::new();
    catalog.update_object("DISK01", "TESTLIB", "PGM1", pgm("JAVA"));
    catalog.update_object("DISK01", "DATALIB", "FILE1", dataset());

    assert!(catalog.delete_object("DISK01", "TESTLIB", "PGM1"));
    assert!(!catalog.volumes["DISK01"].contains_key("TESTLIB"));
    assert_eq!(catalog.volume_count(), 1);

    assert!(catalog.delete_object("DISK01", "DATALIB", "FILE1"));
    assert!(catalog.is_empty());
}

#[test]
fn delete_of_missing_object_reports_false() {
    let mut catalog = Catalog::new();
    catalog.update_object("DISK01", "TESTLIB", "PGM1", pgm("JAVA"));
    assert!(!catalog.delete_object("DISK01", "TESTLIB", "NOPE"));
    assert!(!catalog.delete_object("DISK01", "NOLIB", "PGM1"));
    assert!(!catalog.delete_object("NOVOL", "TESTLIB", "PGM1"));
    assert_eq!(catalog.object_count(), 1);
}

#[test]
fn merge_from_overwrites_per_object() {
    let mut base = Catalog::new();
    base.update_object("DISK01", "TESTLIB", "PGM1", pgm("JAVA"));
    base.update_object("DISK01", "TESTLIB", "PGM2", pgm("COBOL"));

    let mut incoming = Catalog::new();
    incoming.update_object("DISK01", "TESTLIB", "PGM2", pgm("SHELL"));
    incoming.update_object("DISK02", "OTHERLIB", "FILE1", dataset());

    base.merge_from(incoming);
    assert_eq!(
        base.get("DISK01", "TESTLIB", "PGM1")
            .unwrap()
            .attr_text("PGMTYPE")
            .as_deref(),
        Some("JAVA")
    );
    assert_eq!(
        base.get("DISK01", "TESTLIB", "PGM2")
            .unwrap()
            .attr_text("PGMTYPE")
            .as_deref(),
        Some("SHELL")
    );
    assert!(base.get("DISK02", "OTHERLIB", "FILE1").is_some());
}

#[test]
fn counts_and_type_breakdown() {
    let mut catalog = Catalog::new();
    catalog.update_object("DISK01", "TESTLIB", "PGM1", pgm("JAVA"));
    catalog.update_object("DISK01", "TESTLIB", "PGM2", pgm("COBOL"));
    catalog.update_object("DISK01", "DATALIB", "FILE1", dataset());

    assert_eq!(catalog.object_count(), 3);
    assert_eq!(catalog.library_count(), 2);
    let by_type = catalog.objects_by_type();
    assert_eq!(by_type["PGM"], 2);
    assert_eq!(by_type["DATASET"], 1);
}

#[test]
fn diff_reports_both_directions() {
    let mut source = Catalog::new();
    source.update_object("DISK01", "TESTLIB", "PGM1", pgm("JAVA"));
    source.update_object("DISK01", "TESTLIB", "PGM2", pgm("COBOL"));

    let mut target = Catalog::new();
    target.update_object("DISK01", "TESTLIB", "PGM1", dataset());
    target.update_object("DISK01", "TESTLIB", "EXTRA", pgm("JAVA"));

    let differences = diff_catalogs(&source, &target);
    assert!(differences.contains(&"Type mismatch: DISK01.TESTLIB.PGM1".to_string()));
    assert!(differences.contains(&"Missing object: DISK01.TESTLIB.PGM2".to_string()));
    assert!(differences.contains(&"Extra object in target: DISK01.TESTLIB.EXTRA".to_string()));
}

#[test]
fn diff_of_identical_catalogs_is_empty() {
    let mut catalog = Catalog::new();
    catalog.update_object("DISK01", "TESTLIB", "PGM1", pgm("JAVA"));
    assert!(diff_catalogs(&catalog, &catalog.clone()).is_empty());
}
