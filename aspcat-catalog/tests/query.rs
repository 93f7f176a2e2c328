use aspcat_catalog::*;

fn sample() -> Catalog {
    let mut catalog = Catalog::new();

    let mut pgm1 = ObjectRecord::new(TypeAttrs::Pgm(PgmAttrs {
        pgm_type: Some("JAVA".to_string()),
        encoding: Some("UTF-8".to_string()),
        compiled: None,
    }));
    pgm1.description = Some("billing batch driver".to_string());
    catalog.update_object("DISK01", "TESTLIB", "PGM1", pgm1);

    let pgm2 = ObjectRecord::new(TypeAttrs::Pgm(PgmAttrs {
        pgm_type: Some("COBOL".to_string()),
        encoding: None,
        compiled: None,
    }));
    catalog.update_object("DISK01", "TESTLIB", "PGM2", pgm2);

    let mut file1 = ObjectRecord::new(TypeAttrs::Dataset(DatasetAttrs {
        rec_type: Some("FB".to_string()),
        rec_len: Some(80),
        encoding: None,
    }));
    file1.description = Some("billing input".to_string());
    catalog.update_object("DISK02", "DATALIB", "FILE1", file1);

    catalog
}

#[test]
fn filter_by_type_and_volume() {
    let catalog = sample();
    let filter = QueryFilter {
        object_type: Some(ObjectType::Pgm),
        volume: Some("DISK01".to_string()),
        ..QueryFilter::default()
    };
    let rows = run_query(&catalog, &filter, &[], None);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.volume_name == "DISK01"));
}

#[test]
fn filter_by_attribute_value() {
    let catalog = sample();
    let filter = QueryFilter {
        attributes: vec![("PGMTYPE".to_string(), "COBOL".to_string())],
        ..QueryFilter::default()
    };
    let rows = run_query(&catalog, &filter, &[], None);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].object_name, "PGM2");
}

#[test]
fn sort_keys_apply_in_priority_order() {
    let catalog = sample();
    let sort = [SortKey::desc("volume_name"), SortKey::asc("object_name")];
    let rows = run_query(&catalog, &QueryFilter::default(), &sort, None);
    let names: Vec<&str> = rows.iter().map(|row| row.object_name.as_str()).collect();
    assert_eq!(names, ["FILE1", "PGM1", "PGM2"]);
}

#[test]
fn numeric_fields_sort_by_value_not_lexicographically() {
    let mut catalog = Catalog::new();
    for (name, size) in [("BIG", 100), ("SMALL", 9), ("MID", 80)] {
        let mut record = ObjectRecord::new(TypeAttrs::Pgm(PgmAttrs::default()));
        record.size = Some(size);
        catalog.update_object("DISK01", "TESTLIB", name, record);
    }

    let sort = [SortKey::asc("SIZE")];
    let rows = run_query(&catalog, &QueryFilter::default(), &sort, None);
    let names: Vec<&str> = rows.iter().map(|row| row.object_name.as_str()).collect();
    // Lexicographic order would put "100" before "80" and "9".
    assert_eq!(names, ["SMALL", "MID", "BIG"]);
}

#[test]
fn limit_truncates_after_sorting() {
    let catalog = sample();
    let sort = [SortKey::asc("object_name")];
    let rows = run_query(&catalog, &QueryFilter::default(), &sort, Some(2));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].object_name, "FILE1");
}

#[test]
fn search_ranks_name_hits_above_description_hits() {
    let catalog = sample();
    let hits = run_search(&catalog, "billing", None);
    // Both PGM1 and FILE1 match via description only.
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|hit| (hit.rank - 1.3).abs() < 1e-9));

    let hits = run_search(&catalog, "pgm1", None);
    assert_eq!(hits.len(), 1);
    assert!((hits[0].rank - 1.5).abs() < 1e-9);
}

#[test]
fn search_scores_combine_name_and_description() {
    let mut catalog = Catalog::new();
    let mut record = ObjectRecord::new(TypeAttrs::Job(JobAttrs {
        job_type: Some("BATCH".to_string()),
        schedule: None,
    }));
    record.description = Some("payroll job".to_string());
    catalog.update_object("DISK01", "JOBLIB", "PAYROLL", record);

    let hits = run_search(&catalog, "payroll", None);
    assert_eq!(hits.len(), 1);
    assert!((hits[0].rank - 1.8).abs() < 1e-9);
}

#[test]
fn search_respects_type_filter() {
    let catalog = sample();
    let hits = run_search(&catalog, "billing", Some(ObjectType::Dataset));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].row.object_name, "FILE1");
}

#[test]
fn search_is_case_insensitive() {
    let catalog = sample();
    let hits = run_search(&catalog, "BILLING", None);
    assert_eq!(hits.len(), 2);
}
