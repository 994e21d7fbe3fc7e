use cardops_recon::model::{Cell, Table};
use cardops_store::{Store, StoreError, TableNames, UploadMode, UploadOptions};

fn cell(s: &str) -> Cell {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

fn mis(columns: &[&str], rows: &[&[&str]]) -> Table {
    Table::from_rows(
        columns.iter().map(|c| c.to_string()).collect(),
        rows.iter().map(|r| r.iter().map(|v| cell(v)).collect()).collect(),
    )
}

fn lc2_of(store: &Store, id: &str) -> Option<String> {
    let t = store
        .execute_query(&format!(
            "SELECT \"LC2_CODE\" FROM \"HDFC_MIS_Data\" WHERE \"APPLICATION_REFERENCE_NUMBER\" = '{id}'"
        ))
        .unwrap();
    t.rows.first().and_then(|r| r[0].clone())
}

fn open(dir: &tempfile::TempDir) -> Store {
    Store::open(&dir.path().join("cardops.db"), TableNames::default()).unwrap()
}

#[test]
fn upsert_updates_existing_and_inserts_new() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open(&dir);
    let cols = ["APPLICATION_REFERENCE_NUMBER", "LC2_CODE", "FINAL_DECISION_DATE"];

    store
        .upload_mis(mis(&cols, &[&["A1", "CG1", "2024-01-01"], &["A2", "CG2", "2024-01-02"]]), &UploadOptions::default())
        .unwrap();

    let report = store
        .upload_mis(
            mis(&cols, &[&["A2", "OLD", ""], &["A3", "CG3", "05/02/2024"], &["A2", "CG2-NEW", "garbage"]]),
            &UploadOptions::default(),
        )
        .unwrap();

    assert!(!report.created_table);
    assert_eq!(report.rows_in_file, 3);
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(report.updated_records, 1);
    assert_eq!(report.new_records, 1);
    assert_eq!(report.total_rows, 3);
    assert_eq!(report.coerced_dates.get("FINAL_DECISION_DATE"), Some(&1));

    // Last occurrence in the file wins.
    assert_eq!(lc2_of(&store, "A2").as_deref(), Some("CG2-NEW"));
    assert_eq!(lc2_of(&store, "A1").as_deref(), Some("CG1"));

    let info = store.mis_info().unwrap();
    assert!(info.exists);
    assert_eq!(info.row_count, 3);
    assert!(info.last_updated.is_some());
}

#[test]
fn upsert_keeps_only_common_columns() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open(&dir);
    store
        .upload_mis(mis(&["APPLICATION_REFERENCE_NUMBER", "LC2_CODE"], &[&["A1", "CG1"]]), &UploadOptions::default())
        .unwrap();

    let report = store
        .upload_mis(
            mis(&["APPLICATION_REFERENCE_NUMBER", "EXTRA", "LC2_CODE"], &[&["A1", "x", "CG9"]]),
            &UploadOptions::default(),
        )
        .unwrap();
    assert_eq!(report.ignored_columns, vec!["EXTRA"]);
    assert_eq!(report.columns, vec!["APPLICATION_REFERENCE_NUMBER", "LC2_CODE"]);
    assert_eq!(lc2_of(&store, "A1").as_deref(), Some("CG9"));

    let err = store
        .upload_mis(mis(&["SOMETHING_ELSE"], &[&["x"]]), &UploadOptions::default())
        .unwrap_err();
    assert_eq!(err, StoreError::NoCommonColumns { table: "HDFC_MIS_Data".into() });
}

#[test]
fn replace_mode_rebuilds_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open(&dir);
    store
        .upload_mis(mis(&["APPLICATION_REFERENCE_NUMBER", "LC2_CODE"], &[&["A1", "CG1"], &["A2", "CG2"]]), &UploadOptions::default())
        .unwrap();

    let replace = UploadOptions { mode: UploadMode::Replace, actor: "ops".into() };
    let report = store
        .upload_mis(mis(&["APPLICATION_REFERENCE_NUMBER", "NEW_COL"], &[&["B1", "v"]]), &replace)
        .unwrap();
    assert!(report.created_table);
    assert_eq!(report.total_rows, 1);
    let cols: Vec<String> = store.list_columns("HDFC_MIS_Data").unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(cols, vec!["APPLICATION_REFERENCE_NUMBER", "NEW_COL"]);
}

#[test]
fn failed_upsert_rolls_back_everything() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open(&dir);
    store
        .connection()
        .execute_batch(
            r#"CREATE TABLE "HDFC_MIS_Data" (
                "APPLICATION_REFERENCE_NUMBER" TEXT,
                "LC2_CODE" TEXT CHECK ("LC2_CODE" <> 'BAD')
            );
            INSERT INTO "HDFC_MIS_Data" VALUES ('A1', 'CG1');"#,
        )
        .unwrap();

    // The delete of A1 succeeds, then the insert trips the CHECK constraint.
    let err = store
        .upload_mis(
            mis(&["APPLICATION_REFERENCE_NUMBER", "LC2_CODE"], &[&["A1", "BAD"], &["A9", "CG9"]]),
            &UploadOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));

    assert_eq!(lc2_of(&store, "A1").as_deref(), Some("CG1"));
    assert_eq!(lc2_of(&store, "A9"), None);
    assert!(!store.table_exists("HDFC_MIS_Data_temp").unwrap());
    assert_eq!(store.mis_info().unwrap().last_updated, None);
}

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = open(&dir);
        store
            .upload_mis(mis(&["APPLICATION_REFERENCE_NUMBER"], &[&["A1"]]), &UploadOptions::default())
            .unwrap();
    }
    let store = open(&dir);
    assert_eq!(store.load_mis().unwrap().len(), 1);
}
