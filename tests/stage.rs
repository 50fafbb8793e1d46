use anyhow::Result;
use ironfeed::persist::{CsvGzEncoder, Persister};
use ironfeed::testing::{list_files, region_rows, write_csv_fixture};
use ironfeed::{
    ColumnType, DatasetKind, IngestError, StageConfig, TableSchema, classify, read_back, run_stage,
    run_stage_with,
};
use std::collections::HashSet;

fn csv_gz_only() -> Persister {
    Persister::new(vec![Box::new(CsvGzEncoder::default())])
}

#[test]
fn missing_input_fails_before_anything_is_written() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let cfg = StageConfig::for_dataset(DatasetKind::Clicks, tmp.path());

    let err = run_stage(&cfg).unwrap_err();
    match classify(&err) {
        Some(IngestError::MissingInput { path }) => assert_eq!(path, &cfg.input_path),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!tmp.path().join("processed_data").exists());
    Ok(())
}

#[test]
fn malformed_row_aborts_the_stage_without_output() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut rows = region_rows(10, 10);
    rows[2][0] = "three".to_string();
    let mut cfg = StageConfig::for_dataset(DatasetKind::Regions, tmp.path());
    write_csv_fixture(&cfg.input_path, &["region_id", "name"], &rows)?;
    cfg.batch_size = 4;

    let err = run_stage_with(&cfg, &csv_gz_only()).unwrap_err();
    match classify(&err) {
        Some(IngestError::Parse {
            row, column, value, ..
        }) => {
            assert_eq!(*row, 3);
            assert_eq!(column, "region_id");
            assert_eq!(value, "three");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let out_dir = tmp.path().join("processed_data");
    assert!(!out_dir.exists() || list_files(&out_dir)?.is_empty());
    Ok(())
}

#[test]
fn three_column_file_produces_exactly_one_output() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let rows: Vec<Vec<String>> = (0..120)
        .map(|i| vec![i.to_string(), (i % 17).to_string(), format!("{}.5", i % 3)])
        .collect();
    let expected_users: HashSet<&String> = rows.iter().map(|r| &r[1]).collect();

    let mut cfg = StageConfig::for_dataset(DatasetKind::Clicks, tmp.path());
    write_csv_fixture(&cfg.input_path, &["click_id", "user_id", "spend"], &rows)?;
    cfg.schema = TableSchema::of(&[
        ("click_id", ColumnType::Int64),
        ("user_id", ColumnType::Int64),
        ("spend", ColumnType::Float64),
    ])?;
    cfg.batch_size = 50;
    cfg.log_every = 1;

    let report = run_stage_with(&cfg, &csv_gz_only())?;
    assert_eq!(report.stats.total_rows, 120);
    assert_eq!(report.stats.batches, 3);
    assert_eq!(report.stats.distinct_key_count, expected_users.len() as u64);

    let files = list_files(tmp.path().join("processed_data"))?;
    assert_eq!(files, vec![tmp.path().join("processed_data/clicks_processed.csv.gz")]);
    let table = read_back(&files[0], &cfg.schema)?;
    assert_eq!(table.num_rows(), 120);
    assert_eq!(table.num_columns(), 3);
    Ok(())
}

#[test]
fn configured_formats_drive_the_encoder_chain() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut cfg = StageConfig::for_dataset(DatasetKind::Regions, tmp.path());
    write_csv_fixture(&cfg.input_path, &["region_id", "name"], &region_rows(25, 5))?;
    cfg.formats = vec!["csv.gz".to_string()];

    let report = run_stage(&cfg)?;
    assert_eq!(report.output.format, "csv.gz");
    assert_eq!(report.stats.distinct_key_count, 5);
    Ok(())
}

#[test]
fn format_names_are_checked_after_the_other_settings() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut cfg = StageConfig::for_dataset(DatasetKind::Regions, tmp.path());
    cfg.formats = vec!["orc".to_string()];
    cfg.batch_size = 0;

    let err = run_stage(&cfg).unwrap_err();
    assert!(format!("{err:#}").contains("batch_size"), "{err:#}");

    cfg.batch_size = 10;
    let err = run_stage(&cfg).unwrap_err();
    assert!(matches!(
        classify(&err),
        Some(IngestError::Config(msg)) if msg.contains("`orc`")
    ));
    Ok(())
}

#[test]
fn invalid_configuration_is_rejected_up_front() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut cfg = StageConfig::for_dataset(DatasetKind::Regions, tmp.path());
    cfg.key_column = "country".to_string();

    let err = run_stage_with(&cfg, &csv_gz_only()).unwrap_err();
    assert!(matches!(
        classify(&err),
        Some(IngestError::MissingKeyColumn { column }) if column == "country"
    ));
    Ok(())
}
