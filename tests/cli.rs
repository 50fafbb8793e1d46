use anyhow::Result;
use ironfeed::testing::{list_files, region_rows, write_csv_fixture};
use std::path::Path;
use std::process::{Command, Output};

fn ironfeed(root: &Path, args: &[&str]) -> Result<Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_ironfeed"))
        .arg("--project-root")
        .arg(root)
        .arg("--no-log-file")
        .args(args)
        .env_remove("RUST_LOG")
        .output()?;
    Ok(output)
}

#[test]
fn missing_input_exits_with_status_one() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let out = ironfeed(tmp.path(), &["ingest", "regions"])?;
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stdout).contains("input file not found"));
    assert!(!tmp.path().join("processed_data").exists());
    Ok(())
}

#[test]
fn malformed_row_exits_with_status_one() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut rows = region_rows(10, 10);
    rows[2][0] = "three".to_string();
    write_csv_fixture(tmp.path().join("data/regions.csv"), &["region_id", "name"], &rows)?;

    let out = ironfeed(tmp.path(), &["ingest", "regions", "--format", "csv.gz"])?;
    assert_eq!(out.status.code(), Some(1));
    assert!(!tmp.path().join("processed_data").exists());
    Ok(())
}

#[test]
fn valid_input_exits_with_status_zero_and_one_output() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    write_csv_fixture(
        tmp.path().join("data/regions.csv"),
        &["region_id", "name"],
        &region_rows(120, 7),
    )?;
    let stats = tmp.path().join("stats.json");

    let out = ironfeed(
        tmp.path(),
        &[
            "ingest",
            "regions",
            "--format",
            "csv.gz",
            "--batch-size",
            "1000000000000",
            "--stats-json",
            &stats.to_string_lossy(),
        ],
    )?;
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stdout));
    assert_eq!(
        list_files(tmp.path().join("processed_data"))?,
        vec![tmp.path().join("processed_data/regions_processed.csv.gz")]
    );

    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&stats)?)?;
    assert_eq!(saved["total_rows"], 120);
    assert_eq!(saved["distinct_key_count"], 7);
    Ok(())
}

#[test]
fn unknown_format_exits_with_status_one() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let out = ironfeed(tmp.path(), &["ingest", "regions", "--format", "orc"])?;
    assert_eq!(out.status.code(), Some(1));
    Ok(())
}
