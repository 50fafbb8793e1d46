//! Concatenation of read batches into one table, plus run statistics.

use crate::error::IngestError;
use crate::ingest::reader::ReadOutcome;
use crate::ingest::stats::RunStatistics;
use crate::schema::TableSchema;
use anyhow::{Context, Result};
use arrow::array::{Array, AsArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Float64Type, Int32Type, Int64Type};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use std::collections::HashSet;
use std::hash::Hash;
use tracing::info;

pub const DEFAULT_SAMPLE_SIZE: usize = 50;

/// The finalized, immutable table and its statistics.
#[derive(Debug, Clone)]
pub struct AssembledDataset {
    pub table: RecordBatch,
    pub stats: RunStatistics,
}

/// Concatenate `outcome.batches` in read order and compute statistics over the result.
///
/// Logs a summary and the first `sample_size` rows of the table.
///
/// # Errors
/// - [`IngestError::EmptyDataset`] if no batches were read.
/// - [`IngestError::MissingKeyColumn`] if `key_column` is not declared in `schema`.
pub fn assemble(
    schema: &TableSchema,
    outcome: ReadOutcome,
    key_column: &str,
    sample_size: usize,
) -> Result<AssembledDataset> {
    let key_idx = schema
        .index_of(key_column)
        .ok_or_else(|| IngestError::MissingKeyColumn {
            column: key_column.to_string(),
        })?;
    if outcome.batches.is_empty() {
        return Err(IngestError::EmptyDataset.into());
    }

    let table = concat_batches(&schema.to_arrow(), &outcome.batches)
        .context("concatenate batches")?;
    let distinct_key_count = distinct_count(table.column(key_idx).as_ref())
        .with_context(|| format!("count distinct `{key_column}`"))?;

    let stats = RunStatistics {
        total_rows: outcome.total_rows,
        retained_rows: table.num_rows() as u64,
        distinct_key_count,
        batches: outcome.batches.len(),
        elapsed_seconds: outcome.started.elapsed().as_secs_f64(),
    };
    stats.log_summary(key_column);
    log_sample(&table, sample_size);

    Ok(AssembledDataset { table, stats })
}

fn log_sample(table: &RecordBatch, sample_size: usize) {
    if sample_size == 0 {
        return;
    }
    let head = table.slice(0, sample_size.min(table.num_rows()));
    match pretty_format_batches(&[head]) {
        Ok(rendered) => info!("first {} rows:\n{rendered}", sample_size.min(table.num_rows())),
        Err(e) => info!("could not render sample rows: {e}"),
    }
}

/// Number of distinct non-null values in `array`.
///
/// Floats are compared by bit pattern, so `NaN` values with identical bits count once.
///
/// # Errors
/// Returns an error for array types no declared column type produces.
pub fn distinct_count(array: &dyn Array) -> Result<u64> {
    let n = match array.data_type() {
        DataType::Int32 => count_unique(array.as_primitive::<Int32Type>().iter()),
        DataType::Int64 => count_unique(array.as_primitive::<Int64Type>().iter()),
        DataType::Float64 => count_unique(
            array
                .as_primitive::<Float64Type>()
                .iter()
                .map(|v| v.map(f64::to_bits)),
        ),
        DataType::Boolean => count_unique(array.as_boolean().iter()),
        DataType::Utf8 => count_unique(array.as_string::<i32>().iter()),
        other => anyhow::bail!("distinct count is not supported for {other}"),
    };
    Ok(n as u64)
}

fn count_unique<T: Eq + Hash>(values: impl Iterator<Item = Option<T>>) -> usize {
    values.flatten().collect::<HashSet<T>>().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;
    use arrow::array::{ArrayRef, Int32Array, StringArray};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn schema() -> TableSchema {
        TableSchema::of(&[("region_id", ColumnType::Int32), ("name", ColumnType::Utf8)]).unwrap()
    }

    fn batch(ids: &[i32]) -> RecordBatch {
        let names: Vec<String> = ids.iter().map(|i| format!("n{i}")).collect();
        RecordBatch::try_new(
            schema().to_arrow(),
            vec![
                Arc::new(Int32Array::from(ids.to_vec())) as ArrayRef,
                Arc::new(StringArray::from(names)) as ArrayRef,
            ],
        )
        .unwrap()
    }

    fn outcome(batches: Vec<RecordBatch>) -> ReadOutcome {
        let total_rows = batches.iter().map(|b| b.num_rows() as u64).sum();
        ReadOutcome {
            batches,
            total_rows,
            started: Instant::now(),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn concatenation_preserves_read_order() -> Result<()> {
        let parts = vec![batch(&[5, 1]), batch(&[9]), batch(&[1, 2, 3])];
        let ds = assemble(&schema(), outcome(parts), "region_id", 3)?;
        let ids = ds.table.column(0).as_primitive::<Int32Type>().values().to_vec();
        assert_eq!(ids, vec![5, 1, 9, 1, 2, 3]);
        assert_eq!(ds.stats.total_rows, 6);
        assert_eq!(ds.stats.retained_rows, 6);
        assert_eq!(ds.stats.distinct_key_count, 5);
        assert_eq!(ds.stats.batches, 3);
        Ok(())
    }

    #[test]
    fn empty_batch_list_is_an_explicit_error() {
        let err = assemble(&schema(), outcome(vec![]), "region_id", 50).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IngestError>(),
            Some(IngestError::EmptyDataset)
        ));
    }

    #[test]
    fn unknown_key_column_is_reported() {
        let err = assemble(&schema(), outcome(vec![batch(&[1])]), "id", 50).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IngestError>(),
            Some(IngestError::MissingKeyColumn { .. })
        ));
    }

    #[test]
    fn distinct_count_skips_nulls() -> Result<()> {
        let col = StringArray::from(vec![Some("a"), None, Some("a"), Some("b"), None]);
        assert_eq!(distinct_count(&col)?, 2);
        let ints = Int32Array::from(vec![Some(3), Some(3), None]);
        assert_eq!(distinct_count(&ints)?, 1);
        Ok(())
    }
}
