//! Typed CSV batches on top of the `csv` crate.
//!
//! This module provides:
//! - **Batch reading**: [`CsvBatchReader`] turns a delimited stream into Arrow
//!   [`RecordBatch`]es of at most `batch_size` rows, coercing every field to the
//!   column type declared in a [`TableSchema`].
//! - **Batch writing**: [`write_batch_csv`] serializes a `RecordBatch` back to
//!   delimited text with a header row.
//!
//! # Design notes
//! - Columns are matched to the header **by name**; declared columns may appear in any
//!   order and undeclared header columns are ignored.
//! - Only one batch worth of builders is alive at a time.
//! - Type errors carry the 1-based data row, the source line, the column and the raw value.

use crate::error::IngestError;
use crate::io::compression::auto_detect_reader;
use crate::schema::{ColumnSpec, ColumnType, TableSchema};
use anyhow::{Context, Result};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanBuilder, Float64Builder, Int32Builder, Int64Builder,
    StringBuilder,
};
use arrow::datatypes::{DataType, Float64Type, Int32Type, Int64Type, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

/// Upper bound on rows preallocated per column; builders grow past it on demand.
const MAX_INITIAL_CAPACITY: usize = 8192;

/// Streaming reader producing typed batches.
pub struct CsvBatchReader {
    rdr: csv::Reader<Box<dyn Read>>,
    schema: TableSchema,
    arrow_schema: SchemaRef,
    /// Header position of each declared column, in declaration order.
    positions: Vec<usize>,
    batch_size: usize,
    rows_read: u64,
    record: csv::StringRecord,
    done: bool,
}

impl CsvBatchReader {
    /// Open `path`, decompressing it if needed, and validate its header against `schema`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, the header cannot be read,
    /// a declared column is missing from the header, or `batch_size` is zero.
    pub fn open(path: impl AsRef<Path>, schema: &TableSchema, batch_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let rdr = auto_detect_reader(f, path)
            .with_context(|| format!("setup decompression for {}", path.display()))?;
        Self::from_reader(rdr, schema, batch_size)
            .with_context(|| format!("read header of {}", path.display()))
    }

    /// Build a reader over any byte stream. The first record is the header.
    ///
    /// # Errors
    /// See [`CsvBatchReader::open`].
    pub fn from_reader(
        reader: Box<dyn Read>,
        schema: &TableSchema,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(IngestError::Config("batch size must be at least 1".into()).into());
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);
        let header = rdr.headers().context("read CSV header")?.clone();

        // A zero-byte input has no header at all; treat it as zero rows.
        let done = header.is_empty();
        let positions = if done {
            Vec::new()
        } else {
            header_positions(&header, schema)?
        };

        Ok(Self {
            rdr,
            schema: schema.clone(),
            arrow_schema: schema.to_arrow(),
            positions,
            batch_size,
            rows_read: 0,
            record: csv::StringRecord::new(),
            done,
        })
    }

    /// Arrow schema carried by every produced batch.
    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.arrow_schema)
    }

    /// Data rows consumed so far (header excluded).
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Read up to `batch_size` rows. Returns `Ok(None)` once input is exhausted.
    ///
    /// # Errors
    /// Returns [`IngestError::Parse`] for a field that does not fit its column type,
    /// or a `csv` error (I/O, unequal field count) annotated with the record number.
    pub fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        if self.done {
            return Ok(None);
        }

        let mut builders: Vec<ColumnBuilder> = self
            .schema
            .columns()
            .iter()
            .map(|c| ColumnBuilder::new(c.ty, self.batch_size.min(MAX_INITIAL_CAPACITY)))
            .collect();

        let mut rows = 0usize;
        while rows < self.batch_size {
            let more = self
                .rdr
                .read_record(&mut self.record)
                .with_context(|| format!("read CSV record #{}", self.rows_read + 1))?;
            if !more {
                self.done = true;
                break;
            }
            self.rows_read += 1;
            let line = self.record.position().map_or(0, csv::Position::line);

            for ((spec, &pos), builder) in self
                .schema
                .columns()
                .iter()
                .zip(&self.positions)
                .zip(builders.iter_mut())
            {
                let raw = self.record.get(pos).unwrap_or_default();
                builder.append(raw, spec).map_err(|expected| IngestError::Parse {
                    row: self.rows_read,
                    line,
                    column: spec.name.clone(),
                    value: raw.to_string(),
                    expected,
                })?;
            }
            rows += 1;
        }

        if rows == 0 {
            return Ok(None);
        }

        let columns: Vec<ArrayRef> = builders.iter_mut().map(ColumnBuilder::finish).collect();
        let batch = RecordBatch::try_new(self.schema(), columns).context("assemble RecordBatch")?;
        Ok(Some(batch))
    }
}

impl Iterator for CsvBatchReader {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn header_positions(header: &csv::StringRecord, schema: &TableSchema) -> Result<Vec<usize>> {
    let mut positions = Vec::with_capacity(schema.len());
    for col in schema.columns() {
        let pos = header
            .iter()
            .position(|h| h.trim() == col.name)
            .ok_or_else(|| {
                IngestError::Schema(format!(
                    "declared column `{}` is missing from header [{}]",
                    col.name,
                    header.iter().collect::<Vec<_>>().join(", ")
                ))
            })?;
        positions.push(pos);
    }
    Ok(positions)
}

/// Per-column Arrow builder for one batch.
enum ColumnBuilder {
    Int32(Int32Builder),
    Int64(Int64Builder),
    Float64(Float64Builder),
    Bool(BooleanBuilder),
    Utf8(StringBuilder),
}

impl ColumnBuilder {
    fn new(ty: ColumnType, capacity: usize) -> Self {
        match ty {
            ColumnType::Int32 => Self::Int32(Int32Builder::with_capacity(capacity)),
            ColumnType::Int64 => Self::Int64(Int64Builder::with_capacity(capacity)),
            ColumnType::Float64 => Self::Float64(Float64Builder::with_capacity(capacity)),
            ColumnType::Bool => Self::Bool(BooleanBuilder::with_capacity(capacity)),
            ColumnType::Utf8 => Self::Utf8(StringBuilder::with_capacity(
                capacity,
                capacity.saturating_mul(16),
            )),
        }
    }

    /// Coerce `raw` and append it. On failure returns the expected type name.
    fn append(&mut self, raw: &str, spec: &ColumnSpec) -> Result<(), &'static str> {
        let expected = spec.ty.as_str();
        if raw.is_empty() && spec.nullable {
            self.append_null();
            return Ok(());
        }
        match self {
            Self::Utf8(b) => b.append_value(raw),
            Self::Int32(b) => b.append_value(raw.trim().parse().map_err(|_| expected)?),
            Self::Int64(b) => b.append_value(raw.trim().parse().map_err(|_| expected)?),
            Self::Float64(b) => b.append_value(raw.trim().parse().map_err(|_| expected)?),
            Self::Bool(b) => b.append_value(parse_bool(raw.trim()).ok_or(expected)?),
        }
        Ok(())
    }

    fn append_null(&mut self) {
        match self {
            Self::Int32(b) => b.append_null(),
            Self::Int64(b) => b.append_null(),
            Self::Float64(b) => b.append_null(),
            Self::Bool(b) => b.append_null(),
            Self::Utf8(b) => b.append_null(),
        }
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            Self::Int32(b) => Arc::new(b.finish()),
            Self::Int64(b) => Arc::new(b.finish()),
            Self::Float64(b) => Arc::new(b.finish()),
            Self::Bool(b) => Arc::new(b.finish()),
            Self::Utf8(b) => Arc::new(b.finish()),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "t" | "yes" => Some(true),
        "false" | "0" | "f" | "no" => Some(false),
        _ => None,
    }
}

/// Write `batch` as delimited text with a header row. Nulls become empty fields.
///
/// # Returns
/// The number of data rows written.
///
/// # Errors
/// Returns an error on an unsupported column type or any write failure.
pub fn write_batch_csv<W: Write>(batch: &RecordBatch, writer: W) -> Result<usize> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    let schema = batch.schema();
    wtr.write_record(schema.fields().iter().map(|f| f.name()))
        .context("write CSV header")?;

    for row in 0..batch.num_rows() {
        for col in batch.columns() {
            if col.is_null(row) {
                wtr.write_field("")?;
                continue;
            }
            match col.data_type() {
                DataType::Int32 => {
                    wtr.write_field(col.as_primitive::<Int32Type>().value(row).to_string())?;
                }
                DataType::Int64 => {
                    wtr.write_field(col.as_primitive::<Int64Type>().value(row).to_string())?;
                }
                DataType::Float64 => {
                    wtr.write_field(col.as_primitive::<Float64Type>().value(row).to_string())?;
                }
                DataType::Boolean => {
                    wtr.write_field(if col.as_boolean().value(row) { "true" } else { "false" })?;
                }
                DataType::Utf8 => wtr.write_field(col.as_string::<i32>().value(row))?,
                other => anyhow::bail!("unsupported column type {other} for CSV output"),
            }
        }
        wtr.write_record(None::<&[u8]>)
            .with_context(|| format!("write CSV row #{}", row + 1))?;
    }
    wtr.flush().context("flush CSV writer")?;
    Ok(batch.num_rows())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn regions() -> TableSchema {
        TableSchema::of(&[("region_id", ColumnType::Int32), ("name", ColumnType::Utf8)]).unwrap()
    }

    fn reader(text: &str, schema: &TableSchema, batch_size: usize) -> Result<CsvBatchReader> {
        CsvBatchReader::from_reader(Box::new(Cursor::new(text.as_bytes().to_vec())), schema, batch_size)
    }

    #[test]
    fn splits_rows_into_bounded_batches() -> Result<()> {
        let mut rdr = reader("region_id,name\n1,a\n2,b\n3,c\n", &regions(), 2)?;
        let sizes: Vec<usize> = rdr.by_ref().map(|b| b.map(|b| b.num_rows())).collect::<Result<_>>()?;
        assert_eq!(sizes, vec![2, 1]);
        assert_eq!(rdr.rows_read(), 3);
        Ok(())
    }

    #[test]
    fn header_order_may_differ_from_schema() -> Result<()> {
        let mut rdr = reader("name,extra,region_id\nNorth,x,7\n", &regions(), 10)?;
        let batch = rdr.next_batch()?.unwrap();
        assert_eq!(batch.column(0).as_primitive::<Int32Type>().value(0), 7);
        assert_eq!(batch.column(1).as_string::<i32>().value(0), "North");
        assert_eq!(batch.num_columns(), 2);
        Ok(())
    }

    #[test]
    fn missing_declared_column_is_schema_error() {
        let err = reader("id,name\n1,a\n", &regions(), 10).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<IngestError>(),
            Some(IngestError::Schema(_))
        ));
    }

    #[test]
    fn type_error_reports_row_and_value() {
        let mut rdr = reader("region_id,name\n1,a\nzz,b\n", &regions(), 10).unwrap();
        let err = rdr.next_batch().unwrap_err();
        match err.downcast_ref::<IngestError>() {
            Some(IngestError::Parse { row, line, column, value, expected }) => {
                assert_eq!(*row, 2);
                assert_eq!(*line, 3);
                assert_eq!(column, "region_id");
                assert_eq!(value, "zz");
                assert_eq!(*expected, "int32");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_fields_follow_nullability() -> Result<()> {
        let schema = TableSchema::new(vec![
            ColumnSpec::new("id", ColumnType::Int64),
            ColumnSpec::new("score", ColumnType::Float64).nullable(),
            ColumnSpec::new("label", ColumnType::Utf8),
        ])?;
        let mut rdr = reader("id,score,label\n1,,\n", &schema, 4)?;
        let batch = rdr.next_batch()?.unwrap();
        assert!(batch.column(1).is_null(0));
        assert_eq!(batch.column(2).as_string::<i32>().value(0), "");

        let mut strict = reader("id,score,label\n,1.5,x\n", &schema, 4)?;
        assert!(strict.next_batch().is_err());
        Ok(())
    }

    #[test]
    fn zero_byte_and_header_only_inputs_yield_nothing() -> Result<()> {
        assert!(reader("", &regions(), 5)?.next_batch()?.is_none());
        assert!(reader("region_id,name\n", &regions(), 5)?.next_batch()?.is_none());
        Ok(())
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(reader("region_id,name\n", &regions(), 0).is_err());
    }

    #[test]
    fn write_batch_csv_quotes_and_blanks_nulls() -> Result<()> {
        let schema = TableSchema::new(vec![
            ColumnSpec::new("id", ColumnType::Int32),
            ColumnSpec::new("ok", ColumnType::Bool).nullable(),
            ColumnSpec::new("name", ColumnType::Utf8),
        ])?;
        let batch = reader("id,ok,name\n1,true,\"a,b\"\n2,,plain\n", &schema, 8)?
            .next_batch()?
            .unwrap();
        let mut out = Vec::new();
        let n = write_batch_csv(&batch, &mut out)?;
        assert_eq!(n, 2);
        assert_eq!(String::from_utf8(out)?, "id,ok,name\n1,true,\"a,b\"\n2,,plain\n");
        Ok(())
    }
}
