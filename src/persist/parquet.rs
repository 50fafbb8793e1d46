//! Preferred columnar encoder: Parquet via `parquet::arrow`.

use super::Encoder;
use anyhow::Result;
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetEncoder;

impl Encoder for ParquetEncoder {
    fn name(&self) -> &str {
        "parquet"
    }

    fn extension(&self) -> &str {
        "parquet"
    }

    fn is_available(&self) -> bool {
        cfg!(feature = "format-parquet")
    }

    #[cfg(feature = "format-parquet")]
    fn write(&self, table: &RecordBatch, file: &mut File) -> Result<()> {
        use anyhow::Context;
        use parquet::arrow::arrow_writer::ArrowWriter;
        use parquet::basic::Compression;
        use parquet::file::properties::WriterProperties;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer =
            ArrowWriter::try_new(file, table.schema(), Some(props)).context("create ArrowWriter")?;
        writer.write(table).context("write batch to parquet")?;
        writer.close().context("close ArrowWriter")?;
        Ok(())
    }

    #[cfg(not(feature = "format-parquet"))]
    fn write(&self, _table: &RecordBatch, _file: &mut File) -> Result<()> {
        anyhow::bail!("parquet support is not compiled in (feature `format-parquet`)")
    }
}

/// Read every batch of a Parquet file.
///
/// # Errors
/// Returns an error if the file cannot be opened or decoded, or parquet support is off.
#[cfg(feature = "format-parquet")]
pub fn read_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    use anyhow::Context;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("open ParquetRecordBatchReader")?
        .with_batch_size(64 * 1024)
        .build()
        .context("build ParquetRecordBatchReader")?;
    reader
        .map(|b| b.context("read parquet batch"))
        .collect()
}

#[cfg(not(feature = "format-parquet"))]
pub fn read_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    anyhow::bail!(
        "cannot read {}: parquet support is not compiled in",
        path.display()
    )
}
