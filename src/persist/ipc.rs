//! Alternate columnar encoder: the Arrow IPC file format (Feather v2).

use super::Encoder;
use anyhow::Result;
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct IpcEncoder;

impl Encoder for IpcEncoder {
    fn name(&self) -> &str {
        "arrow-ipc"
    }

    fn extension(&self) -> &str {
        "arrow"
    }

    fn is_available(&self) -> bool {
        cfg!(feature = "format-ipc")
    }

    #[cfg(feature = "format-ipc")]
    fn write(&self, table: &RecordBatch, file: &mut File) -> Result<()> {
        use anyhow::Context;
        use arrow::ipc::writer::FileWriter;

        let mut writer =
            FileWriter::try_new(file, table.schema().as_ref()).context("create IPC FileWriter")?;
        writer.write(table).context("write batch to IPC file")?;
        writer.finish().context("finish IPC file")?;
        Ok(())
    }

    #[cfg(not(feature = "format-ipc"))]
    fn write(&self, _table: &RecordBatch, _file: &mut File) -> Result<()> {
        anyhow::bail!("Arrow IPC support is not compiled in (feature `format-ipc`)")
    }
}

/// Read every batch of an Arrow IPC file.
///
/// # Errors
/// Returns an error if the file cannot be opened or decoded, or IPC support is off.
#[cfg(feature = "format-ipc")]
pub fn read_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    use anyhow::Context;
    use arrow::ipc::reader::FileReader;

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = FileReader::try_new(file, None).context("open IPC FileReader")?;
    reader.map(|b| b.context("read IPC batch")).collect()
}

#[cfg(not(feature = "format-ipc"))]
pub fn read_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    anyhow::bail!(
        "cannot read {}: Arrow IPC support is not compiled in",
        path.display()
    )
}
