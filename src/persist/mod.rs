//! Format-fallback persistence of an assembled table.
//!
//! A [`Persister`] holds an ordered list of [`Encoder`]s. On [`Persister::persist`] it
//! walks the list, skips every encoder whose [`Encoder::is_available`] is `false`, and
//! writes the table with the first available one. Exactly one file is produced:
//! `<base>.<ext>`, where `<ext>` belongs to the encoder that ran.
//!
//! ## Built-in encoders
//!
//! | name        | extension  | availability                 |
//! |-------------|------------|------------------------------|
//! | `parquet`   | `parquet`  | feature `format-parquet`     |
//! | `arrow-ipc` | `arrow`    | feature `format-ipc`         |
//! | `csv.gz`    | `csv.gz`   | always                       |
//!
//! ## Atomicity
//! Output is written to a temporary file in the destination directory and renamed
//! into place once the encoder and `fsync` succeed. A failed write removes the
//! temporary file, so no partial `<base>.<ext>` is ever observed.

pub mod csv_gz;
pub mod ipc;
pub mod parquet;

use crate::error::IngestError;
use crate::io::csv::CsvBatchReader;
use crate::schema::TableSchema;
use anyhow::{Context, Result};
use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use std::ffi::OsString;
use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use self::csv_gz::CsvGzEncoder;
pub use self::ipc::IpcEncoder;
pub use self::parquet::ParquetEncoder;

/// One output format.
pub trait Encoder: Send + Sync {
    /// Name used in configuration and logs (e.g. `parquet`).
    fn name(&self) -> &str;

    /// File extension without the leading dot (e.g. `csv.gz`).
    fn extension(&self) -> &str;

    /// Whether this encoder can run in the current build/environment.
    fn is_available(&self) -> bool;

    /// Serialize `table` into `file`. The file is freshly created and empty.
    ///
    /// # Errors
    /// Returns an error on any encoding or I/O failure.
    fn write(&self, table: &RecordBatch, file: &mut File) -> Result<()>;
}

/// Where and how a table was persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOutcome {
    pub path: PathBuf,
    pub format: String,
    pub rows: usize,
    pub bytes: u64,
}

pub struct Persister {
    encoders: Vec<Box<dyn Encoder>>,
}

impl Default for Persister {
    fn default() -> Self {
        Self::default_chain()
    }
}

impl Persister {
    #[must_use]
    pub fn new(encoders: Vec<Box<dyn Encoder>>) -> Self {
        Self { encoders }
    }

    /// Parquet, then Arrow IPC, then gzip-compressed CSV.
    #[must_use]
    pub fn default_chain() -> Self {
        Self::new(vec![
            Box::new(ParquetEncoder),
            Box::new(IpcEncoder),
            Box::new(CsvGzEncoder::default()),
        ])
    }

    /// Build a chain from configured format names, in the given order.
    ///
    /// # Errors
    /// Returns [`IngestError::Config`] for an unknown name or an empty list.
    pub fn from_formats<S: AsRef<str>>(formats: &[S]) -> Result<Self, IngestError> {
        if formats.is_empty() {
            return Err(IngestError::Config("at least one output format is required".into()));
        }
        let encoders = formats
            .iter()
            .map(|f| encoder_by_name(f.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(encoders))
    }

    /// Names of the registered encoders, in try order.
    #[must_use]
    pub fn formats(&self) -> Vec<&str> {
        self.encoders.iter().map(|e| e.name()).collect()
    }

    /// Write `table` to `<base>.<ext>` with the first available encoder.
    ///
    /// Creates the parent directory of `base` if needed.
    ///
    /// # Errors
    /// - [`IngestError::NoEncoder`] if every encoder is unavailable.
    /// - [`IngestError::Persist`] if the selected encoder fails; nothing is left behind.
    pub fn persist(&self, table: &RecordBatch, base: impl AsRef<Path>) -> Result<PersistOutcome> {
        let base = base.as_ref();
        let dir = match base.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        create_dir_all(&dir).with_context(|| format!("mkdir -p {}", dir.display()))?;

        for encoder in &self.encoders {
            if !encoder.is_available() {
                debug!(format = encoder.name(), "encoder not available, trying next");
                continue;
            }
            let path = with_extension(base, encoder.extension());
            let bytes = write_atomically(encoder.as_ref(), table, &dir, &path).map_err(|e| {
                IngestError::Persist {
                    format: encoder.name().to_string(),
                    path: path.clone(),
                    source: e.into(),
                }
            })?;
            info!(
                path = %path.display(),
                format = encoder.name(),
                rows = table.num_rows(),
                bytes,
                "data saved"
            );
            return Ok(PersistOutcome {
                path,
                format: encoder.name().to_string(),
                rows: table.num_rows(),
                bytes,
            });
        }
        Err(IngestError::NoEncoder.into())
    }
}

fn encoder_by_name(name: &str) -> Result<Box<dyn Encoder>, IngestError> {
    match name {
        "parquet" => Ok(Box::new(ParquetEncoder)),
        "arrow-ipc" | "ipc" | "arrow" => Ok(Box::new(IpcEncoder)),
        "csv.gz" | "csv-gz" => Ok(Box::new(CsvGzEncoder::default())),
        other => Err(IngestError::Config(format!("unknown output format `{other}`"))),
    }
}

/// `base` + `.` + `ext`, without treating dots already in `base` as an extension.
fn with_extension(base: &Path, ext: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn write_atomically(
    encoder: &dyn Encoder,
    table: &RecordBatch,
    dir: &Path,
    target: &Path,
) -> Result<u64> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".ironfeed-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .with_context(|| format!("create temporary file in {}", dir.display()))?;
    encoder.write(table, tmp.as_file_mut())?;
    tmp.as_file().sync_all().context("sync output file")?;
    let file = tmp
        .persist(target)
        .with_context(|| format!("rename into {}", target.display()))?;
    Ok(file.metadata().context("stat output file")?.len())
}

/// Read a file written by any built-in encoder back into one table.
///
/// The format is chosen by extension. CSV files are re-typed with `schema`.
///
/// # Errors
/// Returns an error if the extension is unknown, the format is not compiled in,
/// or the file cannot be decoded.
pub fn read_back(path: impl AsRef<Path>, schema: &TableSchema) -> Result<RecordBatch> {
    let path = path.as_ref();
    let name = path.to_string_lossy().to_lowercase();
    let batches = if name.ends_with(".parquet") {
        self::parquet::read_batches(path)?
    } else if name.ends_with(".arrow") {
        self::ipc::read_batches(path)?
    } else if name.ends_with(".csv.gz") || name.ends_with(".csv") {
        CsvBatchReader::open(path, schema, 64 * 1024)?.collect::<Result<Vec<_>>>()?
    } else {
        anyhow::bail!("unrecognized output file {}", path.display());
    };
    let arrow_schema = batches
        .first()
        .map_or_else(|| schema.to_arrow(), RecordBatch::schema);
    concat_batches(&arrow_schema, &batches).with_context(|| format!("concatenate {}", path.display()))
}
