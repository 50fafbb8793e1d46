//! Chunked reading of one input file.
//!
//! [`ChunkedReader`] pulls fixed-size typed batches out of a [`CsvBatchReader`],
//! appends each one to the run's accumulation and keeps the running row total.
//! Every `log_every`-th batch it logs cumulative rows and elapsed time.

use crate::io::csv::CsvBatchReader;
use crate::schema::TableSchema;
use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const DEFAULT_BATCH_SIZE: usize = 50_000;
pub const DEFAULT_LOG_EVERY: usize = 5;

/// Everything read from one file, in read order.
#[derive(Debug)]
pub struct ReadOutcome {
    pub batches: Vec<RecordBatch>,
    pub total_rows: u64,
    /// When reading started; the assembler reports total elapsed time from here.
    pub started: Instant,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct ChunkedReader {
    schema: TableSchema,
    batch_size: usize,
    log_every: usize,
}

impl ChunkedReader {
    #[must_use]
    pub fn new(schema: TableSchema, batch_size: usize) -> Self {
        Self {
            schema,
            batch_size,
            log_every: DEFAULT_LOG_EVERY,
        }
    }

    /// Progress cadence in batches. Zero disables progress lines.
    #[must_use]
    pub fn with_log_every(mut self, log_every: usize) -> Self {
        self.log_every = log_every;
        self
    }

    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Read the whole file into memory as a list of batches.
    ///
    /// Any malformed row or I/O failure aborts the read; no partial batches are returned.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, its header does not carry the
    /// declared columns, or any row fails to parse.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<ReadOutcome> {
        let path = path.as_ref();
        let started = Instant::now();
        info!(path = %path.display(), batch_size = self.batch_size, "start reading");

        let mut source = CsvBatchReader::open(path, &self.schema, self.batch_size)?;
        let mut batches = Vec::new();
        let mut total_rows: u64 = 0;

        while let Some(batch) = source
            .next_batch()
            .with_context(|| format!("read batch #{} of {}", batches.len() + 1, path.display()))?
        {
            total_rows += batch.num_rows() as u64;
            batches.push(batch);

            let n = batches.len();
            debug!(batch = n, rows = total_rows, "batch read");
            if self.log_every > 0 && n % self.log_every == 0 {
                info!(
                    "[batch {n}] processed {total_rows} rows, elapsed {:.1} s",
                    started.elapsed().as_secs_f64()
                );
            }
        }

        Ok(ReadOutcome {
            batches,
            total_rows,
            started,
            elapsed: started.elapsed(),
        })
    }
}
