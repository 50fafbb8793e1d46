//! # ironfeed
//!
//! Chunked CSV ingestion and format-fallback persistence for small batch pipelines.
//!
//! Each raw extract (clicks, campaigns, regions) goes through the same stage:
//!
//! 1. [`check`] - fail fast when the input file is missing
//! 2. [`ingest::reader`] - stream the file in fixed-size typed batches, logging progress
//! 3. [`ingest::assemble`] - concatenate the batches and compute run statistics
//! 4. [`persist`] - write the table with the first available encoder
//!    (Parquet, then Arrow IPC, then gzip-compressed CSV)
//!
//! Memory is bounded by the batch size only while parsing; the assembled table is
//! held in full before it is written.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ironfeed::{DatasetKind, StageConfig, run_stage};
//! # fn main() -> anyhow::Result<()> {
//!
//! let mut cfg = StageConfig::for_dataset(DatasetKind::Regions, ".");
//! cfg.batch_size = 10_000;
//! let report = run_stage(&cfg)?;
//! println!("{} rows -> {}", report.stats.total_rows, report.output.path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom encoder chains
//!
//! ```no_run
//! use ironfeed::persist::{CsvGzEncoder, Persister};
//! use ironfeed::{DatasetKind, StageConfig, run_stage_with};
//! # fn main() -> anyhow::Result<()> {
//!
//! let persister = Persister::new(vec![Box::new(CsvGzEncoder::with_level(9))]);
//! let cfg = StageConfig::for_dataset(DatasetKind::Clicks, "/srv/pipeline");
//! run_stage_with(&cfg, &persister)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `format-parquet` - Parquet encoder (default)
//! - `format-ipc` - Arrow IPC encoder (default)
//! - `compression-zstd` - read `.zst` inputs (default); gzip is always available
//!
//! ## Module Overview
//!
//! - [`config`] - stage and pipeline configuration
//! - [`schema`] - fixed column typing
//! - [`io`] - decompression detection and typed CSV batches
//! - [`ingest`] - chunked reader, assembler, statistics
//! - [`persist`] - encoders and the fallback persister
//! - [`stage`] - one dataset end-to-end
//! - [`runner`] - ordered task chain with a background dashboard task
//! - [`logging`] - stdout + log file subscriber

pub mod check;
pub mod config;
pub mod error;
pub mod ingest;
pub mod io;
pub mod logging;
pub mod persist;
pub mod runner;
pub mod schema;
pub mod stage;
pub mod testing;

pub use check::ensure_input_exists;
pub use config::{CommandConfig, DashboardConfig, DatasetKind, PipelineConfig, StageConfig};
pub use error::{IngestError, classify};
pub use ingest::{AssembledDataset, ChunkedReader, ReadOutcome, RunStatistics, assemble};
pub use persist::{Encoder, PersistOutcome, Persister, read_back};
pub use runner::{RunReport, Runner, Task, TaskKind, pipeline_tasks};
pub use schema::{ColumnSpec, ColumnType, TableSchema};
pub use stage::{StageReport, run_stage, run_stage_with};
