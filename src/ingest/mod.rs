//! Chunked ingestion: read typed batches, then assemble them into one table.

pub mod assemble;
pub mod reader;
pub mod stats;

pub use assemble::{AssembledDataset, DEFAULT_SAMPLE_SIZE, assemble, distinct_count};
pub use reader::{ChunkedReader, DEFAULT_BATCH_SIZE, DEFAULT_LOG_EVERY, ReadOutcome};
pub use stats::RunStatistics;
