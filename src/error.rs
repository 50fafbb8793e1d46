//! Error taxonomy for ingestion stages.
//!
//! Library functions return [`anyhow::Result`] and annotate failures with
//! `.context(..)`. The root cause of every fatal condition is an [`IngestError`],
//! so callers (tests, the CLI) can classify a failure with
//! `err.downcast_ref::<IngestError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Input file is absent (or is not a regular file).
    #[error("input file not found: {}", path.display())]
    MissingInput { path: PathBuf },

    /// The file's header does not carry a declared column, or the schema itself is invalid.
    #[error("schema error: {0}")]
    Schema(String),

    /// A field could not be coerced to its declared column type.
    #[error(
        "row {row} (line {line}): column `{column}` expected {expected}, got {value:?}"
    )]
    Parse {
        row: u64,
        line: u64,
        column: String,
        value: String,
        expected: &'static str,
    },

    /// No batches were read, so there is no table to summarize or persist.
    #[error("dataset is empty: no data rows were read")]
    EmptyDataset,

    #[error("key column `{column}` is not part of the schema")]
    MissingKeyColumn { column: String },

    /// Every registered encoder reported itself unavailable.
    #[error("no output encoder is available")]
    NoEncoder,

    #[error("failed to write {format} output to {}", path.display())]
    Persist {
        format: String,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IngestError {
    /// Short machine-friendly label, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingInput { .. } => "missing_input",
            Self::Schema(_) => "schema",
            Self::Parse { .. } => "parse",
            Self::EmptyDataset => "empty_dataset",
            Self::MissingKeyColumn { .. } => "missing_key_column",
            Self::NoEncoder => "no_encoder",
            Self::Persist { .. } => "persist",
            Self::Config(_) => "config",
        }
    }
}

/// Find the [`IngestError`] at the root of an `anyhow` chain, if there is one.
#[must_use]
pub fn classify(err: &anyhow::Error) -> Option<&IngestError> {
    err.chain().find_map(|e| e.downcast_ref::<IngestError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn classify_finds_root_cause_under_context() {
        let err = Err::<(), _>(IngestError::EmptyDataset)
            .context("assemble regions")
            .context("stage regions")
            .unwrap_err();
        let kind = classify(&err).map(IngestError::kind);
        assert_eq!(kind, Some("empty_dataset"));
    }

    #[test]
    fn parse_error_message_names_row_and_column() {
        let e = IngestError::Parse {
            row: 3,
            line: 4,
            column: "region_id".into(),
            value: "abc".into(),
            expected: "int32",
        };
        let msg = e.to_string();
        assert!(msg.contains("row 3"));
        assert!(msg.contains("region_id"));
        assert!(msg.contains("\"abc\""));
    }
}
