//! Explicit run configuration.
//!
//! Every stage receives a [`StageConfig`]; nothing is read from process-wide state.
//! A [`PipelineConfig`] describes a whole run (project root, shared tuning, which
//! datasets to ingest, the dashboard to launch) and derives one `StageConfig` per
//! dataset from the `<root>/data/<name>.csv` → `<root>/processed_data/<name>_processed`
//! convention. It can be loaded from a JSON file; every field has a default.

use crate::error::IngestError;
use crate::ingest::{DEFAULT_BATCH_SIZE, DEFAULT_LOG_EVERY, DEFAULT_SAMPLE_SIZE};
use crate::schema::{ColumnType, TableSchema};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DATA_DIR: &str = "data";
pub const OUTPUT_DIR: &str = "processed_data";
pub const LOG_FILE: &str = "pipeline.log";

/// The raw extracts the pipeline knows about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Clicks,
    Campaigns,
    Regions,
}

impl DatasetKind {
    /// Run order used when no explicit list is configured.
    pub const ALL: [Self; 3] = [Self::Clicks, Self::Campaigns, Self::Regions];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Clicks => "clicks",
            Self::Campaigns => "campaigns",
            Self::Regions => "regions",
        }
    }

    /// Declared schema of the extract.
    #[must_use]
    pub fn schema(self) -> TableSchema {
        let columns: &[(&str, ColumnType)] = match self {
            Self::Regions => &[("region_id", ColumnType::Int32), ("name", ColumnType::Utf8)],
            Self::Campaigns => &[
                ("campaign_id", ColumnType::Int32),
                ("name", ColumnType::Utf8),
                ("region_id", ColumnType::Int32),
                ("started_at", ColumnType::Utf8),
            ],
            Self::Clicks => &[
                ("click_id", ColumnType::Int64),
                ("campaign_id", ColumnType::Int32),
                ("region_id", ColumnType::Int32),
                ("user_id", ColumnType::Int64),
                ("clicked_at", ColumnType::Utf8),
            ],
        };
        TableSchema::builtin(columns)
    }

    /// Column whose distinct count is reported.
    #[must_use]
    pub const fn key_column(self) -> &'static str {
        match self {
            Self::Regions => "region_id",
            Self::Campaigns => "campaign_id",
            Self::Clicks => "user_id",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything one ingestion stage needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageConfig {
    /// Logical dataset name, used in logs.
    pub dataset: String,
    pub input_path: PathBuf,
    /// Output path without extension; the encoder appends its own.
    pub output_base: PathBuf,
    pub schema: TableSchema,
    pub key_column: String,
    pub batch_size: usize,
    /// Emit a progress line every this many batches (0 = never).
    pub log_every: usize,
    /// Rows of the assembled table logged for inspection.
    pub sample_size: usize,
    /// Output formats to try, in order.
    pub formats: Vec<String>,
}

impl StageConfig {
    /// Defaults for a built-in dataset under `project_root`.
    #[must_use]
    pub fn for_dataset(kind: DatasetKind, project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref();
        Self {
            dataset: kind.name().to_string(),
            input_path: root.join(DATA_DIR).join(format!("{}.csv", kind.name())),
            output_base: root
                .join(OUTPUT_DIR)
                .join(format!("{}_processed", kind.name())),
            schema: kind.schema(),
            key_column: kind.key_column().to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            log_every: DEFAULT_LOG_EVERY,
            sample_size: DEFAULT_SAMPLE_SIZE,
            formats: default_formats(),
        }
    }

    /// Check the settings a stage cannot run without.
    ///
    /// # Errors
    /// Returns [`IngestError::Config`] or [`IngestError::Schema`] describing the first problem.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.batch_size == 0 {
            return Err(IngestError::Config("batch_size must be at least 1".into()));
        }
        if self.formats.is_empty() {
            return Err(IngestError::Config("formats must not be empty".into()));
        }
        self.schema.validate()?;
        if self.schema.index_of(&self.key_column).is_none() {
            return Err(IngestError::MissingKeyColumn {
                column: self.key_column.clone(),
            });
        }
        Ok(())
    }
}

pub const DASHBOARD_URL: &str = "http://127.0.0.1:8050";

/// External program run after the ingestion stages, in the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// How to start the dashboard once every stage succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Page to open after launch; defaults to [`DASHBOARD_URL`].
    #[serde(default = "default_dashboard_url")]
    pub url: Option<String>,
    /// Program that opens `url`; defaults to the platform opener. `null` opens nothing.
    #[serde(default = "default_opener")]
    pub open_with: Option<String>,
}

impl DashboardConfig {
    /// Dashboard started with `program`, opening [`DASHBOARD_URL`] with the platform opener.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            url: default_dashboard_url(),
            open_with: default_opener(),
        }
    }
}

#[allow(clippy::unnecessary_wraps)]
fn default_dashboard_url() -> Option<String> {
    Some(DASHBOARD_URL.to_string())
}

#[allow(clippy::unnecessary_wraps)]
fn default_opener() -> Option<String> {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };
    Some(opener.to_string())
}

/// Whole-run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub project_root: PathBuf,
    /// Shared log file; defaults to `<project_root>/pipeline.log`.
    pub log_file: Option<PathBuf>,
    pub log_level: String,
    pub batch_size: usize,
    pub log_every: usize,
    pub sample_size: usize,
    pub formats: Vec<String>,
    pub datasets: Vec<DatasetKind>,
    /// Programs run in order after the ingestion stages; any failure halts the run.
    pub steps: Vec<CommandConfig>,
    pub dashboard: Option<DashboardConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            log_file: None,
            log_level: "info".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            log_every: DEFAULT_LOG_EVERY,
            sample_size: DEFAULT_SAMPLE_SIZE,
            formats: default_formats(),
            datasets: DatasetKind::ALL.to_vec(),
            steps: Vec::new(),
            dashboard: None,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON configuration file. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON for this shape.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Self =
            serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    #[must_use]
    pub fn log_file_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.project_root.join(LOG_FILE))
    }

    /// Stage configuration for `kind`, with this run's shared tuning applied.
    #[must_use]
    pub fn stage(&self, kind: DatasetKind) -> StageConfig {
        StageConfig {
            batch_size: self.batch_size,
            log_every: self.log_every,
            sample_size: self.sample_size,
            formats: self.formats.clone(),
            ..StageConfig::for_dataset(kind, &self.project_root)
        }
    }
}

fn default_formats() -> Vec<String> {
    ["parquet", "arrow-ipc", "csv.gz"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}
