//! One dataset's ingestion stage: check → read → assemble → persist.

use crate::check::ensure_input_exists;
use crate::config::StageConfig;
use crate::ingest::{ChunkedReader, RunStatistics, assemble};
use crate::persist::{PersistOutcome, Persister};
use anyhow::{Context, Result};
use tracing::{info, info_span};

/// Result of a successful stage.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub dataset: String,
    pub stats: RunStatistics,
    pub output: PersistOutcome,
}

/// Run the stage with the encoder chain named in `config.formats`.
///
/// # Errors
/// Any failure is fatal for the stage; see [`run_stage_with`]. An unknown format
/// name is reported after the other configuration checks.
pub fn run_stage(config: &StageConfig) -> Result<StageReport> {
    let span = info_span!("stage", dataset = %config.dataset);
    let _enter = span.enter();

    config.validate()?;
    let persister = Persister::from_formats(config.formats.as_slice())?;
    execute(config, &persister)
}

/// Run the stage with an explicit persister.
///
/// Nothing is written unless reading and assembly both succeed.
///
/// # Errors
/// Returns an error (rooted in [`crate::IngestError`]) if the configuration is invalid,
/// the input is missing, any row fails to parse, the dataset is empty, or persistence fails.
pub fn run_stage_with(config: &StageConfig, persister: &Persister) -> Result<StageReport> {
    let span = info_span!("stage", dataset = %config.dataset);
    let _enter = span.enter();

    config.validate()?;
    execute(config, persister)
}

fn execute(config: &StageConfig, persister: &Persister) -> Result<StageReport> {
    info!(input = %config.input_path.display(), "starting stage");
    ensure_input_exists(&config.input_path)?;

    let reader = ChunkedReader::new(config.schema.clone(), config.batch_size)
        .with_log_every(config.log_every);
    let outcome = reader
        .read(&config.input_path)
        .with_context(|| format!("ingest {}", config.input_path.display()))?;
    info!(
        rows = outcome.total_rows,
        batches = outcome.batches.len(),
        "read finished in {:.1} s",
        outcome.elapsed.as_secs_f64()
    );

    let dataset = assemble(&config.schema, outcome, &config.key_column, config.sample_size)
        .with_context(|| format!("assemble {}", config.dataset))?;

    info!("saving results");
    let output = persister
        .persist(&dataset.table, &config.output_base)
        .with_context(|| format!("persist {}", config.dataset))?;
    info!(path = %output.path.display(), "stage finished");

    Ok(StageReport {
        dataset: config.dataset.clone(),
        stats: dataset.stats,
        output,
    })
}
