//! ironfeed: ingest raw CSV extracts and persist them for the rest of the pipeline.
//!
//! `ironfeed ingest regions` runs a single stage; `ironfeed run` runs every configured
//! stage in order and then launches the dashboard. Any fatal error exits with status 1.

use clap::{Args as ClapArgs, Parser, Subcommand};
use ironfeed::{DatasetKind, PipelineConfig, Runner, classify, logging, pipeline_tasks, run_stage};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "ironfeed")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file; flags below override its values.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Project root holding `data/` and `processed_data/`.
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Shared log file (default: `<project_root>/pipeline.log`).
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Log to stdout only.
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(flatten)]
    tuning: Tuning,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct Tuning {
    /// Rows per batch.
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Log progress every N batches (0 disables).
    #[arg(long, global = true)]
    log_every: Option<usize>,

    /// Rows of the assembled table to log.
    #[arg(long, global = true)]
    sample_size: Option<usize>,

    /// Output formats to try in order (parquet, arrow-ipc, csv.gz). Repeatable.
    #[arg(long = "format", global = true)]
    formats: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest one dataset.
    Ingest {
        #[arg(value_enum)]
        dataset: DatasetKind,

        /// Override the input path.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Override the output base path (no extension).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also write run statistics as JSON to this path.
        #[arg(long)]
        stats_json: Option<PathBuf>,
    },
    /// Ingest every configured dataset in order, then launch the dashboard.
    Run,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let cfg = match build_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ironfeed: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let log_file = (!cli.no_log_file).then(|| cfg.log_file_path());
    if let Err(e) = logging::init(log_file.as_deref(), &cfg.log_level) {
        eprintln!("ironfeed: {e:#}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Command::Ingest {
            dataset,
            input,
            output,
            stats_json,
        } => {
            let mut stage = cfg.stage(dataset);
            if let Some(input) = input {
                stage.input_path = input;
            }
            if let Some(output) = output {
                stage.output_base = output;
            }
            info!("ingesting {}", stage.input_path.display());
            match run_stage(&stage) {
                Ok(report) => {
                    if let Some(path) = stats_json
                        && let Err(e) = report.stats.save_to_file(&path)
                    {
                        error!("{e:#}");
                        return ExitCode::FAILURE;
                    }
                    info!("done: {}", report.output.path.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    let kind = classify(&e).map_or("internal", |ie| ie.kind());
                    error!(kind, "stage {} failed: {e:#}", stage.dataset);
                    error!("{e:?}");
                    ExitCode::FAILURE
                }
            }
        }
        Command::Run => {
            info!("{}", "=".repeat(50));
            info!("starting data pipeline");
            info!("{}", "=".repeat(50));
            let tasks = pipeline_tasks(&cfg);
            let report = Runner.run(&tasks);
            if report.is_success() {
                info!(
                    "pipeline finished: {} stage(s), {} background task(s)",
                    report.completed.len(),
                    report.launched.len()
                );
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn build_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut cfg = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = &cli.project_root {
        cfg.project_root = root.clone();
    }
    if let Some(level) = &cli.log_level {
        cfg.log_level = level.clone();
    }
    if let Some(file) = &cli.log_file {
        cfg.log_file = Some(file.clone());
    }
    if let Some(n) = cli.tuning.batch_size {
        cfg.batch_size = n;
    }
    if let Some(n) = cli.tuning.log_every {
        cfg.log_every = n;
    }
    if let Some(n) = cli.tuning.sample_size {
        cfg.sample_size = n;
    }
    if !cli.tuning.formats.is_empty() {
        cfg.formats = cli.tuning.formats.clone();
    }
    Ok(cfg)
}
