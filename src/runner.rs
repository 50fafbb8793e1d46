//! Linear task runner for a whole pipeline run.
//!
//! A run is an ordered list of [`Task`]s. Blocking tasks execute one after another and
//! the chain stops at the first failure. Background tasks (the dashboard) start only
//! after every blocking task has succeeded, and the runner does not wait for them.

use crate::config::{CommandConfig, DashboardConfig, PipelineConfig, StageConfig};
use crate::stage::run_stage;
use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    /// Runs to completion; failure halts the chain.
    Blocking,
    /// Started after all blocking tasks succeed; never awaited.
    Background,
}

pub trait Task {
    fn name(&self) -> &str;

    fn kind(&self) -> TaskKind {
        TaskKind::Blocking
    }

    /// Execute the task, returning a one-line summary.
    ///
    /// # Errors
    /// Any error marks the task as failed.
    fn run(&self) -> Result<String>;
}

/// In-process ingestion stage.
pub struct IngestTask {
    config: StageConfig,
}

impl IngestTask {
    #[must_use]
    pub fn new(config: StageConfig) -> Self {
        Self { config }
    }
}

impl Task for IngestTask {
    fn name(&self) -> &str {
        &self.config.dataset
    }

    fn run(&self) -> Result<String> {
        let report = run_stage(&self.config)?;
        Ok(format!(
            "{} rows, {} distinct {}, saved to {} ({})",
            report.stats.total_rows,
            report.stats.distinct_key_count,
            self.config.key_column,
            report.output.path.display(),
            report.output.format
        ))
    }
}

/// External program run to completion; its output is relayed into the log.
pub struct CommandTask {
    name: String,
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl CommandTask {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Task for a configured step, run from `cwd`.
    #[must_use]
    pub fn from_config(cfg: &CommandConfig, cwd: impl Into<PathBuf>) -> Self {
        Self::new(cfg.name.clone(), cfg.program.clone())
            .args(cfg.args.iter().cloned())
            .current_dir(cwd)
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl Task for CommandTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        let output = cmd
            .output()
            .with_context(|| format!("spawn `{}`", self.program))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!(task = %self.name, "{line}");
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            warn!(task = %self.name, "{line}");
        }
        if !output.status.success() {
            bail!("`{}` exited with {}", self.program, output.status);
        }
        Ok(format!("`{}` finished", self.program))
    }
}

/// Long-running program started without waiting, optionally followed by opening a URL.
///
/// The child is detached: it is never waited on or killed, and outlives the run.
/// Its output is discarded; stop it from its own console or process manager.
pub struct BackgroundTask {
    name: String,
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    open: Option<(String, String)>,
}

impl BackgroundTask {
    #[must_use]
    pub fn from_dashboard(cfg: &DashboardConfig, cwd: impl Into<PathBuf>) -> Self {
        Self {
            name: "dashboard".to_string(),
            program: cfg.program.clone(),
            args: cfg.args.clone(),
            cwd: Some(cwd.into()),
            open: cfg.open_with.clone().zip(cfg.url.clone()),
        }
    }
}

impl Task for BackgroundTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Background
    }

    fn run(&self) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        let child = cmd
            .spawn()
            .with_context(|| format!("spawn `{}`", self.program))?;
        info!(
            pid = child.id(),
            "{} started in the background (detached, not supervised)",
            self.name
        );

        if let Some((opener, url)) = &self.open {
            // Not opening a browser leaves the dashboard usable, so only warn.
            if let Err(e) = Command::new(opener).arg(url).spawn() {
                warn!("could not open {url} with `{opener}`: {e}");
            }
        }
        Ok(format!("pid {}", child.id()))
    }
}

/// What happened during [`Runner::run`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub completed: Vec<String>,
    /// Name and error chain of the task that stopped the run.
    pub failed: Option<(String, String)>,
    pub launched: Vec<String>,
}

impl RunReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }
}

#[derive(Debug, Default)]
pub struct Runner;

impl Runner {
    /// Execute blocking tasks in order, then launch background tasks.
    pub fn run(&self, tasks: &[Box<dyn Task>]) -> RunReport {
        let mut report = RunReport::default();

        for task in tasks.iter().filter(|t| t.kind() == TaskKind::Blocking) {
            info!("running task: {}", task.name());
            match task.run() {
                Ok(summary) => {
                    info!("task {} succeeded: {summary}", task.name());
                    report.completed.push(task.name().to_string());
                }
                Err(e) => {
                    error!("task {} failed: {e:#}", task.name());
                    error!("aborting chain");
                    report.failed = Some((task.name().to_string(), format!("{e:#}")));
                    return report;
                }
            }
        }

        for task in tasks.iter().filter(|t| t.kind() == TaskKind::Background) {
            info!("launching {}", task.name());
            match task.run() {
                Ok(_) => report.launched.push(task.name().to_string()),
                Err(e) => {
                    error!("failed to launch {}: {e:#}", task.name());
                    report.failed = Some((task.name().to_string(), format!("{e:#}")));
                }
            }
        }
        report
    }
}

/// Tasks for a configured run: one ingestion stage per dataset, the configured
/// steps in the project root, then the dashboard.
#[must_use]
pub fn pipeline_tasks(cfg: &PipelineConfig) -> Vec<Box<dyn Task>> {
    let mut tasks: Vec<Box<dyn Task>> = cfg
        .datasets
        .iter()
        .map(|kind| Box::new(IngestTask::new(cfg.stage(*kind))) as Box<dyn Task>)
        .collect();
    tasks.extend(cfg.steps.iter().map(|step| {
        Box::new(CommandTask::from_config(step, &cfg.project_root)) as Box<dyn Task>
    }));
    if let Some(dashboard) = &cfg.dashboard {
        tasks.push(Box::new(BackgroundTask::from_dashboard(
            dashboard,
            &cfg.project_root,
        )));
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Probe {
        name: &'static str,
        kind: TaskKind,
        fail: bool,
        calls: Rc<Cell<u32>>,
    }

    impl Task for Probe {
        fn name(&self) -> &str {
            self.name
        }
        fn kind(&self) -> TaskKind {
            self.kind
        }
        fn run(&self) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                bail!("{} broke", self.name);
            }
            Ok("ok".into())
        }
    }

    fn probe(name: &'static str, kind: TaskKind, fail: bool, calls: &Rc<Cell<u32>>) -> Box<dyn Task> {
        Box::new(Probe {
            name,
            kind,
            fail,
            calls: Rc::clone(calls),
        })
    }

    #[test]
    fn halts_on_first_failure_and_skips_background() {
        let calls = Rc::new(Cell::new(0));
        let tasks = vec![
            probe("clicks", TaskKind::Blocking, false, &calls),
            probe("campaigns", TaskKind::Blocking, true, &calls),
            probe("regions", TaskKind::Blocking, false, &calls),
            probe("dashboard", TaskKind::Background, false, &calls),
        ];
        let report = Runner.run(&tasks);
        assert_eq!(calls.get(), 2);
        assert_eq!(report.completed, vec!["clicks".to_string()]);
        assert_eq!(report.failed.as_ref().map(|(n, _)| n.as_str()), Some("campaigns"));
        assert!(report.launched.is_empty());
        assert!(!report.is_success());
    }

    #[test]
    fn background_tasks_start_after_blocking_ones() {
        let calls = Rc::new(Cell::new(0));
        let tasks = vec![
            probe("dashboard", TaskKind::Background, false, &calls),
            probe("regions", TaskKind::Blocking, false, &calls),
        ];
        let report = Runner.run(&tasks);
        assert!(report.is_success());
        assert_eq!(report.completed, vec!["regions".to_string()]);
        assert_eq!(report.launched, vec!["dashboard".to_string()]);
    }

    #[test]
    fn pipeline_tasks_follow_dataset_order() {
        let cfg = PipelineConfig {
            steps: vec![
                CommandConfig {
                    name: "process".into(),
                    program: "python3".into(),
                    args: vec!["data_processor.py".into()],
                },
                CommandConfig {
                    name: "hourly-activity".into(),
                    program: "python3".into(),
                    args: vec![],
                },
            ],
            dashboard: Some(DashboardConfig::new("dash")),
            ..PipelineConfig::default()
        };
        let tasks = pipeline_tasks(&cfg);
        let names: Vec<&str> = tasks.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec!["clicks", "campaigns", "regions", "process", "hourly-activity", "dashboard"]
        );
        assert!(tasks[..5].iter().all(|t| t.kind() == TaskKind::Blocking));
        assert_eq!(tasks[5].kind(), TaskKind::Background);
    }
}
