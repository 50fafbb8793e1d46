//! Summary statistics of one ingestion run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total_rows: u64,
    /// Rows kept for persistence. Nothing is filtered, so this equals `total_rows`.
    pub retained_rows: u64,
    pub distinct_key_count: u64,
    pub batches: usize,
    pub elapsed_seconds: f64,
}

impl RunStatistics {
    /// Log the completion summary block.
    pub fn log_summary(&self, key_column: &str) {
        info!("{}", "=".repeat(50));
        info!("processing finished");
        info!("total rows:          {}", self.total_rows);
        info!("distinct {key_column}: {}", self.distinct_key_count);
        info!("batches:             {}", self.batches);
        info!("elapsed:             {:.1} s", self.elapsed_seconds);
        info!("{}", "=".repeat(50));
    }

    /// Save the statistics as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("serialize run statistics")?;
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}
