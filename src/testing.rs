//! Fixture helpers for tests that need real files on disk.
//!
//! Used by this crate's unit and integration tests; also handy for downstream
//! tests that drive a stage end-to-end inside a [`tempfile`] directory.

use anyhow::{Context, Result};
use std::fs::{File, create_dir_all};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Write a CSV file with `header` and `rows`, creating parent directories.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_csv_fixture<S: AsRef<str>>(
    path: impl AsRef<Path>,
    header: &[&str],
    rows: &[Vec<S>],
) -> Result<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut wtr = csv::Writer::from_writer(BufWriter::new(f));
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(row.iter().map(|field| <S as AsRef<str>>::as_ref(field)))?;
    }
    let mut inner = wtr
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flush {}: {}", path.display(), e.error()))?;
    inner.flush()?;
    Ok(path.to_path_buf())
}

/// `n` region rows `[region_id, name]` whose ids cycle through `distinct` values.
#[must_use]
pub fn region_rows(n: usize, distinct: usize) -> Vec<Vec<String>> {
    let distinct = distinct.max(1);
    (0..n)
        .map(|i| {
            let id = i % distinct;
            vec![id.to_string(), format!("region-{id}")]
        })
        .collect()
}

/// Regular files directly inside `dir` (non-recursive), sorted by name.
///
/// # Errors
/// Returns an error if the directory cannot be listed.
pub fn list_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Run `f` with a thread-local subscriber and return its result plus every
/// formatted log line it emitted (no ANSI colors, all levels).
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buf);
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || LogBuffer(Arc::clone(&sink)))
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let text = match buf.lock() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
    };
    (result, text)
}

struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("log buffer poisoned"))?
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
