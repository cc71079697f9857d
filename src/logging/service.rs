//! Periodic JSON Lines writer for the displayed temperature
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;
use time::OffsetDateTime;

use super::StorageError;
use crate::models::Snapshot;
use crate::state::ThermostatState;
use crate::task::PeriodicTask;
use crate::utils::format_utc;

/// One line of the persisted log.
#[derive(Debug, Serialize)]
struct LogRecord {
    utc: String,
    #[serde(rename = "actualC")]
    actual_c: f64,
}

/// Timing of the log writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSchedule {
    pub initial_delay: Duration,
    pub period: Duration,
}

impl Default for LogSchedule {
    fn default() -> Self {
        LogSchedule {
            initial_delay: Duration::from_secs(5),
            period: Duration::from_secs(60),
        }
    }
}

/// Pick the log file under the first usable root
///
/// A root is usable when it is an existing directory in which `file_name` can be
/// opened for appending. The file is created empty if it does not exist yet.
///
/// # Returns
/// The full path of the log file, or `StorageError::Unavailable` listing every root tried
pub fn choose_log_path(roots: &[PathBuf], file_name: &str) -> Result<PathBuf, StorageError> {
    for root in roots {
        match fs::metadata(root) {
            Ok(meta) if meta.is_dir() => {}
            _ => {
                debug!("Log root {} is not a directory", root.display());
                continue;
            }
        }

        let path = root.join(file_name);
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(e) => warn!("Log root {} is not writable: {}", root.display(), e),
        }
    }
    Err(StorageError::Unavailable(roots.to_vec()))
}

/// Format one log line (without the trailing newline).
pub fn format_record(snapshot: &Snapshot, at: &OffsetDateTime) -> Result<String, StorageError> {
    let record = LogRecord {
        utc: format_utc(at),
        actual_c: snapshot.actual.tenths() as f64 / 10.0,
    };
    Ok(serde_json::to_string(&record)?)
}

/// Append one record and flush it.
///
/// Returns the line that was written.
pub fn append_record(
    path: &Path,
    snapshot: &Snapshot,
    at: &OffsetDateTime,
) -> Result<String, StorageError> {
    let line = format_record(snapshot, at)?;
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(format!("{}\n", line).as_bytes())?;
    file.flush()?;
    Ok(line)
}

/// Background writer that snapshots the state and appends it to the log file.
///
/// Each append is a single synchronous write inside one tick, so stopping the
/// service never leaves half a record behind.
#[derive(Debug)]
pub struct LogService {
    path: PathBuf,
    task: PeriodicTask,
}

impl LogService {
    /// Spawn the writer on the current tokio runtime.
    pub fn start(state: Arc<ThermostatState>, path: PathBuf, schedule: LogSchedule) -> Self {
        info!(
            "Temperature log started. File={} interval={}ms",
            path.display(),
            schedule.period.as_millis()
        );

        let task_path = path.clone();
        let task = PeriodicTask::spawn(
            "temperature log",
            schedule.initial_delay,
            schedule.period,
            move || {
                let snapshot = state.snapshot();
                match append_record(&task_path, &snapshot, &OffsetDateTime::now_utc()) {
                    Ok(line) => debug!("Logged: {}", line),
                    Err(e) => error!("Skipping log tick: {}", e),
                }
                async {}
            },
        );

        LogService { path, task }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Cancel the timer. Calling it again is a no-op.
    pub fn stop(&self) {
        self.task.stop();
    }
}
