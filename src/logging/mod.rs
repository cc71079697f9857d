pub mod inspector;
pub mod service;

pub use inspector::{dump_tail, read_tail, DEFAULT_TAIL_BYTES};
pub use service::{append_record, choose_log_path, format_record, LogSchedule, LogService};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the persisted temperature log.
#[derive(Debug, Error)]
pub enum StorageError {
    /// None of the candidate roots accepted the log file.
    #[error("no writable log root among {0:?}")]
    Unavailable(Vec<PathBuf>),

    #[error("log file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("log I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("log record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
