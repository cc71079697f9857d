//! Diagnostic access to the end of the log file
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use log::{error, info};

use super::StorageError;

pub const DEFAULT_TAIL_BYTES: u64 = 512;

/// Read the last `max_bytes` of the file as text.
///
/// A cut through a multi-byte character at the start is replaced, not an error.
pub fn read_tail(path: &Path, max_bytes: u64) -> Result<String, StorageError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StorageError::Missing(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let len = file.metadata()?.len();
    let start = len.saturating_sub(max_bytes);
    file.seek(SeekFrom::Start(start))?;

    let mut buf = Vec::with_capacity((len - start) as usize);
    file.take(max_bytes).read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Emit the tail of the log through the logger. Failures are logged, never raised.
pub fn dump_tail(path: &Path, max_bytes: u64) {
    match read_tail(path, max_bytes) {
        Ok(text) => {
            info!("===== Log begin ({}) =====", path.display());
            for line in text.lines() {
                info!("{}", line);
            }
            info!("===== Log end =====");
        }
        Err(e) => error!("Cannot dump log tail: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn scratch_file(name: &str, contents: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("thermostat-panel-{}-tail", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn short_file_is_returned_whole() {
        let path = scratch_file("short.jsonl", b"{\"a\":1}\n");
        assert_eq!(read_tail(&path, 512).unwrap(), "{\"a\":1}\n");
    }

    #[test]
    fn long_file_is_cut_to_the_last_bytes() {
        let contents: String = (0..100).map(|i| format!("line {:03}\n", i)).collect();
        let path = scratch_file("long.jsonl", contents.as_bytes());

        let tail = read_tail(&path, 18).unwrap();
        assert_eq!(tail, "line 098\nline 099\n");
    }

    #[test]
    fn split_character_is_replaced() {
        let path = scratch_file("utf8.jsonl", "x°C".as_bytes());
        // "°" is two bytes; keep only its second byte plus "C"
        let tail = read_tail(&path, 2).unwrap();
        assert_eq!(tail, "\u{FFFD}C");
    }

    #[test]
    fn missing_file_is_reported() {
        let path = std::env::temp_dir().join("thermostat-panel-does-not-exist.jsonl");
        assert!(matches!(read_tail(&path, 512), Err(StorageError::Missing(_))));
        dump_tail(&path, 512);
    }
}
