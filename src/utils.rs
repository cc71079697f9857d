//! Timestamp formatting and monotonic time helpers
use std::time::Instant;

use time::{format_description, OffsetDateTime, UtcOffset};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format.
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Format a timestamp for the persisted log as `YYYY-MM-DDTHH:MM:SSZ`
///
/// The value is converted to UTC first, so any offset is accepted.
pub fn format_utc(dt: &OffsetDateTime) -> String {
    let utc = dt.to_offset(UtcOffset::UTC);
    match format_description::parse("[year]-[month]-[day]T[hour]:[minute]:[second]Z") {
        Ok(format) => utc.format(&format).unwrap_or_else(|_| utc.to_string()),
        Err(_) => utc.to_string(),
    }
}

/// Milliseconds since a fixed process-wide origin, for edge timestamps.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicMillis {
    origin: Instant,
}

impl MonotonicMillis {
    pub fn new() -> Self {
        MonotonicMillis {
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

impl Default for MonotonicMillis {
    fn default() -> Self {
        Self::new()
    }
}
