use std::env;
use std::path::PathBuf;
use std::time::Duration;

use log::info;
use thiserror::Error;

use crate::logging::LogSchedule;
use crate::models::{Resolution, Temperature};

const DEFAULT_LOG_ROOTS: &str = "/data,/var/lib/thermostat,.";
const DEFAULT_LOG_FILE: &str = "temp-log.jsonl";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name}: invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub preferred: Temperature,
    pub initial_actual: Temperature,
    pub tolerance: Temperature,
    pub poll_interval: Duration,
    pub log_schedule: LogSchedule,
    pub log_roots: Vec<PathBuf>,
    pub log_file: String,
    pub resolution: Resolution,
    /// Reading served by the simulated probe on hosts without a sensor
    pub simulated_raw: i16,
}

impl Default for PanelConfig {
    fn default() -> Self {
        PanelConfig {
            preferred: Temperature::from_tenths(210),
            initial_actual: Temperature::from_tenths(210),
            tolerance: Temperature::from_tenths(5),
            poll_interval: Duration::from_millis(1500),
            log_schedule: LogSchedule::default(),
            log_roots: parse_roots(DEFAULT_LOG_ROOTS),
            log_file: DEFAULT_LOG_FILE.to_string(),
            resolution: Resolution::Bits12,
            simulated_raw: 0x0150,
        }
    }
}

fn parse_roots(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|root| !root.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn invalid(name: &'static str, value: &str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason,
    }
}

fn parse_celsius(name: &'static str, value: &str) -> Result<Temperature, ConfigError> {
    let celsius: f64 = value
        .trim()
        .parse()
        .map_err(|_| invalid(name, value, "expected degrees Celsius"))?;
    if !celsius.is_finite() || celsius.abs() > 1000.0 {
        return Err(invalid(name, value, "out of range"));
    }
    Ok(Temperature::from_celsius(celsius))
}

fn parse_millis(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let millis: u64 = value
        .trim()
        .parse()
        .map_err(|_| invalid(name, value, "expected milliseconds"))?;
    Ok(Duration::from_millis(millis))
}

fn parse_period(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let period = parse_millis(name, value)?;
    if period.is_zero() {
        return Err(invalid(name, value, "period must be positive"));
    }
    Ok(period)
}

fn parse_raw(name: &'static str, value: &str) -> Result<i16, ConfigError> {
    let value_trim = value.trim();
    let parsed = match value_trim.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16).map(|raw| raw as i16),
        None => value_trim.parse::<i16>(),
    };
    parsed.map_err(|_| invalid(name, value, "expected a 16-bit sensor value"))
}

impl PanelConfig {
    /// Load configuration from the environment (and `.env`, if present)
    ///
    /// Every variable is optional; unset ones keep their defaults. See `apply` for the
    /// variable names.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();

        let config = Self::default().apply(|name| env::var(name).ok())?;
        info!(
            "Preferred {} C, tolerance {} C, poll every {}ms, log roots {:?}",
            config.preferred,
            config.tolerance,
            config.poll_interval.as_millis(),
            config.log_roots
        );
        Ok(config)
    }

    /// Override fields from a variable lookup.
    pub fn apply<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("THERMO_PREFERRED_C") {
            self.preferred = parse_celsius("THERMO_PREFERRED_C", &value)?;
        }
        if let Some(value) = lookup("THERMO_INITIAL_C") {
            self.initial_actual = parse_celsius("THERMO_INITIAL_C", &value)?;
        }
        if let Some(value) = lookup("THERMO_TOLERANCE_C") {
            let tolerance = parse_celsius("THERMO_TOLERANCE_C", &value)?;
            if tolerance.is_negative() {
                return Err(invalid("THERMO_TOLERANCE_C", &value, "tolerance must not be negative"));
            }
            self.tolerance = tolerance;
        }
        if let Some(value) = lookup("THERMO_POLL_MS") {
            self.poll_interval = parse_period("THERMO_POLL_MS", &value)?;
        }
        if let Some(value) = lookup("THERMO_LOG_PERIOD_MS") {
            self.log_schedule.period = parse_period("THERMO_LOG_PERIOD_MS", &value)?;
        }
        if let Some(value) = lookup("THERMO_LOG_DELAY_MS") {
            self.log_schedule.initial_delay = parse_millis("THERMO_LOG_DELAY_MS", &value)?;
        }
        if let Some(value) = lookup("THERMO_LOG_ROOTS") {
            let roots = parse_roots(&value);
            if roots.is_empty() {
                return Err(invalid("THERMO_LOG_ROOTS", &value, "no candidate roots"));
            }
            self.log_roots = roots;
        }
        if let Some(value) = lookup("THERMO_LOG_FILE") {
            let name = value.trim();
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(invalid("THERMO_LOG_FILE", &value, "expected a plain file name"));
            }
            self.log_file = name.to_string();
        }
        if let Some(value) = lookup("THERMO_RESOLUTION_BITS") {
            self.resolution = value
                .trim()
                .parse::<u8>()
                .ok()
                .and_then(Resolution::from_bits)
                .ok_or_else(|| invalid("THERMO_RESOLUTION_BITS", &value, "expected 9, 10, 11 or 12"))?;
        }
        if let Some(value) = lookup("THERMO_SIM_RAW") {
            self.simulated_raw = parse_raw("THERMO_SIM_RAW", &value)?;
        }
        Ok(self)
    }
}
