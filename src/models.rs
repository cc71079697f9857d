//! Value types shared between the sensor driver, the state and the renderers
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// Fixed-point units per degree Celsius.
///
/// Ten-thousandths represent both sensor sixteenths (625 units) and display tenths
/// (1000 units) exactly.
pub const UNITS_PER_DEGREE: i32 = 10_000;
const UNITS_PER_TENTH: i32 = UNITS_PER_DEGREE / 10;
const UNITS_PER_SIXTEENTH: i32 = UNITS_PER_DEGREE / 16;
// Largest magnitude that is still a whole tenth inside the i32 range.
const MAX_TENTHS: i32 = i32::MAX / UNITS_PER_TENTH;

/// Temperature in degrees Celsius, stored as ten-thousandths of a degree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temperature(i32);

impl Temperature {
    pub const ZERO: Temperature = Temperature(0);

    pub const fn from_units(units: i32) -> Self {
        Temperature(units)
    }

    pub const fn units(self) -> i32 {
        self.0
    }

    /// Saturates at the representable range.
    pub const fn from_tenths(tenths: i32) -> Self {
        Temperature(tenths.saturating_mul(UNITS_PER_TENTH))
    }

    /// Decode a raw sensor value counted in sixteenths of a degree.
    pub const fn from_sixteenths(raw: i16) -> Self {
        Temperature(raw as i32 * UNITS_PER_SIXTEENTH)
    }

    /// Nearest fixed-point value to a floating-point reading.
    pub fn from_celsius(celsius: f64) -> Self {
        Temperature((celsius * UNITS_PER_DEGREE as f64).round() as i32)
    }

    pub fn as_celsius(self) -> f64 {
        self.0 as f64 / UNITS_PER_DEGREE as f64
    }

    /// Round to one decimal digit, halves away from zero.
    ///
    /// Values beyond the last whole tenth of the range round back towards zero.
    pub fn round_to_tenth(self) -> Self {
        let whole = self.0 / UNITS_PER_TENTH;
        let rest = self.0 % UNITS_PER_TENTH;
        let tenths = if rest.abs() * 2 >= UNITS_PER_TENTH {
            whole + rest.signum()
        } else {
            whole
        };
        Temperature::from_tenths(tenths.clamp(-MAX_TENTHS, MAX_TENTHS))
    }

    /// Whole tenths after rounding, used for display and the log format.
    pub fn tenths(self) -> i32 {
        self.round_to_tenth().0 / UNITS_PER_TENTH
    }

    pub fn abs_diff(self, other: Temperature) -> Temperature {
        Temperature(self.0.saturating_sub(other.0).saturating_abs())
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for Temperature {
    type Output = Temperature;

    fn add(self, rhs: Temperature) -> Temperature {
        Temperature(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Temperature {
    type Output = Temperature;

    fn sub(self, rhs: Temperature) -> Temperature {
        Temperature(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Temperature {
    type Output = Temperature;

    fn neg(self) -> Temperature {
        Temperature(self.0.saturating_neg())
    }
}

/// Formats with exactly one decimal, without going through floating point.
impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tenths = self.tenths();
        let sign = if tenths < 0 { "-" } else { "" };
        let abs = tenths.abs();
        write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
    }
}

/// Classification of the displayed value against the preferred one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Equal,
    Cold,
    Warm,
}

impl Status {
    /// Equal within the tolerance (inclusive), Cold below it, Warm above it.
    pub fn classify(actual: Temperature, preferred: Temperature, tolerance: Temperature) -> Status {
        if actual.abs_diff(preferred) <= tolerance {
            Status::Equal
        } else if actual < preferred - tolerance {
            Status::Cold
        } else {
            Status::Warm
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Equal => "Equal",
            Status::Cold => "Cold",
            Status::Warm => "Warm",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Consistent copy of the thermostat state taken under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub preferred: Temperature,
    pub actual: Temperature,
    pub last_sensor: Temperature,
    pub tolerance: Temperature,
}

impl Snapshot {
    pub fn status(&self) -> Status {
        Status::classify(self.actual, self.preferred, self.tolerance)
    }
}

/// Conversion resolution of the sensor's analog-to-digital converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Bits9,
    Bits10,
    Bits11,
    Bits12,
}

impl Resolution {
    /// Worst-case conversion latency in microseconds.
    pub fn conversion_time_us(self) -> u32 {
        match self {
            Resolution::Bits9 => 93_750,
            Resolution::Bits10 => 187_500,
            Resolution::Bits11 => 375_000,
            Resolution::Bits12 => 750_000,
        }
    }

    pub fn from_bits(bits: u8) -> Option<Resolution> {
        match bits {
            9 => Some(Resolution::Bits9),
            10 => Some(Resolution::Bits10),
            11 => Some(Resolution::Bits11),
            12 => Some(Resolution::Bits12),
            _ => None,
        }
    }

    /// Decode the configuration register (scratchpad byte 4).
    pub fn from_config_register(register: u8) -> Resolution {
        match (register >> 5) & 0b11 {
            0b00 => Resolution::Bits9,
            0b01 => Resolution::Bits10,
            0b10 => Resolution::Bits11,
            _ => Resolution::Bits12,
        }
    }
}

/// One decoded scratchpad reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSample {
    /// Two's-complement reading in sixteenths of a degree
    pub raw: i16,
    pub celsius: Temperature,
    pub resolution: Resolution,
}

impl SensorSample {
    pub fn from_raw(raw: i16, resolution: Resolution) -> Self {
        SensorSample {
            raw,
            celsius: Temperature::from_sixteenths(raw),
            resolution,
        }
    }
}
