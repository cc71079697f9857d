//! DS18B20 read cycle over a single-wire bus using skip-ROM addressing
use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::debug;

use super::{SensorError, TemperatureSource};
use crate::models::{Resolution, SensorSample};
use crate::onewire::{command, crc8, OneWire};

const CMD_CONVERT_TEMP: u8 = 0x44;
const CMD_READ_SCRATCHPAD: u8 = 0xBE;

pub const SCRATCHPAD_LEN: usize = 9;

/// Decode a DS18B20 scratchpad into a temperature sample
///
/// The scratchpad is 9 bytes:
/// - Bytes 0-1: Temperature (signed 16-bit little-endian, 1/16 °C resolution)
/// - Bytes 2-3: Alarm thresholds TH/TL (not used here)
/// - Byte 4: Configuration register (resolution in bits 5-6)
/// - Bytes 5-7: Reserved
/// - Byte 8: CRC-8 over bytes 0-7
///
/// # Returns
/// The sample, or `ChecksumMismatch` if byte 8 does not match; an unchecked
/// scratchpad is never decoded.
pub fn decode_scratchpad(scratchpad: &[u8; SCRATCHPAD_LEN]) -> Result<SensorSample, SensorError> {
    let computed = crc8(&scratchpad[..SCRATCHPAD_LEN - 1]);
    let expected = scratchpad[SCRATCHPAD_LEN - 1];
    if computed != expected {
        return Err(SensorError::ChecksumMismatch { expected, computed });
    }

    let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
    let resolution = Resolution::from_config_register(scratchpad[4]);
    Ok(SensorSample::from_raw(raw, resolution))
}

/// Blocking `DelayNs` for hosted targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns as u64));
    }
}

/// The only sensor on the bus, addressed with skip-ROM.
#[derive(Debug)]
pub struct Ds18b20<B, D = StdDelay> {
    bus: B,
    delay: D,
    resolution: Resolution,
}

impl<B: OneWire, D: DelayNs> Ds18b20<B, D> {
    pub fn new(bus: B, delay: D, resolution: Resolution) -> Self {
        Ds18b20 {
            bus,
            delay,
            resolution,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn select(&mut self) -> Result<(), SensorError> {
        if !self.bus.reset()? {
            return Err(SensorError::NoPresence);
        }
        self.bus.write_byte(command::SKIP_ROM)?;
        Ok(())
    }

    pub fn start_conversion(&mut self) -> Result<(), SensorError> {
        self.select()?;
        self.bus.write_byte(CMD_CONVERT_TEMP)?;
        Ok(())
    }

    pub fn read_scratchpad(&mut self) -> Result<[u8; SCRATCHPAD_LEN], SensorError> {
        self.select()?;
        self.bus.write_byte(CMD_READ_SCRATCHPAD)?;

        let mut scratchpad = [0u8; SCRATCHPAD_LEN];
        self.bus.read_bytes(&mut scratchpad)?;
        debug!("Scratchpad: {:02x?}", scratchpad);
        Ok(scratchpad)
    }

    pub fn into_inner(self) -> B {
        self.bus
    }
}

impl<B: OneWire, D: DelayNs> TemperatureSource for Ds18b20<B, D> {
    /// Full conversion and readout; blocks for the conversion latency.
    fn read_once(&mut self) -> Result<SensorSample, SensorError> {
        self.start_conversion()?;
        self.delay.delay_us(self.resolution.conversion_time_us());
        let scratchpad = self.read_scratchpad()?;
        decode_scratchpad(&scratchpad)
    }
}
