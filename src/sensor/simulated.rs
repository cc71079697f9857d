//! Byte-level DS18B20 model for hosts without a real single-wire pin
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::models::{Resolution, Temperature};
use crate::onewire::{command, crc8, BusError, OneWire};

/// Value the device reports before its first conversion (85 °C).
pub const POWER_ON_RAW: i16 = 0x0550;

#[derive(Debug)]
struct ProbeSettings {
    raw: i16,
    present: bool,
    corrupt: bool,
}

/// Knobs for a running `SimulatedProbe`, shareable across threads.
#[derive(Debug, Clone)]
pub struct ProbeHandle(Arc<Mutex<ProbeSettings>>);

impl ProbeHandle {
    fn settings(&self) -> MutexGuard<'_, ProbeSettings> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Temperature the next conversion latches, in sixteenths of a degree.
    pub fn set_raw(&self, raw: i16) {
        self.settings().raw = raw;
    }

    /// Nearest representable reading to `temperature`.
    pub fn set_temperature(&self, temperature: Temperature) {
        let raw = (temperature.units() as f64 / 625.0).round() as i16;
        self.set_raw(raw);
    }

    /// Disconnect or reconnect the device; a missing device never answers resets.
    pub fn set_present(&self, present: bool) {
        self.settings().present = present;
    }

    /// Flip a bit in every scratchpad served from now on.
    pub fn set_corrupt(&self, corrupt: bool) {
        self.settings().corrupt = corrupt;
    }
}

#[derive(Debug)]
enum Phase {
    Idle,
    AwaitRomCommand,
    AwaitFunction,
    Reading(VecDeque<u8>),
}

/// Answers the skip-ROM conversion and scratchpad commands like a single DS18B20.
#[derive(Debug)]
pub struct SimulatedProbe {
    settings: ProbeHandle,
    phase: Phase,
    converted: i16,
    resolution: Resolution,
}

impl SimulatedProbe {
    pub fn new(raw: i16, resolution: Resolution) -> Self {
        SimulatedProbe {
            settings: ProbeHandle(Arc::new(Mutex::new(ProbeSettings {
                raw,
                present: true,
                corrupt: false,
            }))),
            phase: Phase::Idle,
            converted: POWER_ON_RAW,
            resolution,
        }
    }

    pub fn handle(&self) -> ProbeHandle {
        self.settings.clone()
    }

    fn scratchpad(&self) -> VecDeque<u8> {
        let [lsb, msb] = self.converted.to_le_bytes();
        let config = match self.resolution {
            Resolution::Bits9 => 0x1F,
            Resolution::Bits10 => 0x3F,
            Resolution::Bits11 => 0x5F,
            Resolution::Bits12 => 0x7F,
        };
        let mut pad = vec![lsb, msb, 0x4B, 0x46, config, 0xFF, 0x0C, 0x10];
        pad.push(crc8(&pad));
        if self.settings.settings().corrupt {
            pad[0] ^= 0x01;
        }
        pad.into()
    }
}

impl OneWire for SimulatedProbe {
    fn reset(&mut self) -> Result<bool, BusError> {
        if !self.settings.settings().present {
            self.phase = Phase::Idle;
            return Ok(false);
        }
        self.phase = Phase::AwaitRomCommand;
        Ok(true)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        self.phase = match (&self.phase, byte) {
            (Phase::AwaitRomCommand, command::SKIP_ROM) => Phase::AwaitFunction,
            (Phase::AwaitFunction, 0x44) => {
                self.converted = self.settings.settings().raw;
                Phase::Idle
            }
            (Phase::AwaitFunction, 0xBE) => Phase::Reading(self.scratchpad()),
            _ => Phase::Idle,
        };
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, BusError> {
        // A released line with nobody driving it reads as ones.
        match &mut self.phase {
            Phase::Reading(bytes) => Ok(bytes.pop_front().unwrap_or(0xFF)),
            _ => Ok(0xFF),
        }
    }
}
