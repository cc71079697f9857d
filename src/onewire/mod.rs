pub mod bus;
pub mod crc;

pub use bus::{Clock, MonotonicClock, OpenDrain, SignalPin, SingleWireBus};
pub use crc::crc8;

use thiserror::Error;

/// ROM-level commands understood by every device on the bus.
pub mod command {
    /// Address all devices at once; valid only with a single device attached.
    pub const SKIP_ROM: u8 = 0xCC;
}

/// Faults raised by the bus transport itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    /// The data pin reported a hardware error.
    #[error("data pin fault: {0:?}")]
    Pin(embedded_hal::digital::ErrorKind),
}

/// Byte-level access to a single-wire bus.
///
/// `SingleWireBus` implements this against real pin timing; sensor drivers only depend
/// on the trait so they can be exercised against scripted transports.
pub trait OneWire {
    /// Issue a reset pulse. Returns `true` when a device answered with a presence pulse.
    fn reset(&mut self) -> Result<bool, BusError>;

    /// Write one byte, least-significant bit first.
    fn write_byte(&mut self, byte: u8) -> Result<(), BusError>;

    /// Read one byte, least-significant bit first.
    fn read_byte(&mut self) -> Result<u8, BusError>;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), BusError> {
        for slot in buf.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(())
    }
}
