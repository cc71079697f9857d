pub mod ds18b20;
pub mod simulated;

pub use ds18b20::{decode_scratchpad, Ds18b20, StdDelay};
pub use simulated::{ProbeHandle, SimulatedProbe};

use thiserror::Error;

use crate::models::SensorSample;
use crate::onewire::BusError;

/// Why a read cycle produced no sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorError {
    /// No device answered a reset pulse; the transaction was aborted.
    #[error("no presence pulse after bus reset")]
    NoPresence,

    /// The scratchpad failed CRC validation and was discarded.
    #[error("scratchpad checksum mismatch (expected {expected:#04x}, computed {computed:#04x})")]
    ChecksumMismatch { expected: u8, computed: u8 },

    #[error(transparent)]
    Bus(#[from] BusError),

    /// The blocking read was cancelled or panicked before returning.
    #[error("sensor read task did not complete")]
    Interrupted,
}

/// Anything able to produce one temperature sample per call.
///
/// Implementations block the calling thread for the whole transaction.
pub trait TemperatureSource {
    fn read_once(&mut self) -> Result<SensorSample, SensorError>;
}
