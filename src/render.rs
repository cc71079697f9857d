//! Status indicators driven after every state change
use std::sync::{Mutex, PoisonError};

use embedded_hal::digital::{OutputPin, PinState};
use log::info;
use thiserror::Error;

use crate::models::{Snapshot, Status};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("indicator pin fault: {0:?}")]
    Pin(embedded_hal::digital::ErrorKind),

    #[error("display unavailable: {0}")]
    Display(String),
}

/// Something that mirrors the thermostat state to the user.
///
/// Errors are returned to the control loop, which logs them and carries on.
pub trait Renderer: Send + Sync {
    fn name(&self) -> &str;
    fn refresh(&self, snapshot: &Snapshot) -> Result<(), RenderError>;
}

/// Three display lines: preferred value, current value, status.
pub fn status_lines(snapshot: &Snapshot) -> [String; 3] {
    [
        format!("Preferred: {} C", snapshot.preferred),
        format!("Current:    {} C", snapshot.actual),
        format!("Status: {}", snapshot.status()),
    ]
}

/// Text panel for hosts without a display; writes changed screens to the log.
#[derive(Debug, Default)]
pub struct ConsolePanel {
    shown: Mutex<Option<[String; 3]>>,
}

impl ConsolePanel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for ConsolePanel {
    fn name(&self) -> &str {
        "console"
    }

    fn refresh(&self, snapshot: &Snapshot) -> Result<(), RenderError> {
        let lines = status_lines(snapshot);
        let mut shown = self.shown.lock().unwrap_or_else(PoisonError::into_inner);
        if shown.as_ref() != Some(&lines) {
            info!("{} | {} | {}", lines[0], lines[1], lines[2]);
            *shown = Some(lines);
        }
        Ok(())
    }
}

#[derive(Debug)]
struct LedPins<B, G, R> {
    blue: B,
    green: G,
    red: R,
}

/// Blue for cold, green for equal, red for warm; exactly one LED lit.
#[derive(Debug)]
pub struct LedIndicator<B, G, R> {
    pins: Mutex<LedPins<B, G, R>>,
}

fn led_fault<E: embedded_hal::digital::Error>(err: E) -> RenderError {
    RenderError::Pin(err.kind())
}

impl<B, G, R> LedIndicator<B, G, R>
where
    B: OutputPin,
    G: OutputPin,
    R: OutputPin,
{
    /// Takes the pins and switches all LEDs off.
    pub fn new(blue: B, green: G, red: R) -> Result<Self, RenderError> {
        let mut pins = LedPins { blue, green, red };
        pins.blue.set_low().map_err(led_fault)?;
        pins.green.set_low().map_err(led_fault)?;
        pins.red.set_low().map_err(led_fault)?;
        Ok(LedIndicator {
            pins: Mutex::new(pins),
        })
    }

    pub fn into_pins(self) -> (B, G, R) {
        let pins = self.pins.into_inner().unwrap_or_else(PoisonError::into_inner);
        (pins.blue, pins.green, pins.red)
    }
}

impl<B, G, R> Renderer for LedIndicator<B, G, R>
where
    B: OutputPin + Send,
    G: OutputPin + Send,
    R: OutputPin + Send,
{
    fn name(&self) -> &str {
        "leds"
    }

    fn refresh(&self, snapshot: &Snapshot) -> Result<(), RenderError> {
        let status = snapshot.status();
        let mut pins = self.pins.lock().unwrap_or_else(PoisonError::into_inner);
        pins.blue
            .set_state(PinState::from(status == Status::Cold))
            .map_err(led_fault)?;
        pins.green
            .set_state(PinState::from(status == Status::Equal))
            .map_err(led_fault)?;
        pins.red
            .set_state(PinState::from(status == Status::Warm))
            .map_err(led_fault)?;
        Ok(())
    }
}
