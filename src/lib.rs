//! Firmware core for a single-board thermostat panel
//!
//! A DS18B20 probe on a single-wire bus feeds a shared [`ThermostatState`]. Three
//! buttons (down, up, reset) and web control requests adjust it, renderers show it,
//! and a background service appends it to a JSON Lines log.
pub mod config;
pub mod control;
pub mod input;
pub mod logging;
pub mod models;
pub mod onewire;
pub mod render;
pub mod sensor;
pub mod state;
pub mod task;
pub mod utils;
pub mod web;

pub use config::{ConfigError, PanelConfig};
pub use control::{ButtonEdge, Command, Controller, Outcome};
pub use input::{Button, Edge, InputDebouncer, ResetGesture};
pub use models::{Resolution, SensorSample, Snapshot, Status, Temperature};
pub use state::ThermostatState;
