//! Control loop: sensor polling, button events and renderer dispatch
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::input::{Button, Edge, InputDebouncer, ResetGesture};
use crate::logging::{dump_tail, DEFAULT_TAIL_BYTES};
use crate::models::{SensorSample, Temperature};
use crate::render::Renderer;
use crate::sensor::{SensorError, TemperatureSource};
use crate::state::ThermostatState;
use crate::task::PeriodicTask;
use crate::web::parse_control_target;

/// One button press step.
pub const ADJUST_STEP: Temperature = Temperature::from_tenths(5);

/// A pin-change interrupt, timestamped by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEdge {
    pub button: Button,
    pub edge: Edge,
    pub at_ms: u64,
}

/// What the user asked for once edges have been debounced and classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Down,
    Up,
    /// Re-read the sensor, falling back to the last good reading.
    Resync,
    /// Print the end of the log file; leaves the state alone.
    DumpLog,
}

impl Command {
    /// Commands that wait on the sensor.
    pub fn blocks(self) -> bool {
        matches!(self, Command::Resync)
    }
}

/// Result of one executed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Adjusted(Temperature),
    Resynced(Temperature),
    FellBack(Temperature),
    LogDumped,
    NoLogConfigured,
}

/// Owns the thermostat state, the sensor and the renderers.
///
/// Share it as `Arc<Controller<_>>`: button events, the poll timer and web requests
/// all call into the same instance.
pub struct Controller<S> {
    state: Arc<ThermostatState>,
    sensor: Arc<Mutex<S>>,
    debouncer: InputDebouncer,
    renderers: Vec<Box<dyn Renderer>>,
    log_path: Option<PathBuf>,
}

impl<S> Controller<S>
where
    S: TemperatureSource + Send + 'static,
{
    pub fn new(state: Arc<ThermostatState>, sensor: S) -> Self {
        Controller {
            state,
            sensor: Arc::new(Mutex::new(sensor)),
            debouncer: InputDebouncer::new(),
            renderers: Vec::new(),
            log_path: None,
        }
    }

    pub fn with_renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderers.push(Box::new(renderer));
        self
    }

    /// Log file whose tail a long press on reset dumps.
    pub fn with_log_path(mut self, path: PathBuf) -> Self {
        self.log_path = Some(path);
        self
    }

    pub fn state(&self) -> &Arc<ThermostatState> {
        &self.state
    }

    /// One sensor transaction on a blocking thread.
    ///
    /// The sensor lock is held for the whole transaction, so a poll and a reset press
    /// never interleave on the wire.
    pub async fn read_sensor(&self) -> Result<SensorSample, SensorError> {
        let sensor = Arc::clone(&self.sensor);
        let read = tokio::task::spawn_blocking(move || {
            let mut sensor = sensor.lock().unwrap_or_else(PoisonError::into_inner);
            sensor.read_once()
        });
        match read.await {
            Ok(result) => result,
            Err(e) => {
                error!("Sensor read task failed: {}", e);
                Err(SensorError::Interrupted)
            }
        }
    }

    /// Periodic poll: record the reading, or keep the old state on failure.
    pub async fn poll_sensor(&self) -> Result<SensorSample, SensorError> {
        let result = self.read_sensor().await;
        match &result {
            Ok(sample) => {
                if self.state.record_poll(sample.celsius) {
                    info!("Display initialized from sensor: {} C", sample.celsius);
                } else {
                    debug!("Sensor read: {} C (raw {:#06x})", sample.celsius, sample.raw);
                }
            }
            Err(e) => warn!("Sensor poll failed: {}", e),
        }
        self.refresh();
        result
    }

    /// Spawn the periodic sensor poll, starting immediately.
    pub fn spawn_poller(self: &Arc<Self>, period: Duration) -> PeriodicTask {
        let controller = Arc::clone(self);
        PeriodicTask::spawn("sensor poll", Duration::ZERO, period, move || {
            let controller = Arc::clone(&controller);
            async move {
                let _ = controller.poll_sensor().await;
            }
        })
    }

    /// Debounce and classify an edge. Never blocks.
    pub fn interpret(&self, edge: ButtonEdge) -> Option<Command> {
        match (edge.button, edge.edge) {
            (Button::Down, Edge::Falling) => self
                .debouncer
                .accept_edge(Button::Down, edge.at_ms)
                .then_some(Command::Down),
            (Button::Up, Edge::Falling) => self
                .debouncer
                .accept_edge(Button::Up, edge.at_ms)
                .then_some(Command::Up),
            (Button::Down | Button::Up, Edge::Rising) => None,
            (Button::Reset, edge_kind) => {
                match self.debouncer.reset_edge(edge_kind, edge.at_ms)? {
                    ResetGesture::ShortPress => Some(Command::Resync),
                    ResetGesture::LongPress => Some(Command::DumpLog),
                }
            }
        }
    }

    /// Run a command, then refresh the renderers if the state changed.
    pub async fn execute(&self, command: Command) -> Outcome {
        let outcome = match command {
            Command::Down => {
                let actual = self.state.adjust_actual(-ADJUST_STEP);
                info!("Actual temp decreased -> {} C", actual);
                Outcome::Adjusted(actual)
            }
            Command::Up => {
                let actual = self.state.adjust_actual(ADJUST_STEP);
                info!("Actual temp increased -> {} C", actual);
                Outcome::Adjusted(actual)
            }
            Command::Resync => match self.read_sensor().await {
                Ok(sample) => {
                    self.state.set_from_sensor(sample.celsius);
                    info!("Actual temp reset to sensor -> {} C", sample.celsius);
                    Outcome::Resynced(sample.celsius)
                }
                Err(e) => {
                    let actual = self.state.use_last_sensor_as_actual();
                    warn!("Sensor read failed ({}); reset to last reading {} C", e, actual);
                    Outcome::FellBack(actual)
                }
            },
            Command::DumpLog => {
                return match &self.log_path {
                    Some(path) => {
                        dump_tail(path, DEFAULT_TAIL_BYTES);
                        Outcome::LogDumped
                    }
                    None => {
                        warn!("Long press: no log file configured");
                        Outcome::NoLogConfigured
                    }
                };
            }
        };
        self.refresh();
        outcome
    }

    /// Debounce, classify and execute one edge.
    pub async fn handle_edge(&self, edge: ButtonEdge) -> Option<Outcome> {
        let command = self.interpret(edge)?;
        Some(self.execute(command).await)
    }

    /// Apply a web control request such as `/control?action=up`, without debouncing.
    pub async fn handle_web(&self, target: &str) -> Option<Outcome> {
        let command = parse_control_target(target)?;
        Some(self.execute(command).await)
    }

    /// Push the current snapshot to every renderer. Failures are logged and skipped.
    pub fn refresh(&self) {
        let snapshot = self.state.snapshot();
        for renderer in &self.renderers {
            if let Err(e) = renderer.refresh(&snapshot) {
                error!("Renderer {} failed: {}", renderer.name(), e);
            }
        }
    }

    /// Consume button edges until the channel closes.
    ///
    /// Adjustments run inline; sensor re-reads run as their own tasks so the
    /// conversion wait never holds up later edges.
    pub async fn run_events(self: Arc<Self>, mut events: mpsc::Receiver<ButtonEdge>) {
        while let Some(edge) = events.recv().await {
            let Some(command) = self.interpret(edge) else {
                debug!("Ignored {:?}", edge);
                continue;
            };
            if command.blocks() {
                let controller = Arc::clone(&self);
                tokio::spawn(async move {
                    controller.execute(command).await;
                });
            } else {
                self.execute(command).await;
            }
        }
        debug!("Button event channel closed");
    }
}
