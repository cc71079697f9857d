use std::sync::Arc;

use log::{error, info, warn};
use time::OffsetDateTime;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use thermostat_panel::logging::{choose_log_path, LogService};
use thermostat_panel::render::ConsolePanel;
use thermostat_panel::sensor::{Ds18b20, ProbeHandle, SimulatedProbe, StdDelay};
use thermostat_panel::utils::{format_datetime, MonotonicMillis};
use thermostat_panel::{
    Button, ButtonEdge, Controller, Edge, PanelConfig, Temperature, ThermostatState,
};

const EVENT_QUEUE_DEPTH: usize = 32;

type PanelController = Controller<Ds18b20<SimulatedProbe, StdDelay>>;

/// Read panel input from stdin, one action per line
///
/// `down`, `up`: press a button. `press`, `release`: reset button edges.
/// `web <target>`: a control request. `temp <celsius>`, `unplug`, `plug`: probe knobs.
async fn read_console(
    controller: Arc<PanelController>,
    events: mpsc::Sender<ButtonEdge>,
    probe: ProbeHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    let clock = MonotonicMillis::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            continue;
        };

        let edge = |button, edge| ButtonEdge {
            button,
            edge,
            at_ms: clock.now_ms(),
        };

        match word {
            "down" => events.send(edge(Button::Down, Edge::Falling)).await?,
            "up" => events.send(edge(Button::Up, Edge::Falling)).await?,
            "press" => events.send(edge(Button::Reset, Edge::Falling)).await?,
            "release" => events.send(edge(Button::Reset, Edge::Rising)).await?,
            "web" => match words.next() {
                Some(target) => match controller.handle_web(target).await {
                    Some(outcome) => info!("Web request {} -> {:?}", target, outcome),
                    None => warn!("Web request {} ignored", target),
                },
                None => warn!("Usage: web <target>"),
            },
            "temp" => match words.next().map(str::parse::<f64>) {
                Some(Ok(celsius)) if celsius.is_finite() => {
                    probe.set_temperature(Temperature::from_celsius(celsius));
                    info!("Probe set to {} C", celsius);
                }
                _ => warn!("Usage: temp <celsius>"),
            },
            "unplug" => probe.set_present(false),
            "plug" => probe.set_present(true),
            other => warn!("Unknown input '{}'", other),
        }
    }

    info!("Console input closed");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match PanelConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Thermostat panel starting at: {}",
        format_datetime(&OffsetDateTime::now_utc())
    );

    let state = Arc::new(ThermostatState::new(
        config.preferred,
        config.initial_actual,
        config.tolerance,
    ));

    let probe = SimulatedProbe::new(config.simulated_raw, config.resolution);
    let probe_handle = probe.handle();
    let sensor = Ds18b20::new(probe, StdDelay, config.resolution);

    let mut controller = Controller::new(Arc::clone(&state), sensor).with_renderer(ConsolePanel::new());

    // The panel keeps working without a log; only the long press loses its output
    let log_service = match choose_log_path(&config.log_roots, &config.log_file) {
        Ok(path) => {
            controller = controller.with_log_path(path.clone());
            Some(LogService::start(Arc::clone(&state), path, config.log_schedule))
        }
        Err(e) => {
            error!("Temperature log disabled: {}", e);
            None
        }
    };

    let controller = Arc::new(controller);
    controller.refresh();
    let poller = controller.spawn_poller(config.poll_interval);

    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let event_loop = tokio::spawn(Arc::clone(&controller).run_events(events_rx));

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    // Run until input ends or a shutdown signal arrives
    tokio::select! {
        result = read_console(Arc::clone(&controller), events_tx, probe_handle) => {
            if let Err(e) = result {
                error!("Console input failed: {}", e);
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    poller.stop();
    if let Some(service) = &log_service {
        service.stop();
    }
    event_loop.abort();

    info!(
        "Thermostat panel stopped at: {} (last reading {} C)",
        format_datetime(&OffsetDateTime::now_utc()),
        state.snapshot().last_sensor
    );

    Ok(())
}
