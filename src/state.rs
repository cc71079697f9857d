//! Shared thermostat state: one lock around every field
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::{Snapshot, Status, Temperature};

#[derive(Debug)]
struct Inner {
    actual: Temperature,
    last_sensor: Temperature,
    synced: bool,
}

/// Preferred set-point, displayed value and last sensor reading.
///
/// Every method runs as a single critical section, so readers never see `actual` and
/// `last_sensor` from different updates. Concurrent writers are last-writer-wins.
#[derive(Debug)]
pub struct ThermostatState {
    preferred: Temperature,
    tolerance: Temperature,
    inner: Mutex<Inner>,
}

impl ThermostatState {
    /// Negative tolerances are treated as zero.
    pub fn new(preferred: Temperature, initial_actual: Temperature, tolerance: Temperature) -> Self {
        ThermostatState {
            preferred,
            tolerance: tolerance.max(Temperature::ZERO),
            inner: Mutex::new(Inner {
                actual: initial_actual,
                last_sensor: initial_actual,
                synced: false,
            }),
        }
    }

    // A panic elsewhere cannot leave the fields half-written, so a poisoned lock is
    // still safe to use.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn preferred(&self) -> Temperature {
        self.preferred
    }

    pub fn tolerance(&self) -> Temperature {
        self.tolerance
    }

    pub fn actual(&self) -> Temperature {
        self.lock().actual
    }

    /// Nudge the displayed value and round it to one decimal. Unbounded.
    pub fn adjust_actual(&self, delta: Temperature) -> Temperature {
        let mut inner = self.lock();
        inner.actual = (inner.actual + delta).round_to_tenth();
        inner.actual
    }

    /// A fresh reading replaces both the sensor value and the displayed value.
    pub fn set_from_sensor(&self, value: Temperature) {
        let mut inner = self.lock();
        inner.last_sensor = value;
        inner.actual = value;
        inner.synced = true;
    }

    /// Fall back to the last good reading when a live read fails.
    pub fn use_last_sensor_as_actual(&self) -> Temperature {
        let mut inner = self.lock();
        inner.actual = inner.last_sensor;
        inner.actual
    }

    /// Record a periodic reading.
    ///
    /// Only the first successful reading of the process also becomes the displayed
    /// value; later ones leave `actual` to the user. Returns true when that happened.
    pub fn record_poll(&self, value: Temperature) -> bool {
        let mut inner = self.lock();
        inner.last_sensor = value;
        if inner.synced {
            return false;
        }
        inner.actual = value;
        inner.synced = true;
        true
    }

    pub fn classify(&self) -> Status {
        Status::classify(self.lock().actual, self.preferred, self.tolerance)
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        Snapshot {
            preferred: self.preferred,
            actual: inner.actual,
            last_sensor: inner.last_sensor,
            tolerance: self.tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn state(preferred: i32, actual: i32, tolerance: i32) -> ThermostatState {
        ThermostatState::new(
            Temperature::from_tenths(preferred),
            Temperature::from_tenths(actual),
            Temperature::from_tenths(tolerance),
        )
    }

    #[test]
    fn adjustments_stay_on_tenths() {
        let state = state(210, 210, 5);
        state.set_from_sensor(Temperature::from_sixteenths(0x0191));

        let deltas = [-5, 5, 3, -7, 5, 5, -1, 9, -5, -5];
        for (i, delta) in deltas.iter().cycle().take(500).enumerate() {
            let actual = state.adjust_actual(Temperature::from_tenths(*delta));
            assert_eq!(actual.units() % 1000, 0, "drifted after {} steps", i + 1);
        }
    }

    #[test]
    fn adjustment_is_unbounded() {
        let state = state(210, 210, 5);
        for _ in 0..200 {
            state.adjust_actual(Temperature::from_tenths(5));
        }
        assert_eq!(state.actual(), Temperature::from_tenths(1210));
    }

    #[test]
    fn adjustment_holds_at_the_range_limits() {
        let state = ThermostatState::new(
            Temperature::from_tenths(210),
            Temperature::from_units(i32::MAX - 2_000),
            Temperature::from_tenths(5),
        );
        for _ in 0..4 {
            state.adjust_actual(Temperature::from_tenths(5));
        }
        assert_eq!(state.actual(), Temperature::from_tenths(2_147_483));
        assert_eq!(state.classify(), Status::Warm);
        assert_eq!(state.actual().to_string(), "214748.3");

        let state = ThermostatState::new(
            Temperature::from_tenths(210),
            Temperature::from_units(i32::MIN + 2_000),
            Temperature::from_tenths(5),
        );
        for _ in 0..4 {
            state.adjust_actual(-Temperature::from_tenths(5));
        }
        assert_eq!(state.actual(), Temperature::from_tenths(-2_147_483));
        assert_eq!(state.classify(), Status::Cold);
        assert_eq!(state.actual().to_string(), "-214748.3");
    }

    #[test]
    fn first_poll_initializes_display_only_once() {
        let state = state(210, 210, 5);

        assert!(state.record_poll(Temperature::from_tenths(195)));
        assert_eq!(state.actual(), Temperature::from_tenths(195));

        state.adjust_actual(Temperature::from_tenths(10));
        assert!(!state.record_poll(Temperature::from_tenths(190)));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.actual, Temperature::from_tenths(205));
        assert_eq!(snapshot.last_sensor, Temperature::from_tenths(190));
    }

    #[test]
    fn fallback_uses_last_good_reading() {
        let state = state(210, 210, 5);
        state.set_from_sensor(Temperature::from_tenths(209));
        state.adjust_actual(Temperature::from_tenths(-15));
        assert_eq!(state.use_last_sensor_as_actual(), Temperature::from_tenths(209));
    }

    #[test]
    fn snapshots_are_never_torn() {
        let state = Arc::new(state(210, 210, 5));

        let writer = {
            let state = state.clone();
            thread::spawn(move || {
                for tenths in 0..2000 {
                    state.set_from_sensor(Temperature::from_tenths(tenths));
                }
            })
        };

        for _ in 0..2000 {
            let snapshot = state.snapshot();
            assert_eq!(snapshot.actual, snapshot.last_sensor);
        }
        writer.join().unwrap();
    }
}
