//! Bit-level single-wire master built from busy-wait timing on one data pin
use std::time::Instant;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use super::{BusError, OneWire};

// Reset slot: master holds the line low, releases, samples the presence pulse, then
// waits out the rest of the slot.
const RESET_LOW_US: u64 = 480;
const PRESENCE_SAMPLE_US: u64 = 70;
const RESET_RECOVERY_US: u64 = 410;

// Write slots are 70 µs regardless of the bit value.
const WRITE_ONE_LOW_US: u64 = 6;
const WRITE_ZERO_LOW_US: u64 = 60;
const WRITE_SLOT_US: u64 = 70;

// Read slot: short low pulse, let the device drive the line, sample, pad to 70 µs.
const READ_LOW_US: u64 = 6;
const READ_SAMPLE_US: u64 = 9;
const READ_RECOVERY_US: u64 = 55;

/// The data line as seen by the bus master.
///
/// `drive_low` switches the pin to output and pulls the line low; `release` switches it
/// back to input so the pull-up resistor raises the line.
pub trait SignalPin {
    type Error: embedded_hal::digital::Error;

    fn drive_low(&mut self) -> Result<(), Self::Error>;
    fn release(&mut self) -> Result<(), Self::Error>;
    fn is_high(&mut self) -> Result<bool, Self::Error>;
}

/// Adapts an open-drain `embedded-hal` pin: a high output is the released line.
#[derive(Debug)]
pub struct OpenDrain<P>(P);

impl<P> OpenDrain<P>
where
    P: InputPin + OutputPin,
{
    pub fn new(mut pin: P) -> Result<Self, <P as ErrorType>::Error> {
        pin.set_high()?;
        Ok(OpenDrain(pin))
    }

    pub fn into_inner(self) -> P {
        self.0
    }
}

impl<P> SignalPin for OpenDrain<P>
where
    P: InputPin + OutputPin,
{
    type Error = <P as ErrorType>::Error;

    #[inline(always)]
    fn drive_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_low()
    }

    #[inline(always)]
    fn release(&mut self) -> Result<(), Self::Error> {
        self.0.set_high()
    }

    #[inline(always)]
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }
}

/// Monotonic microsecond time source used for slot timing.
pub trait Clock {
    fn now_us(&self) -> u64;
}

/// `Clock` backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

fn pin_fault<E: embedded_hal::digital::Error>(err: E) -> BusError {
    BusError::Pin(err.kind())
}

/// Single-wire bus master owning the data pin.
///
/// Every slot is timed against deadlines measured from the slot start and waited out
/// by spinning on the clock; nothing inside a slot sleeps or yields.
#[derive(Debug)]
pub struct SingleWireBus<P, C = MonotonicClock> {
    pin: P,
    clock: C,
}

impl<P: SignalPin> SingleWireBus<P, MonotonicClock> {
    pub fn new(pin: P) -> Result<Self, BusError> {
        Self::with_clock(pin, MonotonicClock::new())
    }
}

impl<P: SignalPin, C: Clock> SingleWireBus<P, C> {
    /// Takes the pin and releases the line.
    pub fn with_clock(mut pin: P, clock: C) -> Result<Self, BusError> {
        pin.release().map_err(pin_fault)?;
        Ok(SingleWireBus { pin, clock })
    }

    #[inline(always)]
    fn spin_until(&self, deadline: u64) {
        while self.clock.now_us() < deadline {
            std::hint::spin_loop();
        }
    }

    /// Reset pulse followed by presence detection.
    ///
    /// Returns `Ok(false)` when no device pulled the line low; the caller has to abort
    /// the transaction.
    pub fn reset(&mut self) -> Result<bool, BusError> {
        let start = self.clock.now_us();
        self.pin.drive_low().map_err(pin_fault)?;
        self.spin_until(start + RESET_LOW_US);

        self.pin.release().map_err(pin_fault)?;
        self.spin_until(start + RESET_LOW_US + PRESENCE_SAMPLE_US);

        let presence = !self.pin.is_high().map_err(pin_fault)?;

        self.spin_until(start + RESET_LOW_US + PRESENCE_SAMPLE_US + RESET_RECOVERY_US);
        Ok(presence)
    }

    pub fn write_bit(&mut self, bit: bool) -> Result<(), BusError> {
        let start = self.clock.now_us();
        self.pin.drive_low().map_err(pin_fault)?;

        let low_time = if bit { WRITE_ONE_LOW_US } else { WRITE_ZERO_LOW_US };
        self.spin_until(start + low_time);

        self.pin.release().map_err(pin_fault)?;
        self.spin_until(start + WRITE_SLOT_US);
        Ok(())
    }

    pub fn read_bit(&mut self) -> Result<bool, BusError> {
        let start = self.clock.now_us();
        self.pin.drive_low().map_err(pin_fault)?;
        self.spin_until(start + READ_LOW_US);

        self.pin.release().map_err(pin_fault)?;
        self.spin_until(start + READ_LOW_US + READ_SAMPLE_US);

        let bit = self.pin.is_high().map_err(pin_fault)?;

        self.spin_until(start + READ_LOW_US + READ_SAMPLE_US + READ_RECOVERY_US);
        Ok(bit)
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        for i in 0..8 {
            self.write_bit((byte >> i) & 0x01 != 0)?;
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8, BusError> {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    pub fn into_inner(self) -> (P, C) {
        (self.pin, self.clock)
    }
}

impl<P: SignalPin, C: Clock> OneWire for SingleWireBus<P, C> {
    fn reset(&mut self) -> Result<bool, BusError> {
        SingleWireBus::reset(self)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        SingleWireBus::write_byte(self, byte)
    }

    fn read_byte(&mut self) -> Result<u8, BusError> {
        SingleWireBus::read_byte(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::convert::Infallible;
    use std::rc::Rc;

    /// Advances one microsecond every time it is read.
    #[derive(Clone)]
    struct FakeClock(Rc<Cell<u64>>);

    impl Clock for FakeClock {
        fn now_us(&self) -> u64 {
            let next = self.0.get() + 1;
            self.0.set(next);
            next
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Line {
        Low(u64),
        Released(u64),
        Sampled(u64),
    }

    struct ScriptedPin {
        time: Rc<Cell<u64>>,
        trace: Rc<RefCell<Vec<Line>>>,
        levels: VecDeque<bool>,
    }

    impl SignalPin for ScriptedPin {
        type Error = Infallible;

        fn drive_low(&mut self) -> Result<(), Infallible> {
            self.trace.borrow_mut().push(Line::Low(self.time.get()));
            Ok(())
        }

        fn release(&mut self) -> Result<(), Infallible> {
            self.trace.borrow_mut().push(Line::Released(self.time.get()));
            Ok(())
        }

        fn is_high(&mut self) -> Result<bool, Infallible> {
            self.trace.borrow_mut().push(Line::Sampled(self.time.get()));
            Ok(self.levels.pop_front().unwrap_or(true))
        }
    }

    fn bus_with_levels(
        levels: &[bool],
    ) -> (
        SingleWireBus<ScriptedPin, FakeClock>,
        Rc<Cell<u64>>,
        Rc<RefCell<Vec<Line>>>,
    ) {
        let time = Rc::new(Cell::new(0));
        let trace = Rc::new(RefCell::new(Vec::new()));
        let pin = ScriptedPin {
            time: time.clone(),
            trace: trace.clone(),
            levels: levels.iter().copied().collect(),
        };
        let bus = SingleWireBus::with_clock(pin, FakeClock(time.clone())).unwrap();
        trace.borrow_mut().clear();
        (bus, time, trace)
    }

    #[test]
    fn reset_detects_presence_and_keeps_slot_timing() {
        let (mut bus, time, trace) = bus_with_levels(&[false]);

        assert!(bus.reset().unwrap());

        let trace = trace.borrow();
        let Line::Low(start) = trace[0] else { panic!("slot must start low") };
        assert_eq!(trace[1], Line::Released(start + 480));
        assert_eq!(trace[2], Line::Sampled(start + 550));
        assert_eq!(time.get(), start + 960);
    }

    #[test]
    fn reset_without_presence_reports_false() {
        let (mut bus, _, _) = bus_with_levels(&[true]);
        assert!(!bus.reset().unwrap());
    }

    #[test]
    fn write_slots_last_seventy_microseconds() {
        let (mut bus, time, trace) = bus_with_levels(&[]);

        bus.write_bit(true).unwrap();
        {
            let trace = trace.borrow();
            let Line::Low(start) = trace[0] else { panic!("slot must start low") };
            assert_eq!(trace[1], Line::Released(start + 6));
            assert_eq!(time.get(), start + 70);
        }

        trace.borrow_mut().clear();
        bus.write_bit(false).unwrap();
        let trace = trace.borrow();
        let Line::Low(start) = trace[0] else { panic!("slot must start low") };
        assert_eq!(trace[1], Line::Released(start + 60));
        assert_eq!(time.get(), start + 70);
    }

    #[test]
    fn read_slot_samples_after_fifteen_microseconds() {
        let (mut bus, time, trace) = bus_with_levels(&[false]);

        assert!(!bus.read_bit().unwrap());

        let trace = trace.borrow();
        let Line::Low(start) = trace[0] else { panic!("slot must start low") };
        assert_eq!(trace[1], Line::Released(start + 6));
        assert_eq!(trace[2], Line::Sampled(start + 15));
        assert_eq!(time.get(), start + 70);
    }

    #[test]
    fn bytes_travel_lsb_first() {
        // 0xA5 = 1010_0101, sent as 1,0,1,0,0,1,0,1
        let levels = [true, false, true, false, false, true, false, true];
        let (mut bus, _, _) = bus_with_levels(&levels);
        assert_eq!(bus.read_byte().unwrap(), 0xA5);

        let (mut bus, _, trace) = bus_with_levels(&[]);
        bus.write_byte(0xCC).unwrap();
        let low_times: Vec<u64> = trace
            .borrow()
            .chunks(2)
            .map(|slot| match slot {
                [Line::Low(start), Line::Released(end)] => end - start,
                other => panic!("unexpected slot {:?}", other),
            })
            .collect();
        // 0xCC = 1100_1100 -> 0,0,1,1,0,0,1,1
        assert_eq!(low_times, vec![60, 60, 6, 6, 60, 60, 6, 6]);
    }

    /// Open-drain pin on a line with one device that answers every reset.
    #[derive(Default)]
    struct PulledUpLine {
        driven_low: bool,
        broken_output: bool,
    }

    #[derive(Debug)]
    struct Shorted;

    impl embedded_hal::digital::Error for Shorted {
        fn kind(&self) -> embedded_hal::digital::ErrorKind {
            embedded_hal::digital::ErrorKind::Other
        }
    }

    impl ErrorType for PulledUpLine {
        type Error = Shorted;
    }

    impl OutputPin for PulledUpLine {
        fn set_low(&mut self) -> Result<(), Shorted> {
            if self.broken_output {
                return Err(Shorted);
            }
            self.driven_low = true;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Shorted> {
            self.driven_low = false;
            Ok(())
        }
    }

    impl InputPin for PulledUpLine {
        fn is_high(&mut self) -> Result<bool, Shorted> {
            // The device's presence pulse holds the line low after the reset pulse.
            Ok(false)
        }

        fn is_low(&mut self) -> Result<bool, Shorted> {
            Ok(true)
        }
    }

    #[test]
    fn open_drain_pin_on_the_real_clock() {
        let pin = OpenDrain::new(PulledUpLine::default()).unwrap();
        let mut bus = SingleWireBus::new(pin).unwrap();

        assert!(bus.reset().unwrap());

        let (pin, clock) = bus.into_inner();
        assert!(clock.now_us() >= 960);
        assert!(!pin.into_inner().driven_low);
    }

    #[test]
    fn pin_faults_surface_as_bus_errors() {
        let line = PulledUpLine {
            broken_output: true,
            ..PulledUpLine::default()
        };
        let mut bus = SingleWireBus::new(OpenDrain::new(line).unwrap()).unwrap();

        assert_eq!(
            bus.reset(),
            Err(BusError::Pin(embedded_hal::digital::ErrorKind::Other))
        );
        assert_eq!(
            OneWire::write_byte(&mut bus, 0xCC),
            Err(BusError::Pin(embedded_hal::digital::ErrorKind::Other))
        );
    }

    /// Line whose driver cannot let go of it.
    struct StuckLow;

    impl SignalPin for StuckLow {
        type Error = Shorted;

        fn drive_low(&mut self) -> Result<(), Shorted> {
            Ok(())
        }

        fn release(&mut self) -> Result<(), Shorted> {
            Err(Shorted)
        }

        fn is_high(&mut self) -> Result<bool, Shorted> {
            Ok(false)
        }
    }

    #[test]
    fn broken_line_is_reported_at_construction() {
        let result = SingleWireBus::new(StuckLow);
        assert!(matches!(
            result,
            Err(BusError::Pin(embedded_hal::digital::ErrorKind::Other))
        ));
    }
}
