//! Stand-ins for the GPIO and DAC collaborators.
//!
//! Each fake reports into a [`Cell`] owned by the test, so that what happened to the hardware can still be inspected
//! after the fake itself has been moved into a channel.

use crate::channel::ControlVoltageOutput;
use core::cell::Cell;
use embedded_hal::digital::{self, ErrorKind, OutputPin};

#[derive(Debug)]
pub struct FakeError;

impl digital::Error for FakeError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// What a [`FakePin`] has been asked to do so far.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PinLog {
    pub high: bool,
    pub writes: usize,
    pub rising_edges: usize,
    /// When set, every write fails.
    pub broken: bool,
}

pub struct FakePin<'a>(pub &'a Cell<PinLog>);

impl digital::ErrorType for FakePin<'_> {
    type Error = FakeError;
}

impl FakePin<'_> {
    fn drive(&mut self, high: bool) -> Result<(), FakeError> {
        let mut log = self.0.get();
        if log.broken {
            return Err(FakeError);
        }
        if high && !log.high {
            log.rising_edges += 1;
        }
        log.high = high;
        log.writes += 1;
        self.0.set(log);
        Ok(())
    }
}

impl OutputPin for FakePin<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true)
    }
}

/// What a [`FakeDac`] has been asked to do so far.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DacLog {
    pub code: Option<u16>,
    pub writes: usize,
    /// When set, every write fails.
    pub broken: bool,
}

pub struct FakeDac<'a>(pub &'a Cell<DacLog>);

impl ControlVoltageOutput for FakeDac<'_> {
    type Error = FakeError;

    fn write(&mut self, code: u16) -> Result<(), Self::Error> {
        let mut log = self.0.get();
        if log.broken {
            return Err(FakeError);
        }
        log.code = Some(code);
        log.writes += 1;
        self.0.set(log);
        Ok(())
    }
}

/// The logs for one channel's worth of fakes.
#[derive(Default)]
pub struct Rig {
    pub gate: Cell<PinLog>,
    pub trigger: Cell<PinLog>,
    pub dac: Cell<DacLog>,
}

impl Rig {
    pub fn config(&self) -> crate::channel::ChannelConfig<FakePin<'_>, FakePin<'_>, FakeDac<'_>> {
        crate::channel::ChannelConfig {
            gate: FakePin(&self.gate),
            trigger: FakePin(&self.trigger),
            dac: FakeDac(&self.dac),
        }
    }

    /// Forgets the writes made so far, e.g., those made during initialization.
    pub fn reset_counts(&self) {
        self.gate.set(PinLog {
            writes: 0,
            rising_edges: 0,
            ..self.gate.get()
        });
        self.trigger.set(PinLog {
            writes: 0,
            rising_edges: 0,
            ..self.trigger.get()
        });
        self.dac.set(DacLog {
            writes: 0,
            ..self.dac.get()
        });
    }
}
