//! Errors raised while driving the analog outputs.
//!
//! Only hardware writes can fail. Everything the dispatcher decides not to act upon (an unrecognized USB device, a
//! stale NoteOff, a message on an unrouted MIDI channel) is a defined no-op rather than an error.

use core::fmt;

/// Identifies which of a channel's three outputs a failure relates to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Line {
    /// The GPIO line held high while a note sounds.
    Gate,
    /// The GPIO line pulsed at the onset of a note.
    Trigger,
    /// The DAC output carrying pitch.
    ControlVoltage,
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Gate => write!(f, "gate"),
            Line::Trigger => write!(f, "trigger"),
            Line::ControlVoltage => write!(f, "control voltage"),
        }
    }
}

/// A collaborator failed while a channel was being brought up.
///
/// This is fatal: a partially configured channel leaves hardware in an undefined state, so startup must be aborted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HardwareInitError {
    /// Ordinal of the channel being initialized.
    pub channel: u8,
    /// The output which could not be configured.
    pub line: Line,
}

impl fmt::Display for HardwareInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to initialize {} output of channel {}",
            self.line, self.channel
        )
    }
}

impl core::error::Error for HardwareInitError {}

/// A collaborator rejected a write after bring-up.
///
/// Channel state is recorded before the write is attempted, so the failure only means the hardware lags behind. There
/// is no retry; the next write to the same line brings it back in step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputError {
    /// Ordinal of the channel being driven.
    pub channel: u8,
    /// The output which rejected the write.
    pub line: Line,
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to drive {} output of channel {}",
            self.line, self.channel
        )
    }
}

impl core::error::Error for OutputError {}

impl From<OutputError> for HardwareInitError {
    fn from(err: OutputError) -> Self {
        Self {
            channel: err.channel,
            line: err.line,
        }
    }
}
