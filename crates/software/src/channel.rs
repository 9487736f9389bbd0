//! Provides [`AnalogChannel`], the state of one physical output of the bridge and the mapping from that state to
//! the gate, trigger and control voltage lines it drives.
//!
//! A channel holds three independent registers: note, velocity and whether the gate is open. Writing any of them
//! drives the corresponding hardware immediately. No register implies another; in particular, setting the velocity to
//! zero does not close the gate. Callers wanting silence must close the gate themselves.

use crate::{
    configuration::{EnvelopeTrigger, PitchScale, VelocityScaling},
    error::{HardwareInitError, Line, OutputError},
};
use embedded_hal::digital::OutputPin;
use wmidi::{Note, U7, Velocity};

/// A trait for writing codes to one channel of a digital-to-analog converter.
pub trait ControlVoltageOutput {
    /// Raised when the converter rejects a write.
    type Error;

    /// Sets the output to `code`, expected to be within `0..=4095`.
    fn write(&mut self, code: u16) -> Result<(), Self::Error>;
}

/// The hardware bound to one channel at startup. Each line is owned by exactly one channel.
pub struct ChannelConfig<G, T, D> {
    /// Held high while a note sounds.
    pub gate: G,
    /// Raised at the onset of a note.
    pub trigger: T,
    /// Carries pitch as a control voltage.
    pub dac: D,
}

/// Settings which determine how a channel's registers translate into output.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChannelSettings {
    /// Maps notes to DAC codes.
    pub pitch_scale: PitchScale,
    /// Whether velocity attenuates the control voltage.
    pub velocity_scaling: VelocityScaling,
    /// When the trigger line fires.
    pub envelope_trigger: EnvelopeTrigger,
}

/// The logical view of a channel: silent, or sounding a particular note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Voice {
    /// The gate is closed.
    Idle,
    /// The gate is open and the channel is voicing the contained note.
    Sounding(Note),
}

/// One physical output of the bridge.
pub struct AnalogChannel<G, T, D> {
    ordinal: u8,
    gate_pin: G,
    trigger_pin: T,
    dac: D,
    settings: ChannelSettings,
    note: Note,
    velocity: Velocity,
    gate_open: bool,
    trigger_high: bool,
    /// The note that was current when the trigger last fired; `None` once the gate closes.
    triggered_note: Option<Note>,
}

impl<G, T, D> AnalogChannel<G, T, D>
where
    G: OutputPin,
    T: OutputPin,
    D: ControlVoltageOutput,
{
    /// Binds the lines in `config` to a fresh channel and drives each of them to its resting level.
    ///
    /// Fails if any line can't be driven, in which case the lines are dropped and the hardware is left in whatever
    /// state the failure left it; startup should not proceed.
    pub fn init(
        ordinal: u8,
        config: ChannelConfig<G, T, D>,
        settings: ChannelSettings,
    ) -> Result<Self, HardwareInitError> {
        let mut channel = Self {
            ordinal,
            gate_pin: config.gate,
            trigger_pin: config.trigger,
            dac: config.dac,
            settings,
            note: Note::CMinus1,
            velocity: U7::from_u8_lossy(0),
            gate_open: false,
            trigger_high: false,
            triggered_note: None,
        };

        channel.drive_gate()?;
        channel.drive_trigger(false)?;
        channel.drive_control_voltage()?;

        info!("Initialized channel {}", ordinal);
        Ok(channel)
    }

    /// Stores `note` and sends the corresponding code to the DAC.
    pub fn set_note(&mut self, note: Note) -> Result<(), OutputError> {
        self.note = note;
        self.drive_control_voltage()
    }

    /// Stores `velocity`. The DAC is only rewritten if velocity scaling is enabled.
    ///
    /// This does not touch the gate, even when `velocity` is zero.
    pub fn set_velocity(&mut self, velocity: Velocity) -> Result<(), OutputError> {
        self.velocity = velocity;
        match self.settings.velocity_scaling {
            VelocityScaling::Ignore => Ok(()),
            VelocityScaling::Scale => self.drive_control_voltage(),
        }
    }

    /// Opens or closes the gate.
    ///
    /// Opening may also raise the trigger line, per the [`EnvelopeTrigger`] setting. The trigger stays high until
    /// [`release_trigger()`](Self::release_trigger) is called or the gate closes. Returns `true` if the trigger fired.
    ///
    /// The trigger is handled even if the gate line rejects its write, so that the onset is not lost; the first
    /// failure is returned once both lines have been driven. Check [`trigger_is_high()`](Self::trigger_is_high) after
    /// an error to learn whether a pulse is in progress.
    pub fn set_gate(&mut self, open: bool) -> Result<bool, OutputError> {
        let was_open = self.gate_open;
        self.gate_open = open;
        let gate_result = self.drive_gate();

        if !open {
            self.triggered_note = None;
            let trigger_result = if self.trigger_high {
                self.drive_trigger(false)
            } else {
                Ok(())
            };
            return gate_result.and(trigger_result).map(|_| false);
        }

        let fire = match self.settings.envelope_trigger {
            EnvelopeTrigger::BreakEnd => !was_open,
            EnvelopeTrigger::NoteChange => !was_open || self.triggered_note != Some(self.note),
        };
        let trigger_result = if fire {
            self.triggered_note = Some(self.note);
            self.drive_trigger(true)
        } else {
            Ok(())
        };
        gate_result.and(trigger_result).map(|_| fire)
    }

    /// Ends a trigger pulse. Does nothing if the trigger is already low.
    pub fn release_trigger(&mut self) -> Result<(), OutputError> {
        if self.trigger_high {
            self.drive_trigger(false)
        } else {
            Ok(())
        }
    }

    /// Changes when the trigger fires. Takes effect at the next note.
    pub fn set_envelope_trigger(&mut self, envelope_trigger: EnvelopeTrigger) {
        self.settings.envelope_trigger = envelope_trigger;
    }

    /// The code the DAC should be outputting for the current note and velocity.
    pub fn dac_code(&self) -> u16 {
        let code = self.settings.pitch_scale.dac_code(self.note);
        self.settings.velocity_scaling.apply(code, self.velocity)
    }

    fn drive_control_voltage(&mut self) -> Result<(), OutputError> {
        let code = self.dac_code();
        debug!(
            "Sending {} to DAC of channel {} for note {}",
            code,
            self.ordinal,
            self.note.to_str()
        );
        self.dac.write(code).map_err(|_| OutputError {
            channel: self.ordinal,
            line: Line::ControlVoltage,
        })
    }

    fn drive_gate(&mut self) -> Result<(), OutputError> {
        let result = if self.gate_open {
            self.gate_pin.set_high()
        } else {
            self.gate_pin.set_low()
        };
        result.map_err(|_| OutputError {
            channel: self.ordinal,
            line: Line::Gate,
        })
    }

    fn drive_trigger(&mut self, high: bool) -> Result<(), OutputError> {
        self.trigger_high = high;
        let result = if high {
            self.trigger_pin.set_high()
        } else {
            self.trigger_pin.set_low()
        };
        result.map_err(|_| OutputError {
            channel: self.ordinal,
            line: Line::Trigger,
        })
    }
}

impl<G, T, D> AnalogChannel<G, T, D> {
    /// Position of this channel in the channel table.
    pub fn ordinal(&self) -> u8 {
        self.ordinal
    }

    /// Getter.
    pub fn note(&self) -> Note {
        self.note
    }

    /// Getter.
    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    /// Returns `true` while the gate is open.
    pub fn gate_is_open(&self) -> bool {
        self.gate_open
    }

    /// Returns `true` while a trigger pulse is in progress.
    pub fn trigger_is_high(&self) -> bool {
        self.trigger_high
    }

    /// Getter.
    pub fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    /// Returns the logical state of the channel.
    pub fn voice(&self) -> Voice {
        if self.gate_open {
            Voice::Sounding(self.note)
        } else {
            Voice::Idle
        }
    }

    /// Gives back the lines bound by [`init()`](Self::init).
    pub fn release(self) -> ChannelConfig<G, T, D> {
        ChannelConfig {
            gate: self.gate_pin,
            trigger: self.trigger_pin,
            dac: self.dac,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        configuration::DAC_FULL_SCALE,
        fakes::{FakeDac, FakePin, Rig},
    };

    type TestChannel<'a> = AnalogChannel<FakePin<'a>, FakePin<'a>, FakeDac<'a>>;

    fn channel(rig: &Rig) -> TestChannel<'_> {
        channel_with(rig, ChannelSettings::default())
    }

    fn channel_with(rig: &Rig, settings: ChannelSettings) -> TestChannel<'_> {
        let channel = AnalogChannel::init(0, rig.config(), settings).unwrap();
        rig.reset_counts();
        channel
    }

    fn velocity(v: u8) -> Velocity {
        U7::from_u8_lossy(v)
    }

    #[test]
    fn init_drives_lines_to_rest() {
        let rig = Rig::default();
        let channel = AnalogChannel::init(2, rig.config(), ChannelSettings::default()).unwrap();

        assert_eq!(2, channel.ordinal(), "Expected left but got right");
        assert_eq!(Voice::Idle, channel.voice(), "Expected left but got right");
        assert_eq!(1, rig.gate.get().writes, "Gate should be driven once");
        assert!(!rig.gate.get().high, "Gate should rest low");
        assert_eq!(1, rig.trigger.get().writes, "Trigger should be driven once");
        assert!(!rig.trigger.get().high, "Trigger should rest low");
        assert_eq!(Some(0), rig.dac.get().code, "Expected left but got right");
    }

    #[test]
    fn init_reports_failing_line() {
        let rig = Rig::default();
        let mut trigger = rig.trigger.get();
        trigger.broken = true;
        rig.trigger.set(trigger);

        let result = AnalogChannel::init(3, rig.config(), ChannelSettings::default());
        assert_eq!(
            Some(HardwareInitError {
                channel: 3,
                line: Line::Trigger
            }),
            result.err(),
            "Expected left but got right"
        );
    }

    #[test]
    fn set_note_writes_dac_once() {
        let rig = Rig::default();
        let mut channel = channel(&rig);
        let scale = PitchScale::default();

        for n in 0..=127_u8 {
            let note = Note::from_u8_lossy(n);
            let writes = rig.dac.get().writes;
            channel.set_note(note).unwrap();

            assert_eq!(note, channel.note(), "Expected left but got right");
            assert_eq!(writes + 1, rig.dac.get().writes, "Expected exactly one DAC write");
            assert_eq!(
                Some(scale.dac_code(note)),
                rig.dac.get().code,
                "Expected left but got right"
            );
        }
    }

    #[test]
    fn set_velocity_only_records_by_default() {
        let rig = Rig::default();
        let mut channel = channel(&rig);

        channel.set_velocity(velocity(90)).unwrap();
        assert_eq!(velocity(90), channel.velocity(), "Expected left but got right");
        assert_eq!(0, rig.dac.get().writes, "Velocity alone should not touch the DAC");
    }

    #[test]
    fn set_velocity_rewrites_dac_when_scaling() {
        let rig = Rig::default();
        let mut channel = channel_with(
            &rig,
            ChannelSettings {
                velocity_scaling: VelocityScaling::Scale,
                ..ChannelSettings::default()
            },
        );

        channel.set_note(Note::G9).unwrap();
        channel.set_velocity(velocity(127)).unwrap();
        assert_eq!(Some(DAC_FULL_SCALE), rig.dac.get().code, "Expected left but got right");

        channel.set_velocity(velocity(0)).unwrap();
        assert_eq!(Some(0), rig.dac.get().code, "Expected left but got right");
        assert_eq!(3, rig.dac.get().writes, "Expected left but got right");
    }

    #[test]
    fn zero_velocity_leaves_gate_open() {
        let rig = Rig::default();
        let mut channel = channel(&rig);

        channel.set_gate(true).unwrap();
        channel.set_velocity(velocity(0)).unwrap();
        assert!(channel.gate_is_open(), "Velocity should not close the gate");
        assert!(rig.gate.get().high);
    }

    #[test]
    fn opening_gate_fires_trigger() {
        let rig = Rig::default();
        let mut channel = channel(&rig);

        assert!(channel.set_gate(true).unwrap(), "Trigger should fire");
        assert!(rig.gate.get().high);
        assert!(rig.trigger.get().high);
        assert_eq!(1, rig.trigger.get().rising_edges, "Expected left but got right");
    }

    #[test]
    fn reopening_open_gate_does_not_refire() {
        let rig = Rig::default();
        let mut channel = channel(&rig);

        channel.set_gate(true).unwrap();
        channel.release_trigger().unwrap();
        channel.set_note(Note::E4).unwrap();

        assert!(!channel.set_gate(true).unwrap(), "Trigger should not fire");
        assert_eq!(1, rig.trigger.get().rising_edges, "Expected left but got right");
        assert!(!rig.trigger.get().high);
    }

    #[test]
    fn gate_cycle_fires_again() {
        let rig = Rig::default();
        let mut channel = channel(&rig);

        channel.set_gate(true).unwrap();
        channel.set_gate(false).unwrap();
        assert!(channel.set_gate(true).unwrap(), "Trigger should fire");
        assert_eq!(2, rig.trigger.get().rising_edges, "Expected left but got right");
    }

    #[test]
    fn note_change_refires_on_new_note_only() {
        let rig = Rig::default();
        let mut channel = channel_with(
            &rig,
            ChannelSettings {
                envelope_trigger: EnvelopeTrigger::NoteChange,
                ..ChannelSettings::default()
            },
        );

        channel.set_note(Note::C4).unwrap();
        assert!(channel.set_gate(true).unwrap(), "Onset should fire");
        channel.release_trigger().unwrap();

        assert!(!channel.set_gate(true).unwrap(), "Same note should not fire");

        channel.set_note(Note::E4).unwrap();
        assert!(channel.set_gate(true).unwrap(), "New note should fire");
        assert_eq!(2, rig.trigger.get().rising_edges, "Expected left but got right");
    }

    #[test]
    fn release_trigger_lowers_line() {
        let rig = Rig::default();
        let mut channel = channel(&rig);

        channel.set_gate(true).unwrap();
        channel.release_trigger().unwrap();
        assert!(!channel.trigger_is_high());
        assert!(!rig.trigger.get().high);
        assert!(channel.gate_is_open(), "Releasing the trigger should leave the gate alone");

        let writes = rig.trigger.get().writes;
        channel.release_trigger().unwrap();
        assert_eq!(writes, rig.trigger.get().writes, "Idle trigger should not be rewritten");
    }

    #[test]
    fn closing_gate_lowers_trigger() {
        let rig = Rig::default();
        let mut channel = channel(&rig);

        channel.set_gate(true).unwrap();
        assert!(!channel.set_gate(false).unwrap());
        assert!(!rig.gate.get().high);
        assert!(!rig.trigger.get().high);
        assert_eq!(Voice::Idle, channel.voice(), "Expected left but got right");
    }

    #[test]
    fn failed_write_still_records_state() {
        let rig = Rig::default();
        let mut channel = channel(&rig);
        let mut dac = rig.dac.get();
        dac.broken = true;
        rig.dac.set(dac);

        assert_eq!(
            Err(OutputError {
                channel: 0,
                line: Line::ControlVoltage
            }),
            channel.set_note(Note::A4),
            "Expected left but got right"
        );
        assert_eq!(Note::A4, channel.note(), "Expected left but got right");
    }

    #[test]
    fn failed_gate_write_still_fires_trigger() {
        let rig = Rig::default();
        let mut channel = channel(&rig);
        let mut gate = rig.gate.get();
        gate.broken = true;
        rig.gate.set(gate);

        assert_eq!(
            Err(OutputError {
                channel: 0,
                line: Line::Gate
            }),
            channel.set_gate(true),
            "Expected left but got right"
        );
        assert!(channel.gate_is_open(), "Gate state should be recorded");
        assert!(channel.trigger_is_high(), "Onset should not be lost");
        assert!(rig.trigger.get().high);

        // the line recovers; the same onset must not fire twice
        let mut gate = rig.gate.get();
        gate.broken = false;
        rig.gate.set(gate);
        channel.release_trigger().unwrap();
        assert!(!channel.set_gate(true).unwrap(), "Trigger should not fire");
        assert!(rig.gate.get().high);
        assert_eq!(1, rig.trigger.get().rising_edges, "Expected left but got right");
    }

    #[test]
    fn envelope_trigger_setting_is_applied() {
        let rig = Rig::default();
        let mut channel = channel(&rig);

        channel.set_envelope_trigger(EnvelopeTrigger::NoteChange);
        assert_eq!(
            EnvelopeTrigger::NoteChange,
            channel.settings().envelope_trigger,
            "Expected left but got right"
        );
    }

    #[test]
    fn release_returns_lines() {
        let rig = Rig::default();
        let mut channel = channel(&rig);
        channel.set_gate(true).unwrap();

        let mut config = channel.release();
        config.gate.set_low().unwrap();
        assert!(!rig.gate.get().high);
    }
}
