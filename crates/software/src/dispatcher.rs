//! Provides [`Dispatcher`], which receives every event from the USB host stack and turns it into updates for the
//! control surface consumer and the analog channels.
//!
//! Each analog channel voices one note at a time. The most recent NoteOn routed to a channel always wins it, whether
//! or not the previous note has been released, and keeps it until a NoteOff for that same note arrives:
//!
//! ```text
//! Idle        --NoteOn(n)-->           Sounding(n)
//! Sounding(n) --NoteOn(m)-->           Sounding(m)
//! Sounding(n) --NoteOff(n)-->          Idle
//! Sounding(n) --NoteOff(m), m != n-->  Sounding(n)
//! ```

use crate::{
    channel::{AnalogChannel, ControlVoltageOutput},
    configuration::{EnvelopeTrigger, RoutingTable, ZeroVelocity},
    error::OutputError,
    identity::{ControlSurface, DeviceDescriptor, IdentityGate},
};
use bitmask_enum::bitmask;
use embedded_hal::digital::OutputPin;
use wmidi::{Channel, MidiMessage, Note, U7, Velocity};

/// Operations performed while dispatching a message.
#[bitmask(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    /// The message was handed to the control surface consumer.
    Forwarded,
    /// A channel's note was set.
    NoteChange,
    /// A channel's gate was opened or closed.
    GateChange,
    /// A channel's trigger fired and must be released once the pulse has lasted long enough.
    Trigger,
}

/// The outcome of dispatching one message.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dispatch {
    /// Ordinal of the analog channel the message was routed to, if any.
    pub channel: Option<usize>,
    /// What was done.
    pub operation: Operation,
}

impl Default for Dispatch {
    fn default() -> Self {
        Self {
            channel: None,
            operation: Operation::none(),
        }
    }
}

/// The three entry points through which the USB host stack reports what it sees.
///
/// The host stack is expected to deliver events one at a time.
pub trait UsbMidiHandler {
    /// A USB MIDI device finished enumerating.
    fn on_device_connected(&mut self, descriptor: &DeviceDescriptor);

    /// A USB MIDI device went away.
    fn on_device_disconnected(&mut self, descriptor: &DeviceDescriptor);

    /// A MIDI message arrived from any attached device.
    fn on_message(&mut self, message: &MidiMessage<'_>) -> Result<Dispatch, OutputError>;
}

/// Routes USB MIDI events to a [`ControlSurface`] and a fixed table of [`AnalogChannel`]s.
pub struct Dispatcher<G, T, D, S, const N: usize> {
    channels: [AnalogChannel<G, T, D>; N],
    identity: IdentityGate,
    routing: RoutingTable,
    zero_velocity: ZeroVelocity,
    surface: S,
}

impl<G, T, D, S, const N: usize> Dispatcher<G, T, D, S, N>
where
    G: OutputPin,
    T: OutputPin,
    D: ControlVoltageOutput,
    S: ControlSurface,
{
    /// Constructs a [`Dispatcher`] which recognizes the Launchpad Pro and routes all notes to channel 0.
    pub fn new(channels: [AnalogChannel<G, T, D>; N], surface: S) -> Self {
        Self {
            channels,
            identity: IdentityGate::default(),
            routing: RoutingTable::default(),
            zero_velocity: ZeroVelocity::default(),
            surface,
        }
    }

    /// Replaces the table assigning MIDI channels to analog channels.
    pub fn with_routing(self, routing: RoutingTable) -> Self {
        Self { routing, ..self }
    }

    /// Changes how a NoteOn with a velocity of zero is interpreted.
    pub fn with_zero_velocity(self, zero_velocity: ZeroVelocity) -> Self {
        Self {
            zero_velocity,
            ..self
        }
    }

    /// Replaces the gate deciding which devices count as a control surface.
    pub fn with_identity_gate(self, identity: IdentityGate) -> Self {
        Self { identity, ..self }
    }

    /// Returns the analog channel with the given ordinal.
    pub fn channel(&self, ordinal: usize) -> Option<&AnalogChannel<G, T, D>> {
        self.channels.get(ordinal)
    }

    /// Getter.
    pub fn channels(&self) -> &[AnalogChannel<G, T, D>; N] {
        &self.channels
    }

    /// Getter.
    pub fn identity(&self) -> &IdentityGate {
        &self.identity
    }

    /// Getter.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Applies a new [`EnvelopeTrigger`] setting to every channel.
    pub fn set_envelope_trigger(&mut self, envelope_trigger: EnvelopeTrigger) {
        info!("Envelope trigger set to {}", envelope_trigger);
        self.channels
            .iter_mut()
            .for_each(|channel| channel.set_envelope_trigger(envelope_trigger));
    }

    /// Ends the trigger pulse of a channel. Unknown ordinals are ignored.
    pub fn release_trigger(&mut self, ordinal: usize) -> Result<(), OutputError> {
        match self.channels.get_mut(ordinal) {
            Some(channel) => channel.release_trigger(),
            None => Ok(()),
        }
    }

    fn route(&self, channel: Channel) -> Option<usize> {
        let ordinal = self.routing.route(channel)?;
        if ordinal < N {
            Some(ordinal)
        } else {
            warn!(
                "MIDI channel {} is routed to channel {}, which doesn't exist",
                channel.number(),
                ordinal
            );
            None
        }
    }

    fn note_on(
        &mut self,
        channel: Channel,
        note: Note,
        velocity: Velocity,
    ) -> Result<Dispatch, OutputError> {
        let Some(ordinal) = self.route(channel) else {
            return Ok(Dispatch::default());
        };

        // every step is attempted so that the channel's registers stay whole; the first failure is reported
        let out = &mut self.channels[ordinal];
        let was_open = out.gate_is_open();
        let note_result = out.set_note(note);
        let velocity_result = out.set_velocity(velocity);
        let gate_result = out.set_gate(true);
        note_result?;
        velocity_result?;
        let fired = gate_result?;

        let mut operation = Operation::NoteChange;
        if !was_open {
            operation |= Operation::GateChange;
        }
        if fired {
            operation |= Operation::Trigger;
        }
        Ok(Dispatch {
            channel: Some(ordinal),
            operation,
        })
    }

    fn note_off(&mut self, channel: Channel, note: Note) -> Result<Dispatch, OutputError> {
        let Some(ordinal) = self.route(channel) else {
            return Ok(Dispatch::default());
        };

        let out = &mut self.channels[ordinal];
        if out.note() != note {
            debug!(
                "Ignoring stale NoteOff for {}; channel {} is voicing {}",
                note.to_str(),
                ordinal,
                out.note().to_str()
            );
            return Ok(Dispatch {
                channel: Some(ordinal),
                operation: Operation::none(),
            });
        }

        let was_open = out.gate_is_open();
        let velocity_result = out.set_velocity(U7::from_u8_lossy(0));
        let gate_result = out.set_gate(false);
        velocity_result?;
        gate_result?;

        Ok(Dispatch {
            channel: Some(ordinal),
            operation: if was_open {
                Operation::GateChange
            } else {
                Operation::none()
            },
        })
    }
}

impl<G, T, D, S, const N: usize> UsbMidiHandler for Dispatcher<G, T, D, S, N>
where
    G: OutputPin,
    T: OutputPin,
    D: ControlVoltageOutput,
    S: ControlSurface,
{
    fn on_device_connected(&mut self, descriptor: &DeviceDescriptor) {
        self.identity.on_connected(descriptor, &mut self.surface);
    }

    fn on_device_disconnected(&mut self, descriptor: &DeviceDescriptor) {
        self.identity.on_disconnected(descriptor, &mut self.surface);
    }

    fn on_message(&mut self, message: &MidiMessage<'_>) -> Result<Dispatch, OutputError> {
        // the surface sees the message before any channel reacts to it
        let forwarded = if self.identity.is_connected() {
            self.surface.receive(message);
            Operation::Forwarded
        } else {
            Operation::none()
        };

        let mut dispatch = match *message {
            MidiMessage::NoteOn(channel, note, velocity)
                if u8::from(velocity) > 0 || self.zero_velocity == ZeroVelocity::NoteOn =>
            {
                info!(
                    "Received NoteOn: channel {}, note {}, velocity: {}",
                    channel.number(),
                    note.to_str(),
                    u8::from(velocity)
                );
                self.note_on(channel, note, velocity)?
            }
            MidiMessage::NoteOn(channel, note, velocity)
            | MidiMessage::NoteOff(channel, note, velocity) => {
                info!(
                    "Received NoteOff: channel {}, note {}, velocity: {}",
                    channel.number(),
                    note.to_str(),
                    u8::from(velocity)
                );
                self.note_off(channel, note)?
            }
            _ => {
                debug!("Ignoring MIDI message other than NoteOn/NoteOff");
                Dispatch::default()
            }
        };

        dispatch.operation |= forwarded;
        Ok(dispatch)
    }
}
