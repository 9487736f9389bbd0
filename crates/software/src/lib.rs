//! This crate contains architecture-agnostic logic for a bridge which turns notes received from USB MIDI devices into
//! [CV/gate](https://en.wikipedia.org/wiki/CV/gate) signals: per channel, a gate line, a trigger line and a pitch
//! control voltage. When a supported control surface (a Launchpad-class grid controller) is among the attached devices,
//! MIDI traffic is additionally forwarded to a consumer specific to that surface.
//!
//! The USB host stack, the GPIO and DAC drivers and the surface consumer are collaborators reached through traits:
//! [`dispatcher::UsbMidiHandler`], [`embedded_hal::digital::OutputPin`], [`channel::ControlVoltageOutput`] and
//! [`identity::ControlSurface`] respectively.

#![deny(missing_docs)]
#![no_std]

// must come first so that its macros are visible to the modules below
mod fmt;

pub mod channel;

pub mod configuration;

pub mod dispatcher;

pub mod error;

pub mod identity;

pub mod usb_midi;

#[cfg(test)]
mod fakes;
