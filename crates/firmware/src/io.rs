//! Adapters binding the board's peripherals to the collaborator traits of the bridge.

use core::convert::Infallible;
use cv_bridge_lib::{
    channel::ControlVoltageOutput,
    identity::{ControlSurface, DeviceDescriptor},
};
use defmt::info;
use embassy_stm32::{
    dac::{DacCh1, DacCh2, Value},
    mode::Async,
    peripherals::DAC1,
};
use wmidi::MidiMessage;

/// One of the two outputs of the on-chip <abbr name="digital-to-analog converter">DAC</abbr>.
///
/// The channels are distinct types in the HAL; wrapping them lets every analog channel share one type.
pub enum DacOutput {
    /// Outputs on port A, pin 4.
    Ch1(DacCh1<'static, DAC1, Async>),
    /// Outputs on port A, pin 5.
    Ch2(DacCh2<'static, DAC1, Async>),
}

impl ControlVoltageOutput for DacOutput {
    type Error = Infallible;

    fn write(&mut self, code: u16) -> Result<(), Self::Error> {
        // 12 bits, right aligned, matching the codes produced by `PitchScale`
        let value = Value::Bit12Right(code);
        match self {
            Self::Ch1(dac) => dac.set(value),
            Self::Ch2(dac) => dac.set(value),
        }
        Ok(())
    }
}

/// Control surface consumer for this board.
///
/// The board's USB port runs in device mode, so a surface can only be announced by a host stack integration; until
/// then this consumer just reports what it is told.
#[derive(Default)]
pub struct SurfaceLog {
    forwarded: u32,
}

impl ControlSurface for SurfaceLog {
    fn connected(&mut self, descriptor: &DeviceDescriptor) {
        self.forwarded = 0;
        info!("Control surface attached: {}", descriptor);
    }

    fn disconnected(&mut self) {
        info!(
            "Control surface detached after {} forwarded messages",
            self.forwarded
        );
    }

    fn receive(&mut self, _message: &MidiMessage<'_>) {
        self.forwarded = self.forwarded.wrapping_add(1);
    }
}
