use num_derive::{FromPrimitive, ToPrimitive};
use wmidi::Velocity;

/// Determines whether a note's velocity contributes to the control voltage sent to the DAC.
#[derive(Debug, Default, Copy, Clone, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VelocityScaling {
    /// The control voltage depends on pitch alone; velocity is merely recorded.
    #[default]
    Ignore,
    /// The control voltage is attenuated in proportion to velocity, full scale at 127 and zero at 0.
    Scale,
}
impl super::CycleConfig for VelocityScaling {}

impl VelocityScaling {
    /// Applies the scaling to a DAC code computed from pitch.
    pub fn apply(&self, code: u16, velocity: Velocity) -> u16 {
        match self {
            Self::Ignore => code,
            Self::Scale => {
                let scaled = u32::from(code) * u32::from(u8::from(velocity)) / 127;
                // velocity never exceeds 127, so neither does the ratio
                scaled as u16
            }
        }
    }
}
