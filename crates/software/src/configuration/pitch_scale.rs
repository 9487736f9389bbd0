use measurements::Voltage;
use wmidi::Note;

/// Highest code accepted by a 12-bit DAC.
pub const DAC_FULL_SCALE: u16 = 4095;

/// Describes how pitch maps onto the voltage range of a channel's DAC.
///
/// The lowest note sits at 0 V and each semitone above it adds a twelfth of `volts_per_octave`. The result is expressed
/// as a fraction of the DAC's `reference` voltage and scaled to 12 bits. Notes below the lowest note saturate at 0;
/// notes whose voltage exceeds the reference saturate at [`DAC_FULL_SCALE`]. Either way the mapping never decreases as
/// pitch rises.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PitchScale {
    lowest_note: Note,
    volts_per_octave: Voltage,
    reference: Voltage,
}

impl Default for PitchScale {
    /// Volt-per-octave from C2, against the 3.333 V reference of the on-chip DAC.
    fn default() -> Self {
        Self::new(
            Note::C2,
            Voltage::from_volts(1.0),
            Voltage::from_volts(10.0 / 3.0),
        )
    }
}

impl PitchScale {
    /// Constructs a [`PitchScale`].
    pub fn new(lowest_note: Note, volts_per_octave: Voltage, reference: Voltage) -> Self {
        Self {
            lowest_note,
            volts_per_octave,
            reference,
        }
    }

    fn voltage_per_half_step(&self) -> Voltage {
        self.volts_per_octave / 12.0
    }

    /// Returns the [`Voltage`] required to play a given [`Note`].
    pub fn voltage(&self, note: Note) -> Voltage {
        let nth_key = u8::from(note).saturating_sub(self.lowest_note as u8);
        nth_key as f64 * self.voltage_per_half_step()
    }

    /// Returns the DAC code which produces the voltage for a given [`Note`].
    pub fn dac_code(&self, note: Note) -> u16 {
        let ratio = self.voltage(note).as_volts() / self.reference.as_volts();
        // Casting to u16 serves as a quick and dirty rounding; the DAC resolution is high enough for it not to matter.
        (ratio * f64::from(DAC_FULL_SCALE)).clamp(0.0, f64::from(DAC_FULL_SCALE)) as u16
    }
}
