/// Determines how a NoteOn carrying a velocity of zero is interpreted.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ZeroVelocity {
    /// Every NoteOn is a NoteOn. A zero velocity still steals the channel and opens the gate; only the velocity
    /// register reflects it. Suits sources which never use the shorthand below.
    #[default]
    NoteOn,
    /// Per MIDI 1.0, a NoteOn with a velocity of zero is shorthand for a NoteOff, which lets keyboards that rely on
    /// running status release notes.
    NoteOff,
}
