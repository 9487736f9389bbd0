use embassy_time::Duration;
use num_derive::{FromPrimitive, ToPrimitive};

/// How long the trigger line stays high after a note onset, unless the gate closes first.
///
/// Long enough for the envelope generators of typical analog gear to register the edge, short enough not to overlap
/// with the next note of a fast passage.
pub const TRIGGER_PULSE_WIDTH: Duration = Duration::from_millis(5);

/// Determines when to fire the trigger line, which downstream hardware uses to restart its envelopes.
#[derive(Debug, Default, Copy, Clone, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnvelopeTrigger {
    /// The trigger fires each time a break ends, i.e., when the gate opens after having been closed. A note which steals
    /// the channel from a still-sounding note is played legato, within the same envelope contour.
    #[default]
    BreakEnd,
    /// The trigger fires each time the channel changes notes, regardless of articulation.
    NoteChange,
}
impl super::CycleConfig for EnvelopeTrigger {}
