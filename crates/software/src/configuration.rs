//! This module contains both user-configurable settings (implemented as enums) and the static description of the
//! hardware the bridge drives, plus traits to make them easier to work with in code.

mod envelope_trigger;
pub use envelope_trigger::*;

mod pitch_scale;
pub use pitch_scale::*;

mod routing;
pub use routing::*;

mod surface;
pub use surface::*;

mod velocity_scaling;
pub use velocity_scaling::*;

mod zero_velocity;
pub use zero_velocity::*;

use num_traits::{FromPrimitive, ToPrimitive};

/// A trait which allows infinite cycling of an enum's variants.
///
/// Useful for pushbutton user interfaces, allowing presses to advance from the current to the next variant,
/// cycling back to the beginning when all variants have been exhausted.
pub trait CycleConfig {
    /// Return the next variant, cycling back to the beginning as needed.
    fn cycle(self) -> Self
    where
        Self: FromPrimitive + ToPrimitive + Sized,
    {
        let index = self
            .to_u8()
            .expect("enum variants should be castable to u8");
        match <Self as FromPrimitive>::from_u8(index + 1) {
            Some(new_selection) => new_selection,
            None => FromPrimitive::from_u8(0).expect("enum should not be empty"),
        }
    }
}
