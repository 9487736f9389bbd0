use num_derive::{FromPrimitive, ToPrimitive};

/// The (vendor ID, product ID) pair by which a supported control surface announces itself over USB.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SurfaceIdentity {
    /// USB vendor ID, `idVendor` in the device descriptor.
    pub vendor_id: u16,
    /// USB product ID, `idProduct` in the device descriptor.
    pub product_id: u16,
}

/// Novation (Focusrite) Launchpad Pro.
pub const LAUNCHPAD_PRO: SurfaceIdentity = SurfaceIdentity {
    vendor_id: 0x1235,
    product_id: 0x0051,
};

/// Determines which disconnect notifications end the session with an attached control surface.
///
/// Only one surface is tracked at a time, but other, unrecognized USB MIDI devices may come and go alongside it.
#[derive(Debug, Default, Copy, Clone, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisconnectPolicy {
    /// Any device disconnecting ends the session, whether or not it is the surface. Unplugging an unrelated device
    /// while the surface remains attached therefore stops forwarding to it until it reconnects.
    #[default]
    AnyDevice,
    /// Only the device whose connection started the session can end it.
    TrackedDevice,
}
impl super::CycleConfig for DisconnectPolicy {}
