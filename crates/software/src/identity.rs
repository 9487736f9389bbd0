//! Recognizes a supported control surface among the USB MIDI devices coming and going, and keeps the
//! [`ControlSurface`] consumer informed of whether one is attached.

use crate::configuration::{DisconnectPolicy, LAUNCHPAD_PRO, SurfaceIdentity};
use tinyvec::ArrayVec;
use wmidi::MidiMessage;

/// How many distinct surface identities can be recognized at once.
pub const MAX_KNOWN_SURFACES: usize = 4;

/// The identifying fields of a USB device descriptor, as supplied by the USB host stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceDescriptor {
    /// `idVendor`
    pub vendor_id: u16,
    /// `idProduct`
    pub product_id: u16,
    /// Address assigned on the bus during enumeration; tells apart two devices of the same make.
    pub address: u8,
}

impl SurfaceIdentity {
    /// Returns `true` if the descriptor was issued by a device of this make.
    pub fn matches(&self, descriptor: &DeviceDescriptor) -> bool {
        self.vendor_id == descriptor.vendor_id && self.product_id == descriptor.product_id
    }
}

/// A consumer of MIDI traffic for a device-specific control surface, e.g., one providing lighting feedback.
///
/// Its protocol with the surface is its own business; it is merely told when a surface arrives or leaves and handed
/// every message received while one is attached.
pub trait ControlSurface {
    /// A recognized surface was attached.
    fn connected(&mut self, descriptor: &DeviceDescriptor);

    /// The attached surface went away.
    fn disconnected(&mut self);

    /// A MIDI message arrived while the surface is attached.
    fn receive(&mut self, message: &MidiMessage<'_>);
}

/// Tracks whether a recognized control surface is attached.
#[derive(Clone, Debug, PartialEq)]
pub struct IdentityGate {
    known: ArrayVec<[SurfaceIdentity; MAX_KNOWN_SURFACES]>,
    policy: DisconnectPolicy,
    /// `Some` exactly while a surface is connected.
    attached: Option<DeviceDescriptor>,
}

impl Default for IdentityGate {
    fn default() -> Self {
        Self::new(&[LAUNCHPAD_PRO], DisconnectPolicy::default())
    }
}

impl IdentityGate {
    /// Constructs an [`IdentityGate`] recognizing the given surfaces.
    ///
    /// Identities beyond [`MAX_KNOWN_SURFACES`] are ignored.
    pub fn new(known: &[SurfaceIdentity], policy: DisconnectPolicy) -> Self {
        if known.len() > MAX_KNOWN_SURFACES {
            warn!(
                "Only the first {} of {} surface identities will be recognized",
                MAX_KNOWN_SURFACES,
                known.len()
            );
        }
        Self {
            known: known.iter().copied().take(MAX_KNOWN_SURFACES).collect(),
            policy,
            attached: None,
        }
    }

    /// Returns `true` while a recognized surface is attached.
    pub fn is_connected(&self) -> bool {
        self.attached.is_some()
    }

    /// The descriptor of the attached surface, if any.
    pub fn descriptor(&self) -> Option<&DeviceDescriptor> {
        self.attached.as_ref()
    }

    /// Getter.
    pub fn policy(&self) -> DisconnectPolicy {
        self.policy
    }

    /// Returns `true` if the descriptor belongs to a supported surface.
    pub fn recognizes(&self, descriptor: &DeviceDescriptor) -> bool {
        self.known.iter().any(|identity| identity.matches(descriptor))
    }

    /// Handles a device being attached. Returns `true` if it was a recognized surface.
    ///
    /// Unrecognized devices are left alone without complaint; any number of unrelated USB MIDI devices may be plugged in.
    /// A recognized surface attaching while another is connected takes over the session.
    pub fn on_connected(
        &mut self,
        descriptor: &DeviceDescriptor,
        surface: &mut impl ControlSurface,
    ) -> bool {
        if !self.recognizes(descriptor) {
            debug!(
                "Ignoring USB device {=u16:#x}:{=u16:#x}",
                descriptor.vendor_id,
                descriptor.product_id
            );
            return false;
        }

        info!(
            "Control surface {=u16:#x}:{=u16:#x} connected at address {}",
            descriptor.vendor_id,
            descriptor.product_id,
            descriptor.address
        );
        self.attached = Some(*descriptor);
        surface.connected(descriptor);
        true
    }

    /// Handles a device being detached. Returns `true` if this ended the session with the surface.
    ///
    /// Nothing happens unless a surface is connected. Whether the departing device must be the surface itself depends
    /// on the [`DisconnectPolicy`].
    pub fn on_disconnected(
        &mut self,
        descriptor: &DeviceDescriptor,
        surface: &mut impl ControlSurface,
    ) -> bool {
        let Some(attached) = self.attached else {
            return false;
        };

        if self.policy == DisconnectPolicy::TrackedDevice && attached != *descriptor {
            debug!(
                "Device at address {} left; control surface at address {} remains",
                descriptor.address,
                attached.address
            );
            return false;
        }

        info!("Control surface disconnected");
        self.attached = None;
        surface.disconnected();
        true
    }
}
