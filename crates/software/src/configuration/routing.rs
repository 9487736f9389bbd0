use wmidi::Channel;

/// Number of channels addressable by a MIDI 1.0 port.
const MIDI_CHANNEL_CNT: usize = 16;

/// Static assignment of MIDI channels to physical analog channels.
///
/// Each MIDI channel maps to at most one analog channel, identified by its ordinal. Several MIDI channels may share an
/// analog channel, in which case notes from all of them compete for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoutingTable {
    routes: [Option<u8>; MIDI_CHANNEL_CNT],
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::single(0)
    }
}

impl RoutingTable {
    /// Sends every MIDI channel to the same analog channel.
    pub const fn single(ordinal: u8) -> Self {
        Self {
            routes: [Some(ordinal); MIDI_CHANNEL_CNT],
        }
    }

    /// Sends MIDI channel 1 to analog channel 0, MIDI channel 2 to analog channel 1, and so on for the first
    /// `channel_cnt` channels. Remaining MIDI channels are left unrouted.
    pub fn per_midi_channel(channel_cnt: u8) -> Self {
        let mut routes = [None; MIDI_CHANNEL_CNT];
        routes
            .iter_mut()
            .zip(0..channel_cnt)
            .for_each(|(route, ordinal)| *route = Some(ordinal));
        Self { routes }
    }

    /// Assigns (or, given `None`, unassigns) the analog channel for a MIDI channel.
    pub fn set(&mut self, channel: Channel, ordinal: Option<u8>) {
        self.routes[usize::from(channel.index())] = ordinal;
    }

    /// Returns the ordinal of the analog channel a MIDI channel is routed to, if any.
    pub fn route(&self, channel: Channel) -> Option<usize> {
        self.routes[usize::from(channel.index())].map(usize::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_routes_everything_to_first_channel() {
        let routing = RoutingTable::default();
        assert_eq!(Some(0), routing.route(Channel::Ch1), "Expected left but got right");
        assert_eq!(Some(0), routing.route(Channel::Ch16), "Expected left but got right");
    }

    #[test]
    fn per_midi_channel() {
        let routing = RoutingTable::per_midi_channel(2);
        assert_eq!(Some(0), routing.route(Channel::Ch1), "Expected left but got right");
        assert_eq!(Some(1), routing.route(Channel::Ch2), "Expected left but got right");
        assert_eq!(None, routing.route(Channel::Ch3), "Expected left but got right");
    }

    #[test]
    fn set_overrides_route() {
        let mut routing = RoutingTable::single(1);
        routing.set(Channel::Ch10, None);
        routing.set(Channel::Ch2, Some(3));
        assert_eq!(None, routing.route(Channel::Ch10), "Expected left but got right");
        assert_eq!(Some(3), routing.route(Channel::Ch2), "Expected left but got right");
        assert_eq!(Some(1), routing.route(Channel::Ch1), "Expected left but got right");
    }
}
