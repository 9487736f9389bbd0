//! Decoding of USB-MIDI Event Packets, the framing in which MIDI travels over a USB bulk endpoint.

use wmidi::MidiMessage;

/// Length of a USB-MIDI Event Packet: one header byte followed by up to three bytes of MIDI.
pub const EVENT_PACKET_LEN: usize = 4;

/// Given a buffer of one or more USB-MIDI Event Packets, returns an iterator over the MIDI messages therein.
///
/// Packets which don't contain a valid MIDI message (e.g., padding) are skipped, as is a trailing fragment shorter
/// than a full packet.
pub fn messages(data: &[u8]) -> impl Iterator<Item = MidiMessage<'_>> {
    data.chunks(EVENT_PACKET_LEN).filter_map(|potential_packet| {
        if potential_packet.len() != EVENT_PACKET_LEN {
            error!("USB-MIDI Event Packets must always be 32 bits long");
            None
        } else {
            // the zeroth byte is intentionally ignored because the Packet Header (cable number and code index) is not
            // of interest; the remaining three bytes contain the actual MIDI event
            MidiMessage::from_bytes(&potential_packet[1..]).ok()
        }
    })
}
