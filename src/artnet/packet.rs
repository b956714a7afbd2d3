use crate::timecode::{FrameRate, Timecode};

pub const ARTNET_PORT: u16 = 6454;
const ARTNET_ID: &[u8; 8] = b"Art-Net\0";
const OPCODE_TIMECODE: u16 = 0x9700;
const MIN_PROTOCOL_VERSION: u16 = 14;
pub const PACKET_LEN: usize = 19;

/// Parses an Art-Net Timecode (OpCode 0x9700) packet, returning the decoded
/// Timecode and rate on success. Rejects anything that doesn't match the
/// header shape or fails the field range check; logs-and-continues on
/// reserved-bit violations are the caller's job since parsing itself must
/// stay a pure function.
pub fn parse_packet(buf: &[u8]) -> Option<(Timecode, FrameRate)> {
    if buf.len() < PACKET_LEN {
        return None;
    }
    if &buf[0..8] != ARTNET_ID {
        return None;
    }
    let opcode = u16::from_le_bytes([buf[8], buf[9]]);
    if opcode != OPCODE_TIMECODE {
        return None;
    }
    let protocol_version = u16::from_be_bytes([buf[10], buf[11]]);
    if protocol_version < MIN_PROTOCOL_VERSION {
        return None;
    }

    let frames = buf[14];
    let seconds = buf[15];
    let minutes = buf[16];
    let hours = buf[17];
    let rate_code = buf[18] & 0x03;
    let fps = FrameRate::from_rate_code(rate_code)?;

    let tc = Timecode::new(hours, minutes, seconds, frames);
    if !tc.in_range(fps) {
        return None;
    }
    Some((tc, fps))
}

/// True iff reserved bits 2-7 of the type byte (index 18) are nonzero.
/// Packets with this set are still accepted; callers should log it.
pub fn has_reserved_bits_set(buf: &[u8]) -> bool {
    buf.len() > 18 && (buf[18] & !0x03) != 0
}

/// Builds a 19-byte Art-Net Timecode packet for `tc`/`fps`.
pub fn build_packet(tc: Timecode, fps: FrameRate) -> [u8; PACKET_LEN] {
    let mut pkt = [0u8; PACKET_LEN];
    pkt[0..8].copy_from_slice(ARTNET_ID);
    pkt[8..10].copy_from_slice(&OPCODE_TIMECODE.to_le_bytes());
    pkt[10..12].copy_from_slice(&MIN_PROTOCOL_VERSION.to_be_bytes());
    // bytes 12,13 (filler/StreamID) left zeroed
    pkt[14] = tc.frames;
    pkt[15] = tc.seconds;
    pkt[16] = tc.minutes;
    pkt[17] = tc.hours;
    pkt[18] = fps.rate_code();
    pkt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_build_and_parse() {
        let tc = Timecode::new(12, 34, 56, 10);
        let fps = FrameRate::Fps30;
        let pkt = build_packet(tc, fps);
        let (parsed_tc, parsed_fps) = parse_packet(&pkt).unwrap();
        assert_eq!(parsed_tc, tc);
        assert_eq!(parsed_fps, fps);
    }

    #[test]
    fn rejects_short_packet() {
        assert!(parse_packet(&[0u8; 10]).is_none());
    }

    #[test]
    fn rejects_wrong_id() {
        let mut pkt = build_packet(Timecode::zero(), FrameRate::Fps25);
        pkt[0] = b'X';
        assert!(parse_packet(&pkt).is_none());
    }

    #[test]
    fn rejects_low_protocol_version() {
        let mut pkt = build_packet(Timecode::zero(), FrameRate::Fps25);
        pkt[10..12].copy_from_slice(&13u16.to_be_bytes());
        assert!(parse_packet(&pkt).is_none());
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let mut pkt = build_packet(Timecode::zero(), FrameRate::Fps25);
        pkt[17] = 30; // hours out of range
        assert!(parse_packet(&pkt).is_none());
    }

    #[test]
    fn reserved_bits_flagged_but_not_rejected() {
        let mut pkt = build_packet(Timecode::zero(), FrameRate::Fps25);
        pkt[18] |= 0x80;
        assert!(has_reserved_bits_set(&pkt));
        assert!(parse_packet(&pkt).is_some());
    }
}
