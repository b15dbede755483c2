//! TS packet header parsing and PID filtering.

use crate::constants::{TS_PACKET_SIZE, TS_SYNC_BYTE};

/// Parse one 188-byte packet and return `(payload_unit_start, payload)`
/// when it carries payload for `pid`. Everything else is dropped at
/// packet granularity: bad sync, transport errors, foreign PIDs,
/// adaptation-field-only packets and adaptation fields that swallow the
/// whole packet.
pub fn inspect(pkt: &[u8], pid: u16) -> Option<(bool, &[u8])> {
    if pkt.len() != TS_PACKET_SIZE || pkt[0] != TS_SYNC_BYTE {
        return None;
    }
    if pkt[1] & 0x80 != 0 {
        return None; // transport_error_indicator
    }

    let pkt_pid = ((pkt[1] & 0x1F) as u16) << 8 | pkt[2] as u16;
    if pkt_pid != pid {
        return None;
    }

    let pusi = pkt[1] & 0x40 != 0;
    let has_adaptation = pkt[3] & 0x20 != 0;
    let has_payload = pkt[3] & 0x10 != 0;

    if !has_payload {
        return None;
    }

    let payload_offset = if has_adaptation {
        5 + pkt[4] as usize
    } else {
        4
    };
    if payload_offset >= TS_PACKET_SIZE {
        return None;
    }

    Some((pusi, &pkt[payload_offset..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PID: u16 = 0x0199;

    fn packet(pid: u16, pusi: bool) -> [u8; TS_PACKET_SIZE] {
        let mut p = [0xAAu8; TS_PACKET_SIZE];
        p[0] = TS_SYNC_BYTE;
        p[1] = (pid >> 8) as u8 & 0x1F | if pusi { 0x40 } else { 0x00 };
        p[2] = pid as u8;
        p[3] = 0x10; // payload only, cc 0
        p
    }

    #[test]
    fn matching_pid_yields_payload() {
        let p = packet(PID, true);
        let (pusi, payload) = inspect(&p, PID).unwrap();
        assert!(pusi);
        assert_eq!(payload.len(), 184);
        assert_eq!(payload[0], 0xAA);
    }

    #[test]
    fn drops_bad_sync() {
        let mut p = packet(PID, false);
        p[0] = 0x48;
        assert!(inspect(&p, PID).is_none());
    }

    #[test]
    fn drops_transport_error() {
        let mut p = packet(PID, false);
        p[1] |= 0x80;
        assert!(inspect(&p, PID).is_none());
    }

    #[test]
    fn drops_foreign_pid() {
        let p = packet(0x0100, true);
        assert!(inspect(&p, PID).is_none());
    }

    #[test]
    fn drops_adaptation_only() {
        let mut p = packet(PID, false);
        p[3] = 0x20; // adaptation field, no payload
        assert!(inspect(&p, PID).is_none());
    }

    #[test]
    fn adaptation_field_shifts_payload() {
        let mut p = packet(PID, true);
        p[3] = 0x30; // adaptation + payload
        p[4] = 10; // adaptation_field_length
        p[15] = 0xBB;
        let (_, payload) = inspect(&p, PID).unwrap();
        assert_eq!(payload.len(), TS_PACKET_SIZE - 15);
        assert_eq!(payload[0], 0xBB);
    }

    #[test]
    fn drops_adaptation_overflow() {
        let mut p = packet(PID, false);
        p[3] = 0x30;
        p[4] = 183; // 5 + 183 = 188, no payload left
        assert!(inspect(&p, PID).is_none());
        p[4] = 200; // past the packet
        assert!(inspect(&p, PID).is_none());
    }
}
