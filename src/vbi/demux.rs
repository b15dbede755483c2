//! EN 300 472 data-unit slicer: walks the EBU data units inside one PES
//! data field and yields raw 42-byte Teletext packets.

use log::trace;

/// Sliced-line batch ceiling per `cor` call.
pub const MAX_SLICED_LINES: usize = 64;

/// EBU Teletext non-subtitle data
const UNIT_TELETEXT: u8 = 0x02;
/// EBU Teletext subtitle data
const UNIT_SUBTITLE: u8 = 0x03;
/// Fixed data_unit_length for EBU Teletext: field/line byte, framing
/// code, 42 packet bytes
const UNIT_LEN_TELETEXT: u8 = 0x2C;
/// Framing code in transmission bit order
const FRAMING_CODE: u8 = 0xE4;

/// One sliced Teletext line: the 42 bytes after the framing code.
#[derive(Clone, Copy)]
pub struct Sliced {
    pub data: [u8; 42],
}

impl Default for Sliced {
    fn default() -> Self {
        Self { data: [0u8; 42] }
    }
}

pub struct DvbDemux;

impl DvbDemux {
    pub fn new() -> Self {
        Self
    }

    /// Slice data units from the head of `*buf` into `out`, consuming
    /// what was read. Returns the number of lines produced; 0 with an
    /// unchanged cursor means nothing more can be extracted.
    pub fn cor(&mut self, out: &mut [Sliced], buf: &mut &[u8]) -> usize {
        let mut produced = 0;

        while produced < out.len() {
            let Some((&unit_id, rest)) = buf.split_first() else {
                break;
            };
            let Some((&unit_len, rest)) = rest.split_first() else {
                // Lone trailing byte cannot form a unit
                *buf = &[];
                break;
            };
            if rest.len() < unit_len as usize {
                trace!("truncated data unit id {unit_id:#04x}, field abandoned");
                *buf = &[];
                break;
            }
            let (unit, rest) = rest.split_at(unit_len as usize);
            *buf = rest;

            match unit_id {
                UNIT_TELETEXT | UNIT_SUBTITLE
                    if unit_len == UNIT_LEN_TELETEXT && unit[1] == FRAMING_CODE =>
                {
                    let mut sliced = Sliced::default();
                    sliced.data.copy_from_slice(&unit[2..44]);
                    out[produced] = sliced;
                    produced += 1;
                }
                UNIT_TELETEXT | UNIT_SUBTITLE => {
                    trace!("data unit with bad length or framing code skipped");
                }
                // Stuffing (0xFF) and unknown unit ids: skipped by length
                _ => {}
            }
        }

        produced
    }
}
