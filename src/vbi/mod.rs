//! Bridge between PES payloads and the Teletext slicer/decoder pair.
//!
//! Both halves are rebuilt from scratch on every (re)connect so no
//! half-assembled page survives into a new stream.

mod charset;
mod decoder;
mod demux;
mod hamming;
mod page;

pub use decoder::PageEvent;
pub use page::Page;

use crate::constants::PTS_CLOCK_HZ;
use decoder::Decoder;
use demux::{DvbDemux, Sliced, MAX_SLICED_LINES};

/// data_identifier range for EBU Teletext (EN 300 472)
const DATA_ID_EBU_MIN: u8 = 0x10;
const DATA_ID_EBU_MAX: u8 = 0x1F;

pub struct VbiBridge {
    demux: DvbDemux,
    decoder: Decoder,
}

impl VbiBridge {
    pub fn new() -> Self {
        Self {
            demux: DvbDemux::new(),
            decoder: Decoder::new(),
        }
    }

    /// Feed one PES data field (data_identifier + EBU data units).
    /// Returns the pages that completed while slicing it.
    pub fn feed(&mut self, data: &[u8], pts: Option<u64>) -> Vec<PageEvent> {
        let Some((&data_id, units)) = data.split_first() else {
            return Vec::new();
        };
        if !(DATA_ID_EBU_MIN..=DATA_ID_EBU_MAX).contains(&data_id) {
            return Vec::new();
        }

        let pts_seconds = pts.unwrap_or(0) as f64 / PTS_CLOCK_HZ as f64;
        let mut events = Vec::new();
        let mut cursor = units;
        let mut sliced = [Sliced::default(); MAX_SLICED_LINES];

        while !cursor.is_empty() {
            let before = cursor.len();
            let n = self.demux.cor(&mut sliced, &mut cursor);
            if n > 0 {
                events.extend(self.decoder.decode(&sliced[..n], pts_seconds));
            } else if cursor.len() == before {
                // No lines and no progress: stop instead of spinning
                break;
            }
        }
        events
    }

    /// Format the completed page behind an event.
    pub fn fetch(&self, ev: &PageEvent) -> Option<Page> {
        self.decoder.fetch_page(ev.pgno, ev.subno)
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::{header_packet, pes_field, row_packet};
    use super::*;

    #[test]
    fn feed_slices_and_assembles() {
        let mut bridge = VbiBridge::new();

        let field = pes_field(&[
            header_packet(1, 0, 0, 0, true, false, 0, "NEWS"),
            row_packet(1, 1, "TOP STORY"),
        ]);
        assert!(bridge.feed(&field, Some(90_000)).is_empty());

        let next = pes_field(&[header_packet(1, 9, 9, 0, true, false, 0, "")]);
        let events = bridge.feed(&next, Some(93_600));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].pgno, 100);

        let page = bridge.fetch(&events[0]).unwrap();
        assert_eq!(page.rows, 25);
        assert_eq!(page.columns, 40);
    }

    #[test]
    fn foreign_data_identifier_is_ignored() {
        let mut bridge = VbiBridge::new();
        let mut field = pes_field(&[header_packet(1, 0, 0, 0, true, false, 0, "")]);
        field[0] = 0x20; // outside the EBU range
        assert!(bridge.feed(&field, None).is_empty());
        assert!(bridge.feed(&[], None).is_empty());
    }

    #[test]
    fn garbage_tail_terminates_without_spinning() {
        let mut bridge = VbiBridge::new();
        let mut field = pes_field(&[header_packet(1, 0, 0, 0, true, false, 0, "")]);
        field.extend_from_slice(&[0x02, 0xFF, 0x00]); // truncated unit
        let events = bridge.feed(&field, None);
        assert!(events.is_empty());
    }
}
