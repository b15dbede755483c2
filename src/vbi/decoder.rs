//! Teletext page-assembly state machine (ETSI EN 300 706 §9).
//!
//! Sliced lines are routed by magazine. A page header (packet Y=0)
//! completes whatever page its magazine had in flight; with the serial
//! flag C11 set it completes every magazine. Display rows accumulate in
//! a per-page cache so a retransmission without the erase bit C4 merges
//! with earlier content, as a cached rolling decoder does.

use std::collections::HashMap;

use log::debug;

use crate::constants::{PAGE_COLUMNS, PAGE_ROWS};
use crate::vbi::demux::Sliced;
use crate::vbi::hamming::{unham8_4, unpar7};
use crate::vbi::page::Page;

/// A page finished assembling. Carries the decimal page number
/// (100..899) and the 13-bit subcode widened to 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEvent {
    pub pgno: u16,
    pub subno: u16,
}

#[derive(Clone)]
struct RawPage {
    subno: u16,
    /// C12..C14 national option designation
    national: u8,
    rows: [[u8; PAGE_COLUMNS]; PAGE_ROWS],
}

impl RawPage {
    fn blank() -> Self {
        Self {
            subno: 0,
            national: 0,
            rows: [[0x20; PAGE_COLUMNS]; PAGE_ROWS],
        }
    }
}

struct OpenPage {
    pgno: u16,
    raw: RawPage,
}

pub struct Decoder {
    /// Page in flight per magazine 1..8 (index 0 = magazine 8)
    mags: [Option<OpenPage>; 8],
    /// Last completed revision of each page, by decimal page number
    store: HashMap<u16, RawPage>,
    last_pts: f64,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            mags: Default::default(),
            store: HashMap::new(),
            last_pts: 0.0,
        }
    }

    /// Push sliced lines through the state machine. Returns the pages
    /// that completed, in completion order.
    pub fn decode(&mut self, sliced: &[Sliced], pts: f64) -> Vec<PageEvent> {
        self.last_pts = pts;
        let mut events = Vec::new();
        for line in sliced {
            self.process_line(&line.data, &mut events);
        }
        for ev in &events {
            debug!(
                "page {} subpage {} complete at pts {:.3}s",
                ev.pgno, ev.subno, self.last_pts
            );
        }
        events
    }

    /// Format the stored revision of a page at 25 rows by 40 columns.
    /// `None` when the page is unknown or the stored subcode differs.
    pub fn fetch_page(&self, pgno: u16, subno: u16) -> Option<Page> {
        let raw = self.store.get(&pgno)?;
        if raw.subno != subno {
            return None;
        }
        Some(Page::from_raw(&raw.rows, raw.national, pgno))
    }

    fn process_line(&mut self, data: &[u8; 42], events: &mut Vec<PageEvent>) {
        // Magazine and packet address, two Hamming 8/4 bytes
        let (Some(n1), Some(n2)) = (unham8_4(data[0]), unham8_4(data[1])) else {
            return;
        };
        let mag = (n1 & 0x07) as usize;
        let row = ((n1 >> 3) | (n2 << 1)) as usize;

        match row {
            0 => self.process_header(mag, data, events),
            1..=24 => {
                if let Some(open) = &mut self.mags[mag] {
                    for (col, &b) in data[2..42].iter().enumerate() {
                        open.raw.rows[row][col] = unpar7(b).unwrap_or(0x20);
                    }
                }
            }
            // X/25..X/31: enhancement and service packets, not used at
            // this presentation level
            _ => {}
        }
    }

    fn process_header(&mut self, mag: usize, data: &[u8; 42], events: &mut Vec<PageEvent>) {
        let mut d = [0u8; 8];
        for (i, &b) in data[2..10].iter().enumerate() {
            match unham8_4(b) {
                Some(v) => d[i] = v,
                None => return,
            }
        }

        let units = d[0];
        let tens = d[1];
        let serial = d[7] & 0x01 != 0; // C11

        if serial {
            for m in 0..self.mags.len() {
                self.finalize(m, events);
            }
        } else {
            self.finalize(mag, events);
        }

        // Hex digits mark time-filling and other non-displayable pages;
        // they terminate assembly but never open a page themselves
        if units > 9 || tens > 9 {
            return;
        }

        let mag_display = if mag == 0 { 8 } else { mag as u16 };
        let pgno = mag_display * 100 + tens as u16 * 10 + units as u16;
        let subno = (d[2] as u16)
            | ((d[3] as u16 & 0x07) << 4)
            | ((d[4] as u16) << 8)
            | ((d[5] as u16 & 0x03) << 12);
        let erase = d[3] & 0x08 != 0; // C4
        let national = ((d[7] >> 1) & 0x01) << 2 | ((d[7] >> 2) & 0x01) << 1 | (d[7] >> 3) & 0x01;

        let mut raw = if erase {
            RawPage::blank()
        } else {
            self.store.get(&pgno).cloned().unwrap_or_else(RawPage::blank)
        };
        raw.subno = subno;
        raw.national = national;

        // 32 header characters display in columns 8..40; the first 8
        // columns are synthesised at fetch time
        raw.rows[0][..8].fill(0x20);
        for (i, &b) in data[10..42].iter().enumerate() {
            raw.rows[0][8 + i] = unpar7(b).unwrap_or(0x20);
        }

        self.mags[mag] = Some(OpenPage { pgno, raw });
    }

    fn finalize(&mut self, mag: usize, events: &mut Vec<PageEvent>) {
        if let Some(open) = self.mags[mag].take() {
            events.push(PageEvent {
                pgno: open.pgno,
                subno: open.raw.subno,
            });
            self.store.insert(open.pgno, open.raw);
        }
    }
}
