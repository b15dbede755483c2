//! Serialises one completed page into a single JSON datagram.

use log::warn;
use serde::Serialize;

use crate::constants::UDP_MAX_PAYLOAD;
use crate::vbi::Page;

/// Wire schema: one object per page, newline-terminated.
#[derive(Serialize)]
struct PageRecord<'a> {
    page: u16,
    subpage: u16,
    ts: i64,
    lines: &'a [String],
}

/// Attribute and mosaic cells have no textual content: anything below
/// 0x20 is a spacing attribute, 0x00AD is the soft hyphen, and the
/// decoder parks mosaic glyphs at 0xEE00 and above.
fn scrub(cp: u32) -> char {
    if cp < 0x20 || cp == 0x00AD || cp >= 0xEE00 {
        return ' ';
    }
    char::from_u32(cp).unwrap_or(' ')
}

/// Build the datagram for one page event. `None` only if the encoded
/// record would exceed the UDP payload bound; a page is dropped whole
/// rather than sent truncated.
pub fn datagram(page: &Page, pgno: u16, subno: u16, ts: i64) -> Option<Vec<u8>> {
    let mut lines = Vec::with_capacity(page.rows);
    for row in 0..page.rows {
        let mut line = String::with_capacity(page.columns);
        for col in 0..page.columns {
            line.push(scrub(page.cell(row, col)));
        }
        line.truncate(line.trim_end_matches(' ').len());
        lines.push(line);
    }

    let record = PageRecord {
        page: pgno,
        subpage: subno,
        ts,
        lines: &lines,
    };
    let mut buf = match serde_json::to_vec(&record) {
        Ok(buf) => buf,
        Err(e) => {
            warn!("page {pgno}: serialisation failed: {e}");
            return None;
        }
    };
    buf.push(b'\n');

    if buf.len() > UDP_MAX_PAYLOAD {
        warn!("page {pgno}: datagram {} bytes exceeds bound, dropped", buf.len());
        return None;
    }
    Some(buf)
}
