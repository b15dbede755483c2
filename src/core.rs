//! Supervisor: owns the whole pipeline, drives the reconnect loop and
//! observes the shutdown flag.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::constants::RECONNECT_DELAY_SECS;
use crate::daemon::Options;
use crate::framer::TsFramer;
use crate::pes::{self, PesAssembler};
use crate::report;
use crate::sink::UdpSink;
use crate::source;
use crate::ts;
use crate::vbi::VbiBridge;

/// Shutdown flag, written from the signal handler and read between
/// blocking reads. Relaxed is enough: the flag only ever goes false.
static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn signal_handler(_sig: i32) {
    RUNNING.store(false, Ordering::Relaxed);
}

#[derive(Default)]
struct StreamCounters {
    ts_packets: u64,
    pes_packets: u64,
    pages: u64,
}

/// Every stage of the TS to JSON pipeline as one owned value. All state
/// that must not survive a reconnect is reset or rebuilt in
/// [`Pipeline::reset`].
struct Pipeline {
    pid: u16,
    framer: TsFramer,
    pes: PesAssembler,
    vbi: VbiBridge,
    sink: UdpSink,
    counters: StreamCounters,
}

impl Pipeline {
    fn new(pid: u16, sink: UdpSink) -> Self {
        Self {
            pid,
            framer: TsFramer::new(),
            pes: PesAssembler::new(),
            vbi: VbiBridge::new(),
            sink,
            counters: StreamCounters::default(),
        }
    }

    /// Per-connection scrub: clear the carry and the PES accumulator,
    /// rebuild the Teletext demux and decoder so no page state crosses
    /// a reconnect.
    fn reset(&mut self) {
        self.framer.reset();
        self.pes.reset();
        self.vbi = VbiBridge::new();
        self.counters = StreamCounters::default();
    }

    /// Run one network chunk through framing, filtering, reassembly,
    /// slicing and page emission.
    fn feed(&mut self, chunk: &[u8]) {
        let Self {
            pid,
            framer,
            pes,
            vbi,
            sink,
            counters,
        } = self;

        framer.feed(chunk, |pkt| {
            let Some((pusi, payload)) = ts::inspect(pkt, *pid) else {
                return;
            };
            counters.ts_packets += 1;

            pes.push(pusi, payload, &mut |pes_bytes| {
                counters.pes_packets += 1;
                let Some(parsed) = pes::parse(pes_bytes) else {
                    return;
                };
                for ev in vbi.feed(parsed.data, parsed.pts) {
                    let Some(page) = vbi.fetch(&ev) else {
                        continue;
                    };
                    let ts_now = chrono::Utc::now().timestamp();
                    if let Some(datagram) = report::datagram(&page, ev.pgno, ev.subno, ts_now) {
                        sink.send(&datagram);
                        counters.pages += 1;
                    }
                }
            });
        });
    }

    /// Pump the stream until it ends or the shutdown flag clears.
    /// Returns a description of why the stream stopped.
    fn pump(&mut self, stream: &mut impl Read) -> String {
        let mut buf = vec![0u8; 65536];
        loop {
            if !RUNNING.load(Ordering::Relaxed) {
                return "shutdown requested".into();
            }
            match stream.read(&mut buf) {
                Ok(0) => return "closed by server".into(),
                Ok(n) => self.feed(&buf[..n]),
                Err(e) => return format!("read error: {e}"),
            }
        }
    }
}

pub fn run(opts: Options) -> anyhow::Result<()> {
    // signal() is async-signal-safe; the handler only stores an atomic
    unsafe {
        libc::signal(libc::SIGINT, signal_handler as *const () as libc::sighandler_t);
        libc::signal(libc::SIGTERM, signal_handler as *const () as libc::sighandler_t);
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }

    let sink = UdpSink::new(opts.port)?;
    let mut pipeline = Pipeline::new(opts.pid, sink);

    info!(
        "stream=http://{}/auto/v{} PID={} to udp://127.0.0.1:{}",
        opts.host, opts.channel, opts.pid, opts.port
    );

    while RUNNING.load(Ordering::Relaxed) {
        pipeline.reset();

        match source::open(&opts.host, opts.channel) {
            Ok(mut stream) => {
                let reason = pipeline.pump(&mut stream);
                info!(
                    "stream ended ({reason}): {} TS packets, {} PES, {} pages, {} overflow drops",
                    pipeline.counters.ts_packets,
                    pipeline.counters.pes_packets,
                    pipeline.counters.pages,
                    pipeline.pes.overflow_drops,
                );
            }
            Err(e) => warn!("{e}"),
        }

        if !RUNNING.load(Ordering::Relaxed) {
            break;
        }
        info!("retrying in {RECONNECT_DELAY_SECS}s");
        thread::sleep(Duration::from_secs(RECONNECT_DELAY_SECS));
    }

    info!("shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vbi::testutil::{header_packet, pes_field, pes_packet, row_packet, ts_packets};
    use std::net::UdpSocket;

    const PID: u16 = 409;

    fn receiver() -> (UdpSocket, u16) {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let port = sock.local_addr().unwrap().port();
        (sock, port)
    }

    fn recv_json(sock: &UdpSocket) -> serde_json::Value {
        let mut buf = [0u8; 8192];
        let n = sock.recv(&mut buf).unwrap();
        assert_eq!(buf[n - 1], b'\n');
        serde_json::from_slice(&buf[..n]).unwrap()
    }

    fn assert_no_datagram(sock: &UdpSocket) {
        sock.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
        let mut buf = [0u8; 8192];
        assert!(sock.recv(&mut buf).is_err(), "unexpected datagram");
        sock.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    }

    /// TS capture of one full page 100 broadcast plus the terminating
    /// header of the next page.
    fn page_100_capture() -> Vec<u8> {
        let page = pes_packet(&pes_field(&[
            header_packet(1, 0, 0, 0, true, false, 0, "CEEFAX  MON 12 AUG"),
            row_packet(1, 1, "HEADLINES AT TEN"),
            row_packet(1, 2, "WEATHER: RAIN LATER"),
        ]));
        let next = pes_packet(&pes_field(&[header_packet(
            1, 0, 1, 0, true, false, 0, "",
        )]));

        let mut capture = ts_packets(PID, &page);
        // Foreign PID traffic interleaved with the target stream
        capture.extend(ts_packets(0x100, &pes_packet(&pes_field(&[row_packet(
            2, 1, "OTHER SERVICE",
        )]))));
        capture.extend(ts_packets(PID, &next));
        capture
    }

    #[test]
    fn single_aligned_page_emits_one_datagram() {
        let (sock, port) = receiver();
        let mut pipeline = Pipeline::new(PID, UdpSink::new(port).unwrap());

        pipeline.feed(&page_100_capture());

        let v = recv_json(&sock);
        assert_eq!(v["page"], 100);
        assert_eq!(v["subpage"], 0);
        assert!(v["ts"].as_i64().unwrap() > 0);
        let lines = v["lines"].as_array().unwrap();
        assert_eq!(lines.len(), 25);
        assert!(lines[0].as_str().unwrap().starts_with("P100"));
        assert!(lines[0].as_str().unwrap().contains("CEEFAX"));
        assert_eq!(lines[1], "HEADLINES AT TEN");
        assert_eq!(lines[2], "WEATHER: RAIN LATER");
        assert!(!lines
            .iter()
            .any(|l| l.as_str().unwrap().contains("OTHER SERVICE")));

        assert_no_datagram(&sock);
        assert_eq!(pipeline.counters.pages, 1);
    }

    #[test]
    fn one_byte_delivery_matches_aligned_delivery() {
        let capture = page_100_capture();

        let (sock_a, port_a) = receiver();
        let mut aligned = Pipeline::new(PID, UdpSink::new(port_a).unwrap());
        aligned.feed(&capture);
        let mut expected = recv_json(&sock_a);

        let (sock_b, port_b) = receiver();
        let mut dripped = Pipeline::new(PID, UdpSink::new(port_b).unwrap());
        for b in &capture {
            dripped.feed(std::slice::from_ref(b));
        }
        let mut got = recv_json(&sock_b);

        // Wall-clock stamps may straddle a second boundary
        expected.as_object_mut().unwrap().remove("ts");
        got.as_object_mut().unwrap().remove("ts");
        assert_eq!(expected, got);
    }

    #[test]
    fn reconnect_scrubs_half_assembled_state() {
        let (sock, port) = receiver();
        let mut pipeline = Pipeline::new(PID, UdpSink::new(port).unwrap());

        // Half a page 100 broadcast, never terminated
        let half = pes_packet(&pes_field(&[
            header_packet(1, 0, 0, 0, true, false, 0, ""),
            row_packet(1, 1, "STALE CONTENT"),
        ]));
        pipeline.feed(&ts_packets(PID, &half));

        // Server drops; supervisor resets everything
        pipeline.reset();

        let full = pes_packet(&pes_field(&[
            header_packet(2, 0, 0, 0, true, false, 0, ""),
            row_packet(2, 1, "FRESH CONTENT"),
        ]));
        let next = pes_packet(&pes_field(&[header_packet(
            2, 0, 1, 0, true, false, 0, "",
        )]));
        pipeline.feed(&ts_packets(PID, &full));
        pipeline.feed(&ts_packets(PID, &next));

        let v = recv_json(&sock);
        assert_eq!(v["page"], 200);
        let lines = v["lines"].as_array().unwrap();
        assert_eq!(lines[1], "FRESH CONTENT");
        assert!(!lines
            .iter()
            .any(|l| l.as_str().unwrap().contains("STALE CONTENT")));
        assert_no_datagram(&sock);
    }

    #[test]
    fn accumulator_overflow_recovers_on_next_start() {
        let (sock, port) = receiver();
        let mut pipeline = Pipeline::new(PID, UdpSink::new(port).unwrap());

        // Unbounded PES (length field 0) that outgrows the accumulator
        let mut runaway = vec![0x00, 0x00, 0x01, 0xBD, 0x00, 0x00, 0x80, 0x00, 0x00];
        runaway.resize(66_000, 0xAA);
        pipeline.feed(&ts_packets(PID, &runaway));
        assert_eq!(pipeline.pes.overflow_drops, 1);
        assert_no_datagram(&sock);

        // Normal operation resumes with the next payload_unit_start
        pipeline.feed(&page_100_capture());
        let v = recv_json(&sock);
        assert_eq!(v["page"], 100);
    }

    #[test]
    fn quotes_survive_as_valid_json() {
        let (sock, port) = receiver();
        let mut pipeline = Pipeline::new(PID, UdpSink::new(port).unwrap());

        let page = pes_packet(&pes_field(&[
            header_packet(1, 0, 0, 0, true, false, 0, ""),
            row_packet(1, 1, "HE SAID \"GOAL\""),
        ]));
        let next = pes_packet(&pes_field(&[header_packet(
            1, 9, 9, 0, true, false, 0, "",
        )]));
        pipeline.feed(&ts_packets(PID, &page));
        pipeline.feed(&ts_packets(PID, &next));

        let v = recv_json(&sock);
        assert_eq!(v["lines"][1], "HE SAID \"GOAL\"");
    }
}
