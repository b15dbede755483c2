//! Blocking HTTP/1.1 source for the tuner's raw TS stream.
//!
//! The request is deliberately minimal: plain GET, `Connection: close`,
//! no chunked transfer, no compression, no redirects. The response body
//! is an open-ended MPEG-TS octet stream that only terminates when the
//! server closes the connection.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::constants::{CONNECT_TIMEOUT_SECS, HTTP_HEADER_MAX};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("connect failed: {0}")]
    ConnectRefused(#[source] io::Error),
    #[error("response head exceeds {HTTP_HEADER_MAX} bytes")]
    HeaderTooLarge,
    #[error("malformed HTTP response")]
    MalformedResponse,
    #[error("stream unavailable: HTTP status {0}")]
    StreamUnavailable(u16),
}

/// The response body as a readable byte stream. Bytes that arrived in
/// the same reads as the header are drained before the socket.
#[derive(Debug)]
pub struct HttpStream {
    stream: TcpStream,
    leftover: Vec<u8>,
    pos: usize,
}

impl Read for HttpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.leftover.len() {
            let n = (self.leftover.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.leftover[self.pos..self.pos + n]);
            self.pos += n;
            return Ok(n);
        }
        self.stream.read(buf)
    }
}

/// Open `http://{host}/auto/v{channel}` and hand back the body stream.
pub fn open(host: &str, channel: u32) -> Result<HttpStream, SourceError> {
    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no address resolved");
    let addrs = (host, 80)
        .to_socket_addrs()
        .map_err(SourceError::ConnectRefused)?;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, Duration::from_secs(CONNECT_TIMEOUT_SECS)) {
            Ok(stream) => return request_stream(stream, host, channel),
            Err(e) => last_err = e,
        }
    }
    Err(SourceError::ConnectRefused(last_err))
}

/// Send the GET and parse the response head off an established
/// connection. Split out from [`open`] so it can run against any peer.
pub fn request_stream(
    mut stream: TcpStream,
    host: &str,
    channel: u32,
) -> Result<HttpStream, SourceError> {
    let request = format!(
        "GET /auto/v{channel} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n"
    );
    stream
        .write_all(request.as_bytes())
        .map_err(SourceError::ConnectRefused)?;

    // Collect the response head, bounded, keeping whatever body bytes
    // came along in the final read
    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    let body_start = loop {
        if let Some(pos) = find_terminator(&head) {
            break pos + 4;
        }
        if head.len() > HTTP_HEADER_MAX {
            return Err(SourceError::HeaderTooLarge);
        }
        let n = stream.read(&mut chunk).map_err(|_| SourceError::MalformedResponse)?;
        if n == 0 {
            return Err(SourceError::MalformedResponse);
        }
        head.extend_from_slice(&chunk[..n]);
    };

    let status = parse_status_line(&head).ok_or(SourceError::MalformedResponse)?;
    if status != 200 {
        return Err(SourceError::StreamUnavailable(status));
    }

    Ok(HttpStream {
        stream,
        leftover: head.split_off(body_start),
        pos: 0,
    })
}

fn find_terminator(head: &[u8]) -> Option<usize> {
    head.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_status_line(head: &[u8]) -> Option<u16> {
    let line_end = head.windows(2).position(|w| w == b"\r\n")?;
    let line = std::str::from_utf8(&head[..line_end]).ok()?;
    let mut parts = line.split_whitespace();
    let version = parts.next()?;
    if !version.starts_with("HTTP/1.") {
        return None;
    }
    parts.next()?.parse().ok()
}
