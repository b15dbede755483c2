//! Constants for MPEG-TS processing and Teletext page assembly

/// MPEG-TS packet constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_SYNC_BYTE: u8 = 0x47;

/// PES packet constants
pub const PES_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];
/// 65536 bytes of payload plus up to 12 header bytes
pub const MAX_PES_SIZE: usize = 65548;

/// PTS constants
pub const PTS_CLOCK_HZ: u64 = 90_000; // 90 kHz

/// Teletext page geometry (ETSI EN 300 706, Level 1.5 presentation)
pub const PAGE_ROWS: usize = 25;
pub const PAGE_COLUMNS: usize = 40;

/// Upper bound for one JSON page datagram: 25x40 cells at 3 UTF-8 bytes
/// plus framing stays well below 4 KiB
pub const UDP_MAX_PAYLOAD: usize = 8192;

/// HTTP source limits
pub const HTTP_HEADER_MAX: usize = 4096;
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Supervisor retry pacing
pub const RECONNECT_DELAY_SECS: u64 = 5;
