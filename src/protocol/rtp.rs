//! Fixed packet header and extension block parsing
//!
//! Every datagram of the live-view stream starts with an RTP-style header. All
//! multi-byte fields are big-endian.
//!
//! ```text
//!  0               1               2               3
//! +---------------+---------------+---------------+---------------+
//! |V P X  CC      |M  PT          |        sequence number        |
//! +---------------+---------------+---------------+---------------+
//! |                           timestamp                           |
//! +---------------+---------------+---------------+---------------+
//! |                        source identifier                      |
//! +---------------+---------------+---------------+---------------+
//! |      profile (ignored)        |   extension length in words   |  only when X = 1
//! +---------------+---------------+---------------+---------------+
//! |                 extension fields (length * 4 bytes)           |
//! +---------------+---------------+---------------+---------------+
//! |                          JPEG fragment ...                    |
//! ```
//!
//! - `X` (byte 0, bit `0x10`): extension block present
//! - `M` (byte 1, bit `0x80`): last fragment of the frame
//! - the timestamp is the frame-boundary key; sequence and source are informational
//!
//! The extension block length includes its own 4-byte header, so a block with
//! `length = n` occupies `n * 4 + 4` bytes.

use tracing::trace;

use crate::{LiveViewError, Result};

/// Size of the fixed header.
pub const HEADER_LEN: usize = 12;

/// Size of the extension block header (profile + length).
pub const EXTENSION_HEADER_LEN: usize = 4;

const EXTENSION_FLAG: u8 = 0x10;
const MARKER_FLAG: u8 = 0x80;

/// A parsed datagram borrowing from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpPacket<'a> {
    pub marker: bool,
    pub sequence: u16,
    pub timestamp: u32,
    pub source: u32,
    /// Whole extension block including its 4-byte header.
    pub extension: Option<&'a [u8]>,
    /// JPEG fragment following the header and extension.
    pub payload: &'a [u8],
}

impl<'a> RtpPacket<'a> {
    /// Parse one datagram.
    ///
    /// Fails with [`LiveViewError::MalformedPacket`] when the datagram is shorter
    /// than the fixed header or its extension block claims more bytes than exist.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(LiveViewError::malformed(buf.len(), "shorter than the fixed header"));
        }

        let has_extension = buf[0] & EXTENSION_FLAG != 0;
        let marker = buf[1] & MARKER_FLAG != 0;
        let sequence = u16::from_be_bytes([buf[2], buf[3]]);
        let timestamp = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let source = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

        let mut payload_start = HEADER_LEN;
        let extension = if has_extension {
            let header_end = HEADER_LEN + EXTENSION_HEADER_LEN;
            if buf.len() < header_end {
                return Err(LiveViewError::malformed(buf.len(), "truncated extension header"));
            }
            let words = u16::from_be_bytes([buf[HEADER_LEN + 2], buf[HEADER_LEN + 3]]) as usize;
            let block_len = words * 4 + EXTENSION_HEADER_LEN;
            let block_end = HEADER_LEN + block_len;
            if block_end > buf.len() {
                return Err(LiveViewError::malformed(
                    buf.len(),
                    format!("extension of {block_len} bytes overruns the datagram"),
                ));
            }
            payload_start = block_end;
            Some(&buf[HEADER_LEN..block_end])
        } else {
            None
        };

        trace!(
            sequence,
            timestamp,
            marker,
            extension_len = ?extension.map(<[u8]>::len),
            payload = buf.len() - payload_start,
            "Parsed packet"
        );

        Ok(Self { marker, sequence, timestamp, source, extension, payload: &buf[payload_start..] })
    }
}
