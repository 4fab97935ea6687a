//! Wire protocol of the live-view stream.
//!
//! Everything here is pure: no sockets, no threads, no shared state. The receiver
//! drives these pieces once per datagram:
//!
//! 1. [`RtpPacket::parse`] splits a datagram into header fields, the optional
//!    extension block and the JPEG fragment.
//! 2. [`TelemetryExtractor::parse`] decodes the extension block of a frame's first
//!    packet into partial [`Telemetry`](crate::Telemetry).
//! 3. [`RtpFrameAssembler::push`] accumulates fragments into complete frames.
//!
//! ```rust
//! use liveview::protocol::{RtpFrameAssembler, RtpPacket};
//!
//! let mut datagram = vec![0x80, 0x80, 0, 1, 0, 0, 0x0B, 0xB8, 0, 0, 0, 0];
//! datagram.extend_from_slice(&[0xFF, 0xD8, 0x42, 0xFF, 0xD9]);
//!
//! let packet = RtpPacket::parse(&datagram)?;
//! let mut assembler = RtpFrameAssembler::default();
//! let frames = assembler.push(packet.timestamp, packet.marker, packet.payload);
//!
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].timestamp(), 3000);
//! # Ok::<(), liveview::LiveViewError>(())
//! ```

pub mod assembler;
pub mod extension;
pub mod rtp;

pub use assembler::RtpFrameAssembler;
pub use extension::TelemetryExtractor;
pub use rtp::RtpPacket;
