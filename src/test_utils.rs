//! Synthetic stream builders for tests and benchmarks
//!
//! Builds datagrams in the camera's wire format, JPEG byte strings with valid
//! markers, and a control client that records what the session asked of it.

#![cfg(any(test, feature = "benchmark"))]

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;

use crate::control::CameraControl;
use crate::types::{JPEG_EOI, JPEG_SOI};
use crate::{LiveViewError, QualityProfile, Result};

/// SOI + `body` + EOI. Passes the frame marker checks but is not decodable.
pub fn fake_jpeg(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 4);
    out.extend_from_slice(&JPEG_SOI);
    out.extend_from_slice(body);
    out.extend_from_slice(&JPEG_EOI);
    out
}

/// A real, decodable JPEG with a gradient pattern.
pub fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 7) as u8, (y * 5) as u8, 128]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut out, ImageFormat::Jpeg)
        .expect("JPEG encoding into memory should not fail");
    out.into_inner()
}

/// Split `data` into fragments of at most `chunk` bytes.
pub fn split_into(data: &[u8], chunk: usize) -> Vec<Vec<u8>> {
    data.chunks(chunk.max(1)).map(<[u8]>::to_vec).collect()
}

/// Builder for one datagram.
#[derive(Debug, Clone, Default)]
pub struct PacketBuilder {
    timestamp: u32,
    sequence: u16,
    marker: bool,
    extension: Option<Vec<u8>>,
    payload: Vec<u8>,
}

impl PacketBuilder {
    pub fn new(timestamp: u32) -> Self {
        Self { timestamp, ..Default::default() }
    }

    pub fn sequence(mut self, sequence: u16) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn marker(mut self, marker: bool) -> Self {
        self.marker = marker;
        self
    }

    /// Attach a complete extension block, as built by [`ExtensionBuilder`].
    pub fn extension(mut self, block: &[u8]) -> Self {
        self.extension = Some(block.to_vec());
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let extension_len = self.extension.as_ref().map_or(0, Vec::len);
        let mut out = Vec::with_capacity(12 + extension_len + self.payload.len());

        // Version 2, dynamic payload type 96.
        out.push(0x80 | if self.extension.is_some() { 0x10 } else { 0 });
        out.push(96 | if self.marker { 0x80 } else { 0 });
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&[0, 0, 0, 0]);
        if let Some(block) = &self.extension {
            out.extend_from_slice(block);
        }
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Builder for an extension block carrying telemetry fields.
#[derive(Debug, Clone, Default)]
pub struct ExtensionBuilder {
    fields: Vec<u8>,
}

impl ExtensionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field; the payload is zero-padded to whole words.
    pub fn field(mut self, function_id: u16, payload: &[u8]) -> Self {
        let words = payload.len().div_ceil(4);
        self.fields.extend_from_slice(&function_id.to_be_bytes());
        self.fields.extend_from_slice(&(words as u16).to_be_bytes());
        self.fields.extend_from_slice(payload);
        self.fields.resize(self.fields.len() + words * 4 - payload.len(), 0);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let words = (self.fields.len() / 4) as u16;
        let mut block = Vec::with_capacity(4 + self.fields.len());
        block.extend_from_slice(&[0x00, 0x01]);
        block.extend_from_slice(&words.to_be_bytes());
        block.extend(self.fields);
        block
    }
}

/// Fragment `jpeg` into datagrams sharing `timestamp`, marker on the last one.
///
/// When given, `extension` is attached to every datagram like the camera does.
pub fn packetize(timestamp: u32, jpeg: &[u8], chunk: usize, extension: Option<&[u8]>) -> Vec<Vec<u8>> {
    let fragments = split_into(jpeg, chunk);
    let last = fragments.len().saturating_sub(1);
    fragments
        .iter()
        .enumerate()
        .map(|(i, fragment)| {
            let mut packet = PacketBuilder::new(timestamp)
                .sequence(i as u16)
                .marker(i == last)
                .payload(fragment);
            if let Some(block) = extension {
                packet = packet.extension(block);
            }
            packet.build()
        })
        .collect()
}

/// A call made to [`RecordingControl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCall {
    Start { port: u16, quality: QualityProfile },
    Stop,
}

/// Control client that records calls and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingControl {
    calls: Arc<Mutex<Vec<ControlCall>>>,
    fail_start: bool,
    fail_stop: bool,
}

impl RecordingControl {
    pub fn failing_start() -> Self {
        Self { fail_start: true, ..Default::default() }
    }

    pub fn failing_stop() -> Self {
        Self { fail_stop: true, ..Default::default() }
    }

    /// Shared call log, still readable after the control moved into a session.
    pub fn calls(&self) -> Arc<Mutex<Vec<ControlCall>>> {
        Arc::clone(&self.calls)
    }
}

impl CameraControl for RecordingControl {
    fn start_stream(&mut self, port: u16, quality: QualityProfile) -> Result<()> {
        self.calls.lock().push(ControlCall::Start { port, quality });
        if self.fail_start {
            return Err(LiveViewError::control_failed("start_stream", "camera not in recording mode"));
        }
        Ok(())
    }

    fn stop_stream(&mut self) -> Result<()> {
        self.calls.lock().push(ControlCall::Stop);
        if self.fail_stop {
            return Err(LiveViewError::control_failed("stop_stream", "camera unreachable"));
        }
        Ok(())
    }
}
