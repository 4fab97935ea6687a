//! Assembled and decoded frame types

use image::DynamicImage;

use crate::{LiveViewError, Result};

/// JPEG Start-Of-Image marker.
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// JPEG End-Of-Image marker.
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// A complete JPEG frame reassembled from packet fragments.
///
/// A `Frame` always starts with SOI and ends with EOI; the assembler only builds
/// one after both markers were seen, and [`Frame::try_new`] checks the same thing
/// for bytes from anywhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    timestamp: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap JPEG bytes, checking the SOI/EOI markers.
    pub fn try_new(timestamp: u32, data: Vec<u8>) -> Result<Self> {
        if !data.starts_with(&JPEG_SOI) {
            return Err(LiveViewError::InvalidFrame {
                details: format!("frame {timestamp} does not start with SOI"),
            });
        }
        if data.len() < 4 || !data.ends_with(&JPEG_EOI) {
            return Err(LiveViewError::InvalidFrame {
                details: format!("frame {timestamp} does not end with EOI"),
            });
        }
        Ok(Self { timestamp, data })
    }

    /// Caller guarantees both markers are present.
    pub(crate) fn from_verified(timestamp: u32, data: Vec<u8>) -> Self {
        debug_assert!(data.starts_with(&JPEG_SOI) && data.ends_with(&JPEG_EOI));
        Self { timestamp, data }
    }

    /// Protocol timestamp shared by every fragment of this frame.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// A frame after the image library decoded it.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub timestamp: u32,
    pub image: DynamicImage,
}

impl DecodedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
