//! Frame decoding seam
//!
//! The decode thread hands each assembled [`Frame`] to a [`FrameDecoder`]. The
//! default [`JpegDecoder`] uses the `image` crate; tests and embedders can swap in
//! their own implementation through
//! [`LiveViewSession::with_decoder`](crate::LiveViewSession::with_decoder).

use image::ImageFormat;

use crate::types::{DecodedFrame, Frame};
use crate::{LiveViewError, Result};

/// Turns assembled JPEG bytes into an image.
pub trait FrameDecoder: Send + Sync + 'static {
    fn decode(&self, frame: &Frame) -> Result<DecodedFrame>;
}

/// Decodes baseline JPEG with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegDecoder;

impl FrameDecoder for JpegDecoder {
    fn decode(&self, frame: &Frame) -> Result<DecodedFrame> {
        let image = image::load_from_memory_with_format(frame.data(), ImageFormat::Jpeg)
            .map_err(|e| LiveViewError::decode_failed(frame.timestamp(), e.to_string()))?;
        Ok(DecodedFrame { timestamp: frame.timestamp(), image })
    }
}

impl<F> FrameDecoder for F
where
    F: Fn(&Frame) -> Result<DecodedFrame> + Send + Sync + 'static,
{
    fn decode(&self, frame: &Frame) -> Result<DecodedFrame> {
        self(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fake_jpeg, test_jpeg};

    #[test]
    fn decodes_real_jpeg() {
        let frame = Frame::try_new(11, test_jpeg(32, 24)).unwrap();
        let decoded = JpegDecoder.decode(&frame).unwrap();

        assert_eq!(decoded.timestamp, 11);
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn garbage_between_markers_is_a_decode_error() {
        let frame = Frame::try_new(12, fake_jpeg(b"not really a jpeg")).unwrap();
        match JpegDecoder.decode(&frame) {
            Err(LiveViewError::Decode { timestamp, .. }) => assert_eq!(timestamp, 12),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn closures_are_decoders() {
        let failing = |frame: &Frame| -> Result<DecodedFrame> {
            Err(LiveViewError::decode_failed(frame.timestamp(), "always fails"))
        };
        let frame = Frame::try_new(1, fake_jpeg(b"x")).unwrap();
        assert!(failing.decode(&frame).is_err());
    }
}
