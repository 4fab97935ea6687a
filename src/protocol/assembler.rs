//! JPEG frame reassembly from timestamp-keyed fragments
//!
//! All fragments of one frame share a timestamp. A frame is handed out either when
//! its marker-flagged last fragment arrives or, failing that, when the first
//! fragment of the next timestamp shows up. Either way it is only handed out if it
//! starts with SOI and ends with EOI; anything else is dropped and counted.

use std::mem;

use tracing::{debug, trace};

use crate::types::{Frame, JPEG_EOI, JPEG_SOI};

/// Default upper bound for one frame's bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Pure state machine turning fragments into complete [`Frame`]s.
#[derive(Debug)]
pub struct RtpFrameAssembler {
    current_timestamp: Option<u32>,
    buffer: Vec<u8>,
    header_seen: bool,
    max_frame_bytes: usize,
    frames_completed: u64,
    frames_discarded: u64,
}

impl Default for RtpFrameAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl RtpFrameAssembler {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            current_timestamp: None,
            buffer: Vec::new(),
            header_seen: false,
            max_frame_bytes,
            frames_completed: 0,
            frames_discarded: 0,
        }
    }

    /// Feed one fragment and collect the frames it completed.
    ///
    /// At most two frames come back: the previous frame, finished by this
    /// timestamp change, and this one if it fits in a single marker-flagged packet.
    pub fn push(&mut self, timestamp: u32, marker: bool, payload: &[u8]) -> Vec<Frame> {
        let mut completed = Vec::new();

        if self.current_timestamp != Some(timestamp) {
            if let Some(frame) = self.finish() {
                completed.push(frame);
            }
            self.current_timestamp = Some(timestamp);
        }

        if payload.starts_with(&JPEG_SOI) {
            self.header_seen = true;
        }

        // Fragments ahead of the first SOI belong to a frame we joined midway.
        if !self.header_seen {
            trace!(timestamp, len = payload.len(), "Dropping fragment before SOI");
            return completed;
        }

        if self.buffer.len() + payload.len() > self.max_frame_bytes {
            debug!(
                timestamp,
                size = self.buffer.len() + payload.len(),
                limit = self.max_frame_bytes,
                "Frame exceeds size limit, discarding"
            );
            self.discard();
            return completed;
        }
        self.buffer.extend_from_slice(payload);

        if marker && self.buffer.ends_with(&JPEG_EOI) {
            if let Some(frame) = self.finish() {
                completed.push(frame);
            }
        }

        completed
    }

    /// Close the frame in progress, handing it out if it is complete.
    fn finish(&mut self) -> Option<Frame> {
        if !self.header_seen {
            self.buffer.clear();
            return None;
        }
        if !self.buffer.ends_with(&JPEG_EOI) {
            debug!(
                timestamp = ?self.current_timestamp,
                len = self.buffer.len(),
                "Discarding frame without EOI"
            );
            self.discard();
            return None;
        }

        self.header_seen = false;
        self.frames_completed += 1;
        let timestamp = self.current_timestamp.unwrap_or_default();
        Some(Frame::from_verified(timestamp, mem::take(&mut self.buffer)))
    }

    fn discard(&mut self) {
        self.buffer.clear();
        self.header_seen = false;
        self.frames_discarded += 1;
    }

    /// Forget all in-progress state and counters.
    pub fn reset(&mut self) {
        self.current_timestamp = None;
        self.buffer.clear();
        self.header_seen = false;
        self.frames_completed = 0;
        self.frames_discarded = 0;
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    /// Frames that had their SOI but never a confirmed EOI.
    pub fn frames_discarded(&self) -> u64 {
        self.frames_discarded
    }

    /// Bytes buffered for the frame in progress.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fake_jpeg, split_into};
    use proptest::prelude::*;

    fn push_frame(assembler: &mut RtpFrameAssembler, timestamp: u32, jpeg: &[u8], chunk: usize) -> Vec<Frame> {
        let fragments = split_into(jpeg, chunk);
        let last = fragments.len() - 1;
        fragments
            .iter()
            .enumerate()
            .flat_map(|(i, fragment)| assembler.push(timestamp, i == last, fragment))
            .collect()
    }

    #[test]
    fn marker_completes_frame_immediately() {
        let mut assembler = RtpFrameAssembler::default();
        let jpeg = fake_jpeg(b"hello-world");

        let frames = push_frame(&mut assembler, 100, &jpeg, 4);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].timestamp(), 100);
        assert_eq!(frames[0].data(), jpeg.as_slice());
        assert_eq!(assembler.pending_bytes(), 0);
    }

    #[test]
    fn timestamp_change_completes_frame_without_marker() {
        let mut assembler = RtpFrameAssembler::default();
        let jpeg = fake_jpeg(b"no marker");

        for fragment in split_into(&jpeg, 3) {
            assert!(assembler.push(1, false, &fragment).is_empty());
        }
        let frames = assembler.push(2, false, &[0x00]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].timestamp(), 1);
        assert_eq!(assembler.frames_completed(), 1);
    }

    #[test]
    fn rollover_and_marker_can_complete_two_frames() {
        let mut assembler = RtpFrameAssembler::default();
        let first = fake_jpeg(b"first");
        let second = fake_jpeg(b"second");

        assert!(assembler.push(1, false, &first).is_empty());
        let frames = assembler.push(2, true, &second);
        let timestamps: Vec<_> = frames.iter().map(Frame::timestamp).collect();
        assert_eq!(timestamps, [1, 2]);
    }

    #[test]
    fn truncated_frame_is_discarded() {
        let mut assembler = RtpFrameAssembler::default();
        let jpeg = fake_jpeg(b"truncated frame");

        // Tail fragment with the EOI never arrives.
        assert!(assembler.push(1, false, &jpeg[..6]).is_empty());
        assert!(assembler.push(2, false, &[0x10, 0x20]).is_empty());
        assert_eq!(assembler.frames_discarded(), 1);
        assert_eq!(assembler.frames_completed(), 0);
    }

    #[test]
    fn fragments_before_soi_are_ignored() {
        let mut assembler = RtpFrameAssembler::default();
        let jpeg = fake_jpeg(b"body");

        assert!(assembler.push(5, false, b"stale tail").is_empty());
        let frames = push_frame(&mut assembler, 5, &jpeg, 64);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data(), jpeg.as_slice());
        // Joining midway is not a discarded frame.
        assert_eq!(assembler.frames_discarded(), 0);
    }

    #[test]
    fn fragments_after_marker_are_dropped() {
        let mut assembler = RtpFrameAssembler::default();
        let jpeg = fake_jpeg(b"done");

        assert_eq!(assembler.push(9, true, &jpeg).len(), 1);
        assert!(assembler.push(9, false, b"duplicate").is_empty());
        assert_eq!(assembler.pending_bytes(), 0);
        assert!(assembler.push(10, false, &[0]).is_empty());
        assert_eq!(assembler.frames_discarded(), 0);
    }

    #[test]
    fn marker_without_eoi_waits_for_rollover() {
        let mut assembler = RtpFrameAssembler::default();
        let jpeg = fake_jpeg(b"late eoi");
        let (head, tail) = jpeg.split_at(jpeg.len() - 2);

        assert!(assembler.push(3, true, head).is_empty());
        assert!(assembler.push(3, false, tail).is_empty());
        assert_eq!(assembler.push(4, false, &[]).len(), 1);
    }

    #[test]
    fn oversized_frame_is_discarded() {
        let mut assembler = RtpFrameAssembler::new(32);
        let jpeg = fake_jpeg(&[0xAB; 64]);

        assert!(push_frame(&mut assembler, 1, &jpeg, 16).is_empty());
        assert_eq!(assembler.frames_discarded(), 1);
        assert!(assembler.pending_bytes() <= 32);

        // The next frame that fits still comes through.
        let small = fake_jpeg(b"ok");
        assert_eq!(push_frame(&mut assembler, 2, &small, 16).len(), 1);
    }

    #[test]
    fn reset_clears_state() {
        let mut assembler = RtpFrameAssembler::default();
        assembler.push(1, false, &fake_jpeg(b"pending"));
        assembler.reset();

        assert_eq!(assembler.pending_bytes(), 0);
        assert!(assembler.push(2, false, &[0]).is_empty());
        assert_eq!(assembler.frames_completed(), 0);
    }

    proptest! {
        #[test]
        fn emits_exactly_n_frames_in_order(
            bodies in prop::collection::vec(prop::collection::vec(0u8..0xF0, 0..200), 1..20),
            chunk in 2usize..64,
        ) {
            let mut assembler = RtpFrameAssembler::default();
            let jpegs: Vec<Vec<u8>> = bodies.iter().map(|body| fake_jpeg(body)).collect();

            let mut frames = Vec::new();
            for (i, jpeg) in jpegs.iter().enumerate() {
                frames.extend(push_frame(&mut assembler, i as u32 * 3000, jpeg, chunk));
            }

            prop_assert_eq!(frames.len(), jpegs.len());
            for (i, (frame, jpeg)) in frames.iter().zip(&jpegs).enumerate() {
                prop_assert_eq!(frame.timestamp(), i as u32 * 3000);
                prop_assert_eq!(frame.data(), jpeg.as_slice());
            }
            prop_assert_eq!(assembler.frames_discarded(), 0);
        }

        #[test]
        fn never_emits_frames_without_markers(
            fragments in prop::collection::vec(
                (0u32..4, any::<bool>(), prop::collection::vec(any::<u8>(), 0..32)),
                0..64,
            )
        ) {
            let mut assembler = RtpFrameAssembler::new(256);
            for (timestamp, marker, payload) in fragments {
                for frame in assembler.push(timestamp, marker, &payload) {
                    prop_assert!(frame.data().starts_with(&JPEG_SOI));
                    prop_assert!(frame.data().ends_with(&JPEG_EOI));
                }
                prop_assert!(assembler.pending_bytes() <= 256);
            }
        }
    }
}
