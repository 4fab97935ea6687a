//! Core data types flowing through the live-view pipeline.
//!
//! - [`Frame`] is a complete JPEG reassembled from packet fragments, keyed by its
//!   protocol timestamp. It is only ever constructed with both JPEG markers present.
//! - [`DecodedFrame`] is what the UI receives after the image library ran.
//! - [`Telemetry`] holds exposure settings with sticky-latest merge semantics.
//! - [`UpdateRate`] controls how often async consumers see telemetry snapshots.

mod frame;
mod telemetry;
mod update_rate;

pub use frame::{DecodedFrame, Frame, JPEG_EOI, JPEG_SOI};
pub use telemetry::{FocusMode, Orientation, Telemetry};
pub use update_rate::UpdateRate;
