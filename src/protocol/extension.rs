//! Telemetry decoding from the packet extension block
//!
//! The block body is a sequence of length-prefixed fields:
//!
//! ```text
//! | function id: u16 | word length: u16 | payload: word length * 4 bytes |
//! ```
//!
//! Canonical payload layouts (big-endian, offsets into the payload):
//!
//! | id     | field                 | layout                                        |
//! |--------|-----------------------|-----------------------------------------------|
//! | `0x04` | orientation           | byte 3, one of 1/3/6/8                        |
//! | `0x08` | shutter speed         | u32 numerator @0, u32 denominator @4          |
//! | `0x09` | aperture              | u32 F-number x 100 @4                         |
//! | `0x0A` | exposure compensation | i32 EV x 10 @4                                |
//! | `0x0C` | ISO                   | u32 value @0, u16 auto flag @4                |
//! | `0x10` | exposure warning      | u32 @0, non-zero when out of range            |
//! | `0x11` | focus mode            | u16 @0: 0 S-AF, 1 C-AF, 2 MF                  |
//!
//! Decoding never fails. A field whose claimed length runs past the block ends
//! parsing with whatever was decoded so far; a field too short for its layout, or
//! with an unknown id, is skipped.

use tracing::trace;

use crate::protocol::rtp::EXTENSION_HEADER_LEN;
use crate::types::{FocusMode, Orientation, Telemetry};

pub const FUNCTION_ORIENTATION: u16 = 0x04;
pub const FUNCTION_SHUTTER_SPEED: u16 = 0x08;
pub const FUNCTION_APERTURE: u16 = 0x09;
pub const FUNCTION_EXPOSURE_COMPENSATION: u16 = 0x0A;
pub const FUNCTION_ISO: u16 = 0x0C;
pub const FUNCTION_EXPOSURE_WARNING: u16 = 0x10;
pub const FUNCTION_FOCUS_MODE: u16 = 0x11;

/// ISO value the camera reports when sensitivity is below the calibrated range.
pub const ISO_LOW: u32 = 0xFFFE;

const FIELD_HEADER_LEN: usize = 4;

/// Decodes extension blocks into partial [`Telemetry`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryExtractor;

impl TelemetryExtractor {
    /// Decode a whole extension block, 4-byte block header included.
    pub fn parse(block: &[u8]) -> Telemetry {
        let mut telemetry = Telemetry::default();
        if block.len() < EXTENSION_HEADER_LEN {
            return telemetry;
        }

        let words = u16::from_be_bytes([block[2], block[3]]) as usize;
        let end = (EXTENSION_HEADER_LEN + words * 4).min(block.len());
        let body = &block[EXTENSION_HEADER_LEN..end];

        let mut pos = 0;
        while pos + FIELD_HEADER_LEN <= body.len() {
            let function_id = u16::from_be_bytes([body[pos], body[pos + 1]]);
            let len = u16::from_be_bytes([body[pos + 2], body[pos + 3]]) as usize * 4;
            pos += FIELD_HEADER_LEN;

            if pos + len > body.len() {
                trace!(function_id, len, remaining = body.len() - pos, "Extension field overruns block");
                break;
            }
            Self::decode_field(function_id, &body[pos..pos + len], &mut telemetry);
            pos += len;
        }

        telemetry
    }

    fn decode_field(function_id: u16, payload: &[u8], telemetry: &mut Telemetry) {
        match function_id {
            FUNCTION_ORIENTATION if payload.len() >= 4 => {
                telemetry.orientation = Orientation::from_code(payload[3]);
            }
            FUNCTION_SHUTTER_SPEED if payload.len() >= 8 => {
                telemetry.shutter_speed = format_shutter_speed(be_u32(payload, 0), be_u32(payload, 4));
            }
            FUNCTION_APERTURE if payload.len() >= 8 => {
                telemetry.aperture = Some(format_aperture(be_u32(payload, 4)));
            }
            FUNCTION_EXPOSURE_COMPENSATION if payload.len() >= 8 => {
                let value = be_u32(payload, 4) as i32;
                telemetry.exposure_compensation = Some(format_exposure_compensation(value));
            }
            FUNCTION_ISO if payload.len() >= 6 => {
                let auto = u16::from_be_bytes([payload[4], payload[5]]) != 0;
                telemetry.iso = Some(format_iso(be_u32(payload, 0), auto));
            }
            FUNCTION_EXPOSURE_WARNING if payload.len() >= 4 => {
                telemetry.exposure_warning = Some(be_u32(payload, 0) != 0);
            }
            FUNCTION_FOCUS_MODE if payload.len() >= 2 => {
                telemetry.focus_mode = FocusMode::from_code(u16::from_be_bytes([payload[0], payload[1]]));
                // Mode and status share the field; the status half is not decoded yet.
                telemetry.focus_status = Some("unknown".to_string());
            }
            _ => {
                trace!(function_id, len = payload.len(), "Skipping extension field");
            }
        }
    }
}

fn be_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

/// `"F2.8"` from the F-number scaled by 100; 0 means no lens data.
pub fn format_aperture(value: u32) -> String {
    if value == 0 { "F--".to_string() } else { format!("F{:.1}", value as f64 / 100.0) }
}

/// Exposure time as `"1/250"`, `"1/2.5"`, `"2\""` or `"1.3\""`.
///
/// Returns `None` when either part is zero.
pub fn format_shutter_speed(numerator: u32, denominator: u32) -> Option<String> {
    if numerator == 0 || denominator == 0 {
        return None;
    }
    let formatted = if numerator > denominator {
        if denominator == 1 {
            format!("{numerator}\"")
        } else {
            format!("{:.1}\"", numerator as f64 / denominator as f64)
        }
    } else if denominator % numerator == 0 {
        format!("1/{}", denominator / numerator)
    } else {
        format!("1/{:.1}", denominator as f64 / numerator as f64)
    };
    Some(formatted)
}

pub fn format_iso(value: u32, auto: bool) -> String {
    let prefix = if auto { "ISO-A" } else { "ISO" };
    match value {
        0 => "ISO --".to_string(),
        ISO_LOW => format!("{prefix} LOW"),
        value => format!("{prefix} {value}"),
    }
}

/// EV scaled by 10, shown with an explicit sign.
pub fn format_exposure_compensation(value: i32) -> String {
    if value == 0 { "±0.0".to_string() } else { format!("{:+.1}", value as f64 / 10.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ExtensionBuilder;
    use proptest::prelude::*;

    #[test]
    fn aperture_formats() {
        assert_eq!(format_aperture(280), "F2.8");
        assert_eq!(format_aperture(1100), "F11.0");
        assert_eq!(format_aperture(0), "F--");
    }

    #[test]
    fn shutter_speed_formats() {
        assert_eq!(format_shutter_speed(1, 60).as_deref(), Some("1/60"));
        assert_eq!(format_shutter_speed(10, 25).as_deref(), Some("1/2.5"));
        assert_eq!(format_shutter_speed(2, 1).as_deref(), Some("2\""));
        assert_eq!(format_shutter_speed(13, 10).as_deref(), Some("1.3\""));
        assert_eq!(format_shutter_speed(0, 60), None);
        assert_eq!(format_shutter_speed(1, 0), None);
    }

    #[test]
    fn iso_formats() {
        assert_eq!(format_iso(ISO_LOW, true), "ISO-A LOW");
        assert_eq!(format_iso(ISO_LOW, false), "ISO LOW");
        assert_eq!(format_iso(200, false), "ISO 200");
        assert_eq!(format_iso(3200, true), "ISO-A 3200");
        assert_eq!(format_iso(0, true), "ISO --");
    }

    #[test]
    fn exposure_compensation_formats() {
        assert_eq!(format_exposure_compensation(0), "±0.0");
        assert_eq!(format_exposure_compensation(-15), "-1.5");
        assert_eq!(format_exposure_compensation(7), "+0.7");
    }

    #[test]
    fn decodes_full_block() {
        let block = ExtensionBuilder::new()
            .field(FUNCTION_SHUTTER_SPEED, &[0, 0, 0, 1, 0, 0, 0, 125])
            .field(FUNCTION_APERTURE, &[0, 0, 0, 0, 0, 0, 0x02, 0x30])
            .field(FUNCTION_EXPOSURE_COMPENSATION, &(-7i32).to_be_bytes().repeat(2))
            .field(FUNCTION_ISO, &[0, 0, 0, 200, 0, 1, 0, 0])
            .field(FUNCTION_ORIENTATION, &[0, 0, 0, 6])
            .field(FUNCTION_EXPOSURE_WARNING, &[0, 0, 0, 1])
            .field(FUNCTION_FOCUS_MODE, &[0, 1, 0, 0])
            .build();
        let telemetry = TelemetryExtractor::parse(&block);

        assert_eq!(telemetry.shutter_speed.as_deref(), Some("1/125"));
        assert_eq!(telemetry.aperture.as_deref(), Some("F5.6"));
        assert_eq!(telemetry.exposure_compensation.as_deref(), Some("-0.7"));
        assert_eq!(telemetry.iso.as_deref(), Some("ISO-A 200"));
        assert_eq!(telemetry.orientation, Some(Orientation::Rotate90));
        assert_eq!(telemetry.exposure_warning, Some(true));
        assert_eq!(telemetry.focus_mode, Some(FocusMode::ContinuousAf));
        assert_eq!(telemetry.focus_status.as_deref(), Some("unknown"));
    }

    #[test]
    fn keeps_fields_decoded_before_an_overrun() {
        let mut block = ExtensionBuilder::new()
            .field(FUNCTION_APERTURE, &[0, 0, 0, 0, 0, 0, 0x01, 0x18])
            .field(FUNCTION_ISO, &[0, 0, 0, 100, 0, 0, 0, 0])
            .build();
        // Second field now claims 200 words.
        let iso_header = EXTENSION_HEADER_LEN + FIELD_HEADER_LEN + 8;
        block[iso_header + 2] = 0;
        block[iso_header + 3] = 200;

        let telemetry = TelemetryExtractor::parse(&block);
        assert_eq!(telemetry.aperture.as_deref(), Some("F2.8"));
        assert_eq!(telemetry.iso, None);
    }

    #[test]
    fn skips_short_and_unknown_fields() {
        let block = ExtensionBuilder::new()
            .field(0x7F, &[1, 2, 3, 4])
            // One word is too short for an aperture.
            .field(FUNCTION_APERTURE, &[0, 0, 1, 0x18])
            .field(FUNCTION_ORIENTATION, &[0, 0, 0, 2])
            .field(FUNCTION_SHUTTER_SPEED, &[0, 0, 0, 2, 0, 0, 0, 1])
            .build();
        let telemetry = TelemetryExtractor::parse(&block);

        assert_eq!(telemetry.aperture, None);
        assert_eq!(telemetry.orientation, None);
        assert_eq!(telemetry.shutter_speed.as_deref(), Some("2\""));
    }

    #[test]
    fn block_length_bounds_parsing() {
        let mut block = ExtensionBuilder::new()
            .field(FUNCTION_EXPOSURE_WARNING, &[0, 0, 0, 1])
            .build();
        // Bytes past the declared block length are not telemetry.
        block.extend_from_slice(&[0x00, 0x10, 0x00, 0x01, 0, 0, 0, 0]);
        let telemetry = TelemetryExtractor::parse(&block);
        assert_eq!(telemetry.exposure_warning, Some(true));
    }

    #[test]
    fn tiny_blocks_are_empty() {
        assert!(TelemetryExtractor::parse(&[]).is_empty());
        assert!(TelemetryExtractor::parse(&[0xBE, 0xDE]).is_empty());
        assert!(TelemetryExtractor::parse(&[0xBE, 0xDE, 0, 0]).is_empty());
    }

    proptest! {
        #[test]
        fn parse_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            let _ = TelemetryExtractor::parse(&bytes);
        }

        #[test]
        fn aperture_round_trips_through_fixed_point(value in 1u32..10_000) {
            let block = ExtensionBuilder::new()
                .field(FUNCTION_APERTURE, &[[0u8; 4], value.to_be_bytes()].concat())
                .build();
            let expected = format!("F{:.1}", value as f64 / 100.0);
            prop_assert_eq!(TelemetryExtractor::parse(&block).aperture, Some(expected));
        }
    }
}
