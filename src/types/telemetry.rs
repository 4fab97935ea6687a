//! Exposure telemetry carried in the packet extension block

use std::fmt;

use serde::{Deserialize, Serialize};

/// EXIF-style display orientation reported by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum Orientation {
    /// 1: landscape
    Normal,
    /// 3: upside down
    Rotate180,
    /// 6: grip up
    Rotate90,
    /// 8: grip down
    Rotate270,
}

impl Orientation {
    /// Map the wire byte; anything outside {1, 3, 6, 8} is invalid.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Orientation::Normal),
            3 => Some(Orientation::Rotate180),
            6 => Some(Orientation::Rotate90),
            8 => Some(Orientation::Rotate270),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Orientation::Normal => 1,
            Orientation::Rotate180 => 3,
            Orientation::Rotate90 => 6,
            Orientation::Rotate270 => 8,
        }
    }

    /// Clockwise rotation needed to display the frame upright.
    pub fn degrees(self) -> u16 {
        match self {
            Orientation::Normal => 0,
            Orientation::Rotate180 => 180,
            Orientation::Rotate90 => 90,
            Orientation::Rotate270 => 270,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum FocusMode {
    SingleAf,
    ContinuousAf,
    Manual,
}

impl FocusMode {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(FocusMode::SingleAf),
            1 => Some(FocusMode::ContinuousAf),
            2 => Some(FocusMode::Manual),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FocusMode::SingleAf => "S-AF",
            FocusMode::ContinuousAf => "C-AF",
            FocusMode::Manual => "MF",
        }
    }
}

impl fmt::Display for FocusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest known exposure settings.
///
/// The same struct serves as a partial update (fields decoded from one extension
/// block) and as the merged snapshot. `None` means "not reported", so merging an
/// update only overwrites what the update carries:
///
/// ```rust
/// use liveview::Telemetry;
///
/// let mut state = Telemetry::default();
/// state.merge(Telemetry { aperture: Some("F2.8".into()), ..Default::default() });
/// state.merge(Telemetry { iso: Some("ISO 200".into()), ..Default::default() });
///
/// assert_eq!(state.aperture.as_deref(), Some("F2.8"));
/// assert_eq!(state.iso.as_deref(), Some("ISO 200"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Telemetry {
    pub aperture: Option<String>,
    pub shutter_speed: Option<String>,
    pub iso: Option<String>,
    pub exposure_compensation: Option<String>,
    /// Camera flags the current exposure as out of range.
    pub exposure_warning: Option<bool>,
    pub orientation: Option<Orientation>,
    pub focus_mode: Option<FocusMode>,
    pub focus_status: Option<String>,
}

impl Telemetry {
    /// Sticky-latest merge: present, non-empty fields of `update` win.
    pub fn merge(&mut self, update: Telemetry) {
        fn take_text(slot: &mut Option<String>, value: Option<String>) {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        }

        take_text(&mut self.aperture, update.aperture);
        take_text(&mut self.shutter_speed, update.shutter_speed);
        take_text(&mut self.iso, update.iso);
        take_text(&mut self.exposure_compensation, update.exposure_compensation);
        take_text(&mut self.focus_status, update.focus_status);

        if update.exposure_warning.is_some() {
            self.exposure_warning = update.exposure_warning;
        }
        if update.orientation.is_some() {
            self.orientation = update.orientation;
        }
        if update.focus_mode.is_some() {
            self.focus_mode = update.focus_mode;
        }
    }

    /// Fill the fields this update lacks from an `older` one it supersedes.
    pub fn merge_under(&mut self, older: Telemetry) {
        let newer = std::mem::replace(self, older);
        self.merge(newer);
    }

    /// No field reported at all.
    pub fn is_empty(&self) -> bool {
        *self == Telemetry::default()
    }

    /// Reported fields as ordered `(name, display)` pairs, ready for a status bar.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::with_capacity(8);
        let text = [
            ("aperture", &self.aperture),
            ("shutter_speed", &self.shutter_speed),
            ("iso", &self.iso),
            ("exposure_compensation", &self.exposure_compensation),
        ];
        for (name, value) in text {
            if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
                fields.push((name, value.clone()));
            }
        }
        if self.exposure_warning == Some(true) {
            fields.push(("exposure_warning", "EXP!".to_string()));
        }
        if let Some(orientation) = self.orientation {
            fields.push(("orientation", format!("{}°", orientation.degrees())));
        }
        if let Some(mode) = self.focus_mode {
            fields.push(("focus_mode", mode.to_string()));
        }
        if let Some(status) = self.focus_status.as_ref().filter(|v| !v.is_empty()) {
            fields.push(("focus_status", status.clone()));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn with_aperture(value: &str) -> Telemetry {
        Telemetry { aperture: Some(value.to_string()), ..Default::default() }
    }

    #[test]
    fn merge_keeps_previous_fields() {
        let mut state = Telemetry::default();
        state.merge(with_aperture("F2.8"));
        state.merge(Telemetry { iso: Some("ISO 200".into()), ..Default::default() });

        assert_eq!(
            state,
            Telemetry {
                aperture: Some("F2.8".into()),
                iso: Some("ISO 200".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn empty_strings_do_not_overwrite() {
        let mut state = with_aperture("F4.0");
        state.merge(with_aperture(""));
        assert_eq!(state.aperture.as_deref(), Some("F4.0"));
    }

    #[test]
    fn exposure_warning_can_be_cleared() {
        let mut state = Telemetry { exposure_warning: Some(true), ..Default::default() };
        state.merge(Telemetry { exposure_warning: Some(false), ..Default::default() });
        assert_eq!(state.exposure_warning, Some(false));
        assert!(state.fields().is_empty());
        assert!(!state.is_empty());
    }

    #[test]
    fn merge_under_keeps_newer_values() {
        let mut newer = Telemetry { iso: Some("ISO 400".into()), ..Default::default() };
        newer.merge_under(Telemetry {
            aperture: Some("F2.8".into()),
            iso: Some("ISO 200".into()),
            ..Default::default()
        });

        assert_eq!(newer.aperture.as_deref(), Some("F2.8"));
        assert_eq!(newer.iso.as_deref(), Some("ISO 400"));
    }

    #[test]
    fn fields_are_ordered_for_display() {
        let state = Telemetry {
            aperture: Some("F5.6".into()),
            shutter_speed: Some("1/125".into()),
            exposure_warning: Some(true),
            orientation: Some(Orientation::Rotate90),
            focus_mode: Some(FocusMode::Manual),
            ..Default::default()
        };
        let names: Vec<_> = state.fields().into_iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            ["aperture", "shutter_speed", "exposure_warning", "orientation", "focus_mode"]
        );
        assert_eq!(state.fields()[3].1, "90°");
        assert_eq!(state.fields()[4].1, "MF");
    }

    #[test]
    fn orientation_codes() {
        for code in [1u8, 3, 6, 8] {
            assert_eq!(Orientation::from_code(code).map(Orientation::code), Some(code));
        }
        assert_eq!(Orientation::from_code(2), None);
        assert_eq!(Orientation::from_code(0), None);
        assert_eq!(FocusMode::from_code(1), Some(FocusMode::ContinuousAf));
        assert_eq!(FocusMode::from_code(7), None);
    }

    prop_compose! {
        fn arb_text()(value in prop::option::of("[A-Z0-9/ .]{0,8}")) -> Option<String> {
            value
        }
    }

    prop_compose! {
        fn arb_telemetry()(
            aperture in arb_text(),
            shutter_speed in arb_text(),
            iso in arb_text(),
            exposure_compensation in arb_text(),
            exposure_warning in prop::option::of(any::<bool>()),
        ) -> Telemetry {
            Telemetry {
                aperture,
                shutter_speed,
                iso,
                exposure_compensation,
                exposure_warning,
                ..Default::default()
            }
        }
    }

    proptest! {
        #[test]
        fn merge_never_loses_a_known_value(
            updates in prop::collection::vec(arb_telemetry(), 1..12)
        ) {
            let mut state = Telemetry::default();
            for update in &updates {
                state.merge(update.clone());
            }

            // Each field equals the last non-empty value any update carried.
            let last_aperture = updates
                .iter()
                .rev()
                .find_map(|u| u.aperture.clone().filter(|v| !v.is_empty()));
            prop_assert_eq!(state.aperture, last_aperture);

            let last_warning = updates.iter().rev().find_map(|u| u.exposure_warning);
            prop_assert_eq!(state.exposure_warning, last_warning);
        }
    }
}
