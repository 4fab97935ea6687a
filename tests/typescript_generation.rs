//! TypeScript Generation Tests
//!
//! Validates that the UI-facing live-view types can be exported to TypeScript
//! when the tauri feature is enabled.

#[cfg(feature = "tauri")]
#[test]
fn test_core_types_implement_specta_type() {
    use specta::Type;

    // If this compiles, all types are properly configured for TypeScript export.
    fn assert_type<T: Type>() {}

    // Telemetry overlay
    assert_type::<liveview::Telemetry>();
    assert_type::<liveview::Orientation>();
    assert_type::<liveview::FocusMode>();

    // Session and health
    assert_type::<liveview::SessionState>();
    assert_type::<liveview::HealthStatus>();
    assert_type::<liveview::QualityProfile>();
    assert_type::<liveview::UpdateRate>();
}

#[cfg(not(feature = "tauri"))]
#[test]
fn test_tauri_feature_disabled() {
    // Types still compile without specta::Type
    let _ = liveview::UpdateRate::Native;
    let _ = liveview::SessionState::Idle;
}
