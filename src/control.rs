//! Camera control seam
//!
//! Starting and stopping the camera's UDP stream happens out of band, usually over
//! the camera's HTTP API. The session only needs the two calls in
//! [`CameraControl`]. A vendor client that needs a different request shape gets
//! wrapped in an adapter implementing this trait:
//!
//! ```rust
//! use liveview::{CameraControl, LiveViewError, QualityProfile, Result};
//!
//! struct VendorClient;
//!
//! impl VendorClient {
//!     fn send(&mut self, command: &str, params: &[(&str, String)]) -> bool {
//!         let _ = (command, params);
//!         true
//!     }
//! }
//!
//! /// Uses the extended live-view request variant of the vendor client.
//! struct ExtendedLiveView(VendorClient);
//!
//! impl CameraControl for ExtendedLiveView {
//!     fn start_stream(&mut self, port: u16, quality: QualityProfile) -> Result<()> {
//!         let params = [
//!             ("com", "startliveview".to_string()),
//!             ("port", port.to_string()),
//!             ("lvqty", quality.as_str().to_string()),
//!             ("extinfo", "1".to_string()),
//!         ];
//!         if self.0.send("exec_takemisc", &params) {
//!             Ok(())
//!         } else {
//!             Err(LiveViewError::control_failed("start_stream", "camera rejected request"))
//!         }
//!     }
//!
//!     fn stop_stream(&mut self) -> Result<()> {
//!         let params = [("com", "stopliveview".to_string())];
//!         self.0
//!             .send("exec_takemisc", &params)
//!             .then_some(())
//!             .ok_or_else(|| LiveViewError::control_failed("stop_stream", "camera rejected request"))
//!     }
//! }
//! ```

use tracing::debug;

use crate::{QualityProfile, Result};

/// Out-of-band commands that make the camera start or stop streaming.
pub trait CameraControl: Send + 'static {
    /// Ask the camera to stream to `port` at `quality`.
    fn start_stream(&mut self, port: u16, quality: QualityProfile) -> Result<()>;

    fn stop_stream(&mut self) -> Result<()>;
}

impl<C: CameraControl + ?Sized> CameraControl for Box<C> {
    fn start_stream(&mut self, port: u16, quality: QualityProfile) -> Result<()> {
        (**self).start_stream(port, quality)
    }

    fn stop_stream(&mut self) -> Result<()> {
        (**self).stop_stream()
    }
}

/// Control client for streams started by someone else.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassiveControl;

impl CameraControl for PassiveControl {
    fn start_stream(&mut self, port: u16, quality: QualityProfile) -> Result<()> {
        debug!(port, %quality, "Passive control, expecting an externally started stream");
        Ok(())
    }

    fn stop_stream(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ControlCall, RecordingControl};

    #[test]
    fn passive_control_always_succeeds() {
        let mut control = PassiveControl;
        assert!(control.start_stream(40000, QualityProfile::Vga).is_ok());
        assert!(control.stop_stream().is_ok());
    }

    #[test]
    fn boxed_controls_forward_calls() {
        let recording = RecordingControl::default();
        let calls = recording.calls();
        let mut boxed: Box<dyn CameraControl> = Box::new(recording);

        boxed.start_stream(41234, QualityProfile::Xga).unwrap();
        boxed.stop_stream().unwrap();

        assert_eq!(
            *calls.lock(),
            vec![ControlCall::Start { port: 41234, quality: QualityProfile::Xga }, ControlCall::Stop]
        );
    }
}
