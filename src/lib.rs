//! Live-view receiver for WiFi cameras streaming JPEG over RTP.
//!
//! The camera is told (out of band, see [`CameraControl`]) to stream its live view
//! to a local UDP port. Each JPEG frame arrives fragmented across RTP-like
//! datagrams sharing one timestamp; the first datagram of a frame may carry an
//! extension block with exposure telemetry.
//!
//! # Features
//!
//! - **Frame assembly**: fragments reassembled into complete JPEG frames, with
//!   loss, reordering and oversize frames discarded instead of displayed
//! - **Telemetry**: sticky merge of partial exposure updates into one snapshot
//! - **Latency first**: every hop is a small drop-oldest queue, so a slow consumer
//!   sees the newest frame rather than a backlog
//! - **Health**: frame rate, error rate and gap classification for the UI
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use liveview::{LiveViewConfig, LiveViewSession, PassiveControl, QualityProfile};
//!
//! let config = LiveViewConfig::load("liveview.yaml")?;
//! let mut session = LiveViewSession::new(config, PassiveControl)?;
//! let port = session.start(QualityProfile::Vga)?;
//!
//! while let Some(frame) = session.poll_frame() {
//!     println!("{}x{} on port {port}", frame.width(), frame.height());
//! }
//! # Ok::<(), liveview::LiveViewError>(())
//! ```
//!
//! ## Async telemetry
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use liveview::{LiveViewConfig, LiveViewSession, PassiveControl, QualityProfile, UpdateRate};
//!
//! #[tokio::main]
//! async fn main() -> liveview::Result<()> {
//!     let mut session = LiveViewSession::new(LiveViewConfig::default(), PassiveControl)?;
//!     session.start(QualityProfile::Xga)?;
//!
//!     let mut updates = session.telemetry_updates(UpdateRate::Max(10));
//!     while let Some(telemetry) = updates.next().await {
//!         for (name, value) in telemetry.fields() {
//!             println!("{name}: {value}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Wire format
pub mod protocol;

// Pipeline stages
pub mod channel;
pub mod control;
pub mod decoder;
pub mod health;
pub mod receiver;
pub mod session;
pub mod stream;

// Core exports
pub use config::{ChannelCapacities, HealthThresholds, LiveViewConfig, QualityProfile};
pub use error::*;
pub use types::*;

// Pipeline exports
pub use channel::BoundedChannel;
pub use control::{CameraControl, PassiveControl};
pub use decoder::{FrameDecoder, JpegDecoder};
pub use health::{HealthMonitor, HealthReport, HealthStatus, ProcessingTimeStats};
pub use protocol::{RtpFrameAssembler, RtpPacket, TelemetryExtractor};
pub use receiver::{PacketReceiver, ReceiverStats, StatsSnapshot};
pub use session::{LiveViewSession, SessionState};
pub use stream::ThrottleExt;
