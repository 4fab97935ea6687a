//! Session configuration.
//!
//! All tunables of the pipeline live here: socket timeouts, channel capacities,
//! the port range sessions pick from and the health thresholds. Every field has a
//! default, so a YAML file only needs the values it changes:
//!
//! ```rust
//! use liveview::LiveViewConfig;
//!
//! let config = LiveViewConfig::from_yaml_str(
//!     "port_range: [41000, 41100]\ncapacities:\n  raw_frames: 4\n",
//! )?;
//! assert_eq!(config.capacities.raw_frames, 4);
//! assert_eq!(config.capacities.display_frames, 2);
//! # Ok::<(), liveview::LiveViewError>(())
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{LiveViewError, Result};

/// Live-view resolution requested from the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum QualityProfile {
    /// 320x240
    Qvga,
    /// 640x480
    #[default]
    Vga,
    /// 800x600
    Svga,
    /// 1024x768
    Xga,
    /// 1280x960
    Sxga,
}

impl QualityProfile {
    /// Every profile, smallest first.
    pub const ALL: [QualityProfile; 5] = [
        QualityProfile::Qvga,
        QualityProfile::Vga,
        QualityProfile::Svga,
        QualityProfile::Xga,
        QualityProfile::Sxga,
    ];

    /// Token sent over the control channel.
    pub fn as_str(self) -> &'static str {
        match self {
            QualityProfile::Qvga => "0320x0240",
            QualityProfile::Vga => "0640x0480",
            QualityProfile::Svga => "0800x0600",
            QualityProfile::Xga => "1024x0768",
            QualityProfile::Sxga => "1280x0960",
        }
    }

    /// Frame dimensions in pixels.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            QualityProfile::Qvga => (320, 240),
            QualityProfile::Vga => (640, 480),
            QualityProfile::Svga => (800, 600),
            QualityProfile::Xga => (1024, 768),
            QualityProfile::Sxga => (1280, 960),
        }
    }
}

impl fmt::Display for QualityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityProfile {
    type Err = LiveViewError;

    fn from_str(s: &str) -> Result<Self> {
        QualityProfile::ALL
            .into_iter()
            .find(|profile| profile.as_str() == s)
            .ok_or_else(|| LiveViewError::config_invalid("quality", format!("unknown profile '{s}'")))
    }
}

/// Capacities of the three drop-oldest channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelCapacities {
    /// Assembled JPEG frames waiting for the decode thread.
    pub raw_frames: usize,
    /// Decoded frames waiting for the UI.
    pub display_frames: usize,
    /// Partial telemetry updates waiting for the merge thread.
    pub telemetry: usize,
}

impl Default for ChannelCapacities {
    fn default() -> Self {
        Self { raw_frames: 3, display_frames: 2, telemetry: 2 }
    }
}

/// Sliding-window health thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub window_secs: u64,
    /// Samples closer than this to the previous one are ignored.
    pub debounce_ms: u64,
    pub max_frame_samples: usize,
    pub max_error_samples: usize,
    /// Decode durations kept for the processing-time statistics.
    pub max_processing_samples: usize,
    pub fps_warning: f64,
    pub fps_critical: f64,
    pub error_rate_warning: f64,
    pub error_rate_critical: f64,
    pub gap_warning_ms: u64,
    pub gap_critical_ms: u64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            window_secs: 10,
            debounce_ms: 16,
            max_frame_samples: 100,
            max_error_samples: 20,
            max_processing_samples: 50,
            fps_warning: 10.0,
            fps_critical: 5.0,
            error_rate_warning: 0.2,
            error_rate_critical: 0.5,
            gap_warning_ms: 500,
            gap_critical_ms: 1000,
        }
    }
}

impl HealthThresholds {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn gap_warning(&self) -> Duration {
        Duration::from_millis(self.gap_warning_ms)
    }

    pub fn gap_critical(&self) -> Duration {
        Duration::from_millis(self.gap_critical_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.window_secs == 0 {
            return Err(LiveViewError::config_invalid("health.window_secs", "must be positive"));
        }
        if self.max_frame_samples == 0 || self.max_error_samples == 0 || self.max_processing_samples == 0 {
            return Err(LiveViewError::config_invalid(
                "health.max_frame_samples",
                "sample buffers must hold at least one sample",
            ));
        }
        if self.fps_critical > self.fps_warning {
            return Err(LiveViewError::config_invalid(
                "health.fps_critical",
                format!(
                    "critical fps {} is above warning fps {}",
                    self.fps_critical, self.fps_warning
                ),
            ));
        }
        if self.error_rate_critical < self.error_rate_warning {
            return Err(LiveViewError::config_invalid(
                "health.error_rate_critical",
                "critical error rate must not be below the warning rate",
            ));
        }
        if self.gap_critical_ms < self.gap_warning_ms {
            return Err(LiveViewError::config_invalid(
                "health.gap_critical_ms",
                "critical gap must not be below the warning gap",
            ));
        }
        Ok(())
    }
}

/// Configuration for a [`LiveViewSession`](crate::LiveViewSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveViewConfig {
    /// Local address the UDP socket binds to.
    pub bind_address: String,
    /// Inclusive range a session picks its port from, at random, on every start.
    pub port_range: [u16; 2],
    /// Socket read timeout; bounds how long the receiver takes to notice shutdown.
    pub recv_timeout_ms: u64,
    /// Pause between the implicit stop and the new start of a restart.
    pub settle_delay_ms: u64,
    /// How long `stop()` waits for each worker thread before abandoning it.
    pub join_timeout_ms: u64,
    /// How long consumer threads block on an empty channel before re-checking shutdown.
    pub consumer_poll_ms: u64,
    pub max_datagram_bytes: usize,
    /// Frames growing past this are discarded.
    pub max_frame_bytes: usize,
    pub capacities: ChannelCapacities,
    pub health: HealthThresholds,
    pub quality: QualityProfile,
}

impl Default for LiveViewConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port_range: [40000, 50000],
            recv_timeout_ms: 500,
            settle_delay_ms: 500,
            join_timeout_ms: 1000,
            consumer_poll_ms: 50,
            max_datagram_bytes: 65536,
            max_frame_bytes: 4 * 1024 * 1024,
            capacities: ChannelCapacities::default(),
            health: HealthThresholds::default(),
            quality: QualityProfile::default(),
        }
    }
}

impl LiveViewConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: LiveViewConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            LiveViewError::config_invalid(path.display().to_string(), e.to_string())
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        let [low, high] = self.port_range;
        if low == 0 || low > high {
            return Err(LiveViewError::config_invalid(
                "port_range",
                format!("[{low}, {high}] is not a usable port range"),
            ));
        }
        if self.bind_address.parse::<std::net::IpAddr>().is_err() {
            return Err(LiveViewError::config_invalid(
                "bind_address",
                format!("'{}' is not an IP address", self.bind_address),
            ));
        }
        for (field, value) in [
            ("recv_timeout_ms", self.recv_timeout_ms),
            ("join_timeout_ms", self.join_timeout_ms),
            ("consumer_poll_ms", self.consumer_poll_ms),
        ] {
            if value == 0 {
                return Err(LiveViewError::config_invalid(field, "must be positive"));
            }
        }
        // The receiver has to see the cancellation inside its own join window.
        if self.recv_timeout_ms > self.join_timeout_ms {
            return Err(LiveViewError::config_invalid(
                "recv_timeout_ms",
                format!(
                    "{}ms exceeds join_timeout_ms ({}ms)",
                    self.recv_timeout_ms, self.join_timeout_ms
                ),
            ));
        }
        if self.consumer_poll_ms > self.join_timeout_ms {
            return Err(LiveViewError::config_invalid(
                "consumer_poll_ms",
                "must not exceed join_timeout_ms",
            ));
        }
        if self.max_datagram_bytes < 12 {
            return Err(LiveViewError::config_invalid(
                "max_datagram_bytes",
                "must hold at least the 12-byte packet header",
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(LiveViewError::config_invalid("max_frame_bytes", "must be positive"));
        }
        let caps = &self.capacities;
        for (field, value) in [
            ("capacities.raw_frames", caps.raw_frames),
            ("capacities.display_frames", caps.display_frames),
            ("capacities.telemetry", caps.telemetry),
        ] {
            if value == 0 {
                return Err(LiveViewError::config_invalid(field, "capacity must be at least 1"));
            }
        }
        self.health.validate()
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn consumer_poll(&self) -> Duration {
        Duration::from_millis(self.consumer_poll_ms)
    }

    /// Upper bound on how long `stop()` can block.
    ///
    /// Each of the three worker joins waits at most `join_timeout`; the receiver's
    /// socket timeout is validated to fit inside its join window.
    pub fn max_shutdown_latency(&self) -> Duration {
        self.join_timeout() * 3
    }
}
