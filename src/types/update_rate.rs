//! Update rate control for telemetry streams

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Rate at which an async consumer wants telemetry snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// Every merged snapshot, as fast as frames arrive.
    #[default]
    Native,

    /// At most this many snapshots per second, latest wins.
    /// `Max(0)` is treated as `Native`.
    Max(u32),
}

impl UpdateRate {
    /// Throttle interval, or `None` when no throttling applies.
    pub fn interval(self) -> Option<Duration> {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_is_not_throttled() {
        assert_eq!(UpdateRate::Native.interval(), None);
        assert_eq!(UpdateRate::Max(0).interval(), None);
        assert_eq!(UpdateRate::default(), UpdateRate::Native);
    }

    #[test]
    fn max_rate_maps_to_period() {
        assert_eq!(UpdateRate::Max(4).interval(), Some(Duration::from_millis(250)));
        assert_eq!(UpdateRate::Max(1).interval(), Some(Duration::from_secs(1)));
    }
}
