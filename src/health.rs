//! Stream health classification
//!
//! The UI reports one sample per tick in which it tried to show a frame, with
//! whether that attempt failed and how long decoding took. The monitor keeps the
//! most recent samples and classifies the trailing window by frame rate, error
//! rate and the longest gap between frames.
//!
//! Frames the assembler had to discard never reach the UI. They are recorded
//! separately as misses and reported next to the classification, which stays
//! based on delivered frames only.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::HealthThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Ok,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Ok => "ok",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Min/max/average over the retained decode durations. All zero without samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimeStats {
    pub min: Duration,
    pub max: Duration,
    pub avg: Duration,
    pub samples: usize,
}

impl ProcessingTimeStats {
    fn from_samples(samples: &VecDeque<Duration>) -> Self {
        let (Some(min), Some(max)) = (samples.iter().min(), samples.iter().max()) else {
            return Self::default();
        };
        let total: Duration = samples.iter().sum();
        Self { min: *min, max: *max, avg: total / samples.len() as u32, samples: samples.len() }
    }
}

/// Health of the trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Samples in the window divided by the window length.
    pub fps: f64,
    /// Failed samples over all samples in the window, 0 without samples.
    pub error_rate: f64,
    /// Longest interval between consecutive samples in the window.
    pub max_gap: Duration,
    /// Most severe cause, `None` while the stream is healthy.
    pub message: Option<String>,
    pub processing_time: ProcessingTimeStats,
    /// Retained frame samples, in or out of the window.
    pub frame_count: usize,
    /// Retained error samples, in or out of the window.
    pub error_count: usize,
    /// Frames discarded before delivery within the window.
    pub missed_frames: usize,
}

#[derive(Debug)]
pub struct HealthMonitor {
    thresholds: HealthThresholds,
    frame_times: VecDeque<Instant>,
    error_times: VecDeque<Instant>,
    miss_times: VecDeque<Instant>,
    processing_times: VecDeque<Duration>,
    last_sample: Option<Instant>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(HealthThresholds::default())
    }
}

impl HealthMonitor {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(thresholds.max_frame_samples),
            error_times: VecDeque::with_capacity(thresholds.max_error_samples),
            miss_times: VecDeque::new(),
            processing_times: VecDeque::with_capacity(thresholds.max_processing_samples),
            thresholds,
            last_sample: None,
        }
    }

    pub fn record_frame(&mut self, had_error: bool) -> bool {
        self.record_frame_at(Instant::now(), had_error)
    }

    /// Record a frame attempt at `at`.
    ///
    /// Returns `false` when the sample falls inside the debounce interval of the
    /// previous one and was ignored.
    pub fn record_frame_at(&mut self, at: Instant, had_error: bool) -> bool {
        self.record_processed_at(at, had_error, None)
    }

    pub fn record_processed(&mut self, had_error: bool, processing_time: Option<Duration>) -> bool {
        self.record_processed_at(Instant::now(), had_error, processing_time)
    }

    /// Like [`record_frame_at`](Self::record_frame_at), also keeping how long the
    /// frame took to process. A debounced sample keeps nothing.
    pub fn record_processed_at(
        &mut self,
        at: Instant,
        had_error: bool,
        processing_time: Option<Duration>,
    ) -> bool {
        if let Some(last) = self.last_sample {
            if at.saturating_duration_since(last) < self.thresholds.debounce() {
                return false;
            }
        }
        self.last_sample = Some(at);

        push_capped(&mut self.frame_times, at, self.thresholds.max_frame_samples);
        if had_error {
            push_capped(&mut self.error_times, at, self.thresholds.max_error_samples);
        }
        if let Some(elapsed) = processing_time {
            push_capped(&mut self.processing_times, elapsed, self.thresholds.max_processing_samples);
        }
        true
    }

    pub fn record_missed(&mut self, count: usize) {
        self.record_missed_at(Instant::now(), count);
    }

    /// Record `count` frames that were discarded before delivery. Not debounced.
    pub fn record_missed_at(&mut self, at: Instant, count: usize) {
        let cap = self.thresholds.max_frame_samples;
        for _ in 0..count.min(cap) {
            push_capped(&mut self.miss_times, at, cap);
        }
    }

    pub fn report(&self) -> HealthReport {
        self.report_at(Instant::now())
    }

    /// Classify the window ending at `now`.
    pub fn report_at(&self, now: Instant) -> HealthReport {
        let window = self.thresholds.window();
        let in_window = |t: &&Instant| now.checked_sub(window).is_none_or(|start| **t >= start);

        let frames: Vec<Instant> = self.frame_times.iter().filter(in_window).copied().collect();
        let errors = self.error_times.iter().filter(in_window).count();

        let fps = frames.len() as f64 / window.as_secs_f64();
        let error_rate = if frames.is_empty() { 0.0 } else { errors as f64 / frames.len() as f64 };
        let max_gap = frames
            .windows(2)
            .map(|pair| pair[1].saturating_duration_since(pair[0]))
            .max()
            .unwrap_or_default();

        let (status, message) = self.classify(fps, error_rate, max_gap);
        HealthReport {
            status,
            fps,
            error_rate,
            max_gap,
            message,
            processing_time: self.processing_time(),
            frame_count: self.frame_times.len(),
            error_count: self.error_times.len(),
            missed_frames: self.miss_times.iter().filter(in_window).count(),
        }
    }

    pub fn processing_time(&self) -> ProcessingTimeStats {
        ProcessingTimeStats::from_samples(&self.processing_times)
    }

    fn classify(&self, fps: f64, error_rate: f64, max_gap: Duration) -> (HealthStatus, Option<String>) {
        let t = &self.thresholds;
        let low_fps = || format!("Low frame rate ({fps:.1} FPS)");
        let high_errors = || format!("High error rate ({:.0}%)", error_rate * 100.0);
        let gaps = || format!("Frame gaps ({:.1}s)", max_gap.as_secs_f64());

        let critical = if fps < t.fps_critical {
            Some(low_fps())
        } else if error_rate > t.error_rate_critical {
            Some(high_errors())
        } else if max_gap > t.gap_critical() {
            Some(gaps())
        } else {
            None
        };
        if let Some(cause) = critical {
            return (HealthStatus::Critical, Some(format!("Critical: {cause}")));
        }

        let warning = if fps < t.fps_warning {
            Some(low_fps())
        } else if error_rate > t.error_rate_warning {
            Some(high_errors())
        } else if max_gap > t.gap_warning() {
            Some(gaps())
        } else {
            None
        };
        match warning {
            Some(cause) => (HealthStatus::Warning, Some(format!("Warning: {cause}"))),
            None => (HealthStatus::Ok, None),
        }
    }

    pub fn reset(&mut self) {
        debug!("Health monitor reset");
        self.frame_times.clear();
        self.error_times.clear();
        self.miss_times.clear();
        self.processing_times.clear();
        self.last_sample = None;
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }
}

fn push_capped<T>(samples: &mut VecDeque<T>, sample: T, cap: usize) {
    if samples.len() >= cap {
        samples.pop_front();
    }
    samples.push_back(sample);
}
