//! Live-view session lifecycle
//!
//! A [`LiveViewSession`] owns the whole pipeline for one camera:
//!
//! ```text
//!                 ┌───────────┐ raw frames ┌────────┐ display frames
//! UDP ──────────▶ │ receiver  │ ─────────▶ │ decode │ ─────────────▶ try_pop_frame()
//!                 │  thread   │            │ thread │
//!                 └───────────┘            └────────┘
//!                       │ partial telemetry ┌───────┐ watch
//!                       └─────────────────▶ │ merge │ ──────▶ telemetry_snapshot()
//!                                           │thread │         telemetry_updates()
//!                                           └───────┘
//! ```
//!
//! Every arrow between threads is a drop-oldest [`BoundedChannel`], except the
//! last hop of telemetry: the merge thread is the only writer of the sticky
//! telemetry state and publishes immutable `Arc` snapshots through a
//! `tokio::sync::watch` channel, so readers never see a half-merged update.
//! Partial telemetry updates are folded rather than evicted on their way to the
//! merge thread.
//!
//! Every start gets fresh channels and counters. A worker abandoned by a slow
//! `stop()` can only reach the channels of its own run, and its merge thread
//! stops publishing once a newer run has begun.
//!
//! The UI thread only performs non-blocking calls: it polls frames, reads the
//! telemetry snapshot and reports frame attempts to the health monitor.
//!
//! # Example
//!
//! ```rust,no_run
//! use liveview::{LiveViewConfig, LiveViewSession, PassiveControl, QualityProfile};
//! use std::time::Duration;
//!
//! let mut session = LiveViewSession::new(LiveViewConfig::default(), PassiveControl)?;
//! let port = session.start(QualityProfile::Vga)?;
//! println!("waiting for the camera on port {port}");
//!
//! loop {
//!     if let Some(frame) = session.poll_frame() {
//!         println!("{}x{} frame, {:?}", frame.width(), frame.height(), session.telemetry_snapshot());
//!     }
//!     if let Some(message) = session.health().message {
//!         eprintln!("{message}");
//!     }
//!     std::thread::sleep(Duration::from_millis(16));
//! }
//! # Ok::<(), liveview::LiveViewError>(())
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::channel::BoundedChannel;
use crate::control::CameraControl;
use crate::decoder::{FrameDecoder, JpegDecoder};
use crate::health::{HealthMonitor, HealthReport};
use crate::receiver::{PacketReceiver, ReceiverOutputs, ReceiverStats, StatsSnapshot};
use crate::stream::ThrottleExt;
use crate::types::{DecodedFrame, Frame, Telemetry, UpdateRate};
use crate::{LiveViewConfig, LiveViewError, QualityProfile, Result};


/// How often `stop()` checks whether a worker has exited.
const JOIN_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum SessionState {
    #[default]
    Idle,
    Active,
    /// Transient while `stop()` runs.
    ShuttingDown,
}

/// Decode result with how long the decoder took.
#[derive(Debug)]
struct DecodeOutcome {
    result: Result<DecodedFrame>,
    decode_time: Duration,
}

/// Worker threads of one active session.
struct Workers {
    cancel: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Workers {
    fn spawn<F>(&mut self, name: &'static str, work: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let handle = thread::Builder::new()
            .name(format!("liveview-{name}"))
            .spawn(move || work(cancel))
            .map_err(|e| LiveViewError::worker_spawn_failed(name, e))?;
        self.handles.push((name, handle));
        Ok(())
    }
}

/// Receives, assembles and decodes the live view of one camera.
///
/// Generic over the [`CameraControl`] client that tells the camera where to send
/// its stream. Dropping the session stops it.
pub struct LiveViewSession<C: CameraControl> {
    config: LiveViewConfig,
    control: C,
    decoder: Arc<dyn FrameDecoder>,
    state: SessionState,
    port: Option<u16>,
    quality: Option<QualityProfile>,
    workers: Option<Workers>,
    raw_frames: Arc<BoundedChannel<Frame>>,
    display_frames: Arc<BoundedChannel<DecodeOutcome>>,
    telemetry_updates: Arc<BoundedChannel<Telemetry>>,
    telemetry: Arc<watch::Sender<Arc<Telemetry>>>,
    /// Bumped on every start; a merge thread publishes only while its run is current.
    run: Arc<AtomicU64>,
    health: HealthMonitor,
    stats: Arc<ReceiverStats>,
    /// `frames_discarded` already reported to the health monitor.
    seen_discarded: u64,
}

impl<C: CameraControl> LiveViewSession<C> {
    /// Create an idle session. The configuration is validated here.
    pub fn new(config: LiveViewConfig, control: C) -> Result<Self> {
        config.validate()?;
        let caps = config.capacities;
        let (telemetry, _) = watch::channel(Arc::new(Telemetry::default()));

        Ok(Self {
            control,
            decoder: Arc::new(JpegDecoder),
            state: SessionState::Idle,
            port: None,
            quality: None,
            workers: None,
            raw_frames: Arc::new(BoundedChannel::new(caps.raw_frames)),
            display_frames: Arc::new(BoundedChannel::new(caps.display_frames)),
            telemetry_updates: Arc::new(BoundedChannel::new(caps.telemetry)),
            telemetry: Arc::new(telemetry),
            run: Arc::new(AtomicU64::new(0)),
            health: HealthMonitor::new(config.health.clone()),
            stats: Arc::new(ReceiverStats::default()),
            seen_discarded: 0,
            config,
        })
    }

    /// Replace the JPEG decoder used by the decode thread from the next start on.
    pub fn with_decoder(mut self, decoder: Arc<dyn FrameDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Bind a socket, ask the camera to stream to it and start the workers.
    ///
    /// An active session is stopped first and given the configured settle delay
    /// before its replacement binds. Returns the port the camera was told to use.
    ///
    /// # Errors
    ///
    /// - [`LiveViewError::Transport`] if the socket cannot be bound
    /// - [`LiveViewError::Control`] if the camera refuses to start streaming
    /// - [`LiveViewError::Worker`] if a worker thread cannot be spawned
    ///
    /// The session is `Idle` after any error.
    pub fn start(&mut self, quality: QualityProfile) -> Result<u16> {
        if self.state == SessionState::Active {
            info!(port = ?self.port, "Restarting live view");
            self.stop();
            thread::sleep(self.config.settle_delay());
        }

        let [low, high] = self.config.port_range;
        let port = rand::rng().random_range(low..=high);

        let caps = self.config.capacities;
        self.raw_frames = Arc::new(BoundedChannel::new(caps.raw_frames));
        self.display_frames = Arc::new(BoundedChannel::new(caps.display_frames));
        self.telemetry_updates = Arc::new(BoundedChannel::new(caps.telemetry));
        self.stats = Arc::new(ReceiverStats::default());
        self.seen_discarded = 0;
        self.health.reset();

        // Retire any merge thread still running before clearing what it published.
        let run = self.run.fetch_add(1, Ordering::AcqRel) + 1;
        self.telemetry.send_replace(Arc::new(Telemetry::default()));
        debug!(run, "Pipeline state reset");

        let outputs = ReceiverOutputs {
            raw_frames: Arc::clone(&self.raw_frames),
            telemetry: Arc::clone(&self.telemetry_updates),
            stats: Arc::clone(&self.stats),
        };
        let receiver = PacketReceiver::bind(&self.config, port, outputs)?;
        let port = receiver.local_addr().port();

        // Dropping the receiver on failure closes the socket again.
        self.control.start_stream(port, quality)?;

        let workers = match self.spawn_workers(receiver, run) {
            Ok(workers) => workers,
            Err(e) => {
                if let Err(stop_err) = self.control.stop_stream() {
                    warn!(error = %stop_err, "Failed to stop camera stream after aborted start");
                }
                return Err(e);
            }
        };

        self.workers = Some(workers);
        self.port = Some(port);
        self.quality = Some(quality);
        self.state = SessionState::Active;
        info!(port, %quality, "Live view started");
        Ok(port)
    }

    fn spawn_workers(&self, receiver: PacketReceiver, run: u64) -> Result<Workers> {
        let mut workers = Workers { cancel: CancellationToken::new(), handles: Vec::with_capacity(3) };
        if let Err(e) = self.spawn_into(&mut workers, receiver, run) {
            // Already running workers exit on their own once cancelled.
            workers.cancel.cancel();
            return Err(e);
        }
        Ok(workers)
    }

    fn spawn_into(&self, workers: &mut Workers, receiver: PacketReceiver, run: u64) -> Result<()> {
        let poll = self.config.consumer_poll();

        let raw = Arc::clone(&self.raw_frames);
        let display = Arc::clone(&self.display_frames);
        let decoder = Arc::clone(&self.decoder);
        workers.spawn("decode", move |cancel| decode_loop(&raw, &display, decoder.as_ref(), poll, &cancel))?;

        let updates = Arc::clone(&self.telemetry_updates);
        let publisher = Publisher { sender: Arc::clone(&self.telemetry), current_run: Arc::clone(&self.run), run };
        workers.spawn("merge", move |cancel| merge_loop(&updates, &publisher, poll, &cancel))?;

        let handle = receiver.spawn(workers.cancel.clone())?;
        workers.handles.push(("receiver", handle));
        Ok(())
    }

    /// Stop the workers and the camera stream. A no-op when idle.
    ///
    /// Each worker gets `join_timeout` to exit; one that does not is abandoned
    /// with a warning, so this returns within
    /// [`LiveViewConfig::max_shutdown_latency`]. A failing control stop is logged
    /// and the session still ends up `Idle`.
    pub fn stop(&mut self) {
        let Some(workers) = self.workers.take() else {
            return;
        };
        self.state = SessionState::ShuttingDown;
        info!(port = ?self.port, "Stopping live view");

        workers.cancel.cancel();
        let timeout = self.config.join_timeout();
        for (name, handle) in workers.handles {
            join_with_timeout(name, handle, timeout);
        }

        let drained = self.raw_frames.drain().len()
            + self.display_frames.drain().len()
            + self.telemetry_updates.drain().len();
        debug!(drained, "Channels drained");

        if let Err(e) = self.control.stop_stream() {
            warn!(error = %e, "Failed to stop camera stream");
        }

        self.port = None;
        self.quality = None;
        self.state = SessionState::Idle;
        info!("Live view stopped");
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Port of the active session.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn quality(&self) -> Option<QualityProfile> {
        self.quality
    }

    pub fn config(&self) -> &LiveViewConfig {
        &self.config
    }

    /// Next decoded frame or decode failure, without blocking.
    ///
    /// Nothing is reported to the health monitor; see [`poll_frame`](Self::poll_frame).
    pub fn try_pop_frame(&self) -> Option<Result<DecodedFrame>> {
        self.display_frames.try_pop().map(|outcome| outcome.result)
    }

    /// Pop a frame and report the attempt, with its decode time, to the health
    /// monitor.
    ///
    /// Decode failures are recorded as errors and yield `None`; an empty
    /// channel records nothing. Frames the assembler discarded since the last
    /// call are recorded as misses.
    pub fn poll_frame(&mut self) -> Option<DecodedFrame> {
        self.record_discards();

        let DecodeOutcome { result, decode_time } = self.display_frames.try_pop()?;
        match result {
            Ok(frame) => {
                self.health.record_processed(false, Some(decode_time));
                Some(frame)
            }
            Err(e) => {
                trace!(error = %e, "Skipping undecodable frame");
                self.health.record_processed(true, Some(decode_time));
                None
            }
        }
    }

    fn record_discards(&mut self) {
        let discarded = self.stats.snapshot().frames_discarded;
        let missed = discarded.saturating_sub(self.seen_discarded);
        if missed > 0 {
            self.seen_discarded = discarded;
            self.health.record_missed(missed as usize);
        }
    }

    /// Report a frame attempt made outside [`poll_frame`](Self::poll_frame),
    /// such as a display failure.
    pub fn record_frame(&mut self, had_error: bool) -> bool {
        self.health.record_frame(had_error)
    }

    pub fn health(&self) -> HealthReport {
        self.health.report()
    }

    pub fn health_monitor(&self) -> &HealthMonitor {
        &self.health
    }

    /// Latest merged telemetry.
    pub fn telemetry_snapshot(&self) -> Arc<Telemetry> {
        self.telemetry.borrow().clone()
    }

    /// Telemetry snapshots as a stream, starting with the current one.
    ///
    /// The stream survives restarts and ends when the session is dropped.
    pub fn telemetry_updates(
        &self,
        rate: UpdateRate,
    ) -> impl Stream<Item = Arc<Telemetry>> + Send + Unpin + 'static {
        let snapshots = WatchStream::new(self.telemetry.subscribe());
        match rate.interval() {
            None => snapshots.boxed(),
            Some(period) => snapshots.throttle(period).boxed(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl<C: CameraControl> Drop for LiveViewSession<C> {
    fn drop(&mut self) {
        debug!("Dropping live-view session");
        self.stop();
    }
}

fn decode_loop(
    raw: &BoundedChannel<Frame>,
    display: &BoundedChannel<DecodeOutcome>,
    decoder: &dyn FrameDecoder,
    poll: Duration,
    cancel: &CancellationToken,
) {
    info!("Decode worker started");
    let mut decoded_count = 0u64;
    let mut error_count = 0u64;

    while !cancel.is_cancelled() {
        let Some(frame) = raw.pop_timeout(poll) else {
            continue;
        };

        let started = Instant::now();
        let result = decoder.decode(&frame);
        let decode_time = started.elapsed();
        match &result {
            Ok(_) => decoded_count += 1,
            Err(e) => {
                error_count += 1;
                warn!(error = %e, bytes = frame.len(), "Frame decode failed");
            }
        }
        if display.push(DecodeOutcome { result, decode_time }).is_some() {
            trace!(timestamp = frame.timestamp(), "UI behind, dropped oldest display frame");
        }
    }

    info!(decoded = decoded_count, errors = error_count, "Decode worker stopped");
}

/// The telemetry sender as seen by the merge thread of one run.
struct Publisher {
    sender: Arc<watch::Sender<Arc<Telemetry>>>,
    current_run: Arc<AtomicU64>,
    run: u64,
}

impl Publisher {
    /// Publish `telemetry` unless a newer run has started. Checked under the
    /// watch lock, so a stale snapshot cannot land after the new run's reset.
    fn publish(&self, telemetry: &Telemetry) -> bool {
        self.sender.send_if_modified(|current| {
            if self.current_run.load(Ordering::Acquire) != self.run {
                return false;
            }
            *current = Arc::new(telemetry.clone());
            true
        })
    }
}

fn merge_loop(
    updates: &BoundedChannel<Telemetry>,
    publisher: &Publisher,
    poll: Duration,
    cancel: &CancellationToken,
) {
    info!(run = publisher.run, "Telemetry merge worker started");
    let mut merged = Telemetry::clone(&publisher.sender.borrow());

    while !cancel.is_cancelled() {
        let Some(update) = updates.pop_timeout(poll) else {
            continue;
        };
        merged.merge(update);
        debug!(telemetry = ?merged, "Telemetry merged");
        if !publisher.publish(&merged) {
            warn!(run = publisher.run, "Session restarted, dropping stale telemetry");
            break;
        }
    }

    info!(run = publisher.run, "Telemetry merge worker stopped");
}

fn join_with_timeout(name: &'static str, handle: JoinHandle<()>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(worker = name, ?timeout, "Worker did not stop in time, abandoning it");
            return;
        }
        thread::sleep(JOIN_POLL);
    }
    if handle.join().is_err() {
        error!(worker = name, "Worker panicked");
    }
}
