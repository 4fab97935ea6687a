//! Live-view probe
//!
//! Listens for a camera live-view stream without controlling the camera, and logs
//! frames, telemetry changes and stream health. Point the camera at the printed
//! port with its own app or an HTTP request.
//!
//! ## Usage
//!
//! ```bash
//! # Random port from the configured range, run until interrupted
//! liveview-probe
//!
//! # Fixed port and quality, YAML config, stop after 30 seconds
//! liveview-probe --port 49152 --quality 1280x0960 --config liveview.yaml --seconds 30
//!
//! # Per-datagram tracing
//! RUST_LOG=liveview=trace liveview-probe
//! ```

use anyhow::{Context, Result, bail};
use liveview::{HealthStatus, LiveViewConfig, LiveViewSession, PassiveControl, QualityProfile, Telemetry};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// UI tick of a 60Hz display loop.
const TICK: Duration = Duration::from_millis(16);
const REPORT_EVERY: Duration = Duration::from_secs(1);

struct Args {
    port: Option<u16>,
    config: Option<PathBuf>,
    seconds: Option<u64>,
    quality: Option<QualityProfile>,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut args = Self { port: None, config: None, seconds: None, quality: None };
        let mut iter = std::env::args().skip(1);

        while let Some(flag) = iter.next() {
            let mut value = || iter.next().with_context(|| format!("{flag} requires a value"));
            match flag.as_str() {
                "--port" => args.port = Some(value()?.parse().context("Invalid --port")?),
                "--config" => args.config = Some(PathBuf::from(value()?)),
                "--seconds" => args.seconds = Some(value()?.parse().context("Invalid --seconds")?),
                "--quality" => args.quality = Some(value()?.parse().context("Invalid --quality")?),
                other => bail!("Unknown argument: {other}"),
            }
        }
        Ok(args)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("liveview=info".parse().context("Invalid log directive")?),
        )
        .init();

    let args = Args::parse()?;

    let mut config = match &args.config {
        Some(path) => LiveViewConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => LiveViewConfig::default(),
    };
    if let Some(port) = args.port {
        config.port_range = [port, port];
    }
    let quality = args.quality.unwrap_or(config.quality);

    let mut session = LiveViewSession::new(config, PassiveControl).context("Invalid configuration")?;
    let port = session.start(quality).context("Failed to start live view")?;
    info!(port, %quality, "Listening for live view");

    let deadline = args.seconds.map(|s| Instant::now() + Duration::from_secs(s));
    let mut last_report = Instant::now();
    let mut last_telemetry = Arc::new(Telemetry::default());
    let mut frames = 0u64;

    while deadline.is_none_or(|d| Instant::now() < d) {
        if let Some(frame) = session.poll_frame() {
            frames += 1;
            if frames == 1 {
                info!(width = frame.width(), height = frame.height(), "First frame decoded");
            }
        }

        let telemetry = session.telemetry_snapshot();
        if telemetry != last_telemetry {
            let summary: Vec<String> = telemetry.fields().into_iter().map(|(_, value)| value).collect();
            info!(telemetry = %summary.join("  "), "Telemetry changed");
            last_telemetry = telemetry;
        }

        if last_report.elapsed() >= REPORT_EVERY {
            let health = session.health();
            let stats = session.stats();
            let message = health.message.as_deref().unwrap_or("healthy");
            let decode_avg = health.processing_time.avg;
            match health.status {
                HealthStatus::Ok => info!(fps = health.fps, frames, ?decode_avg, ?stats, "{message}"),
                _ => warn!(
                    fps = health.fps,
                    error_rate = health.error_rate,
                    missed = health.missed_frames,
                    ?decode_avg,
                    ?stats,
                    "{message}"
                ),
            }
            last_report = Instant::now();
        }

        std::thread::sleep(TICK);
    }

    session.stop();
    info!(frames, "Probe finished");
    Ok(())
}
