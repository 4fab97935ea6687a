//! UDP packet receiver
//!
//! Owns the session's socket and the frame assembler. One datagram at a time it
//! parses the header, decodes telemetry from the first packet of each frame and
//! feeds the JPEG fragment to the assembler. Completed frames go to the raw-frame
//! channel, partial telemetry to the telemetry channel.
//!
//! Nothing a datagram contains can stop the loop: malformed packets are counted and
//! skipped. The loop ends when its cancellation token fires, noticed at the latest
//! one socket read timeout later. The socket closes when the receiver is dropped.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::channel::BoundedChannel;
use crate::protocol::{RtpFrameAssembler, RtpPacket, TelemetryExtractor};
use crate::types::{Frame, Telemetry};
use crate::{LiveViewConfig, LiveViewError, Result};

/// Pause after an unexpected socket error so a broken socket cannot spin the thread.
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Consecutive socket errors logged at `error!` before going quiet.
const MAX_LOGGED_ERRORS: u32 = 10;

/// Pipeline counters shared between the receiver thread and the session.
#[derive(Debug, Default)]
pub struct ReceiverStats {
    packets_received: AtomicU64,
    packets_malformed: AtomicU64,
    frames_completed: AtomicU64,
    frames_discarded: AtomicU64,
    frames_dropped: AtomicU64,
    telemetry_updates: AtomicU64,
}

/// Point-in-time copy of [`ReceiverStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub packets_received: u64,
    /// Datagrams shorter than the header or with an overrunning extension.
    pub packets_malformed: u64,
    pub frames_completed: u64,
    /// Frames started but never confirmed complete.
    pub frames_discarded: u64,
    /// Complete frames evicted from the raw-frame channel before decoding.
    pub frames_dropped: u64,
    pub telemetry_updates: u64,
}

impl ReceiverStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_malformed: self.packets_malformed.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            telemetry_updates: self.telemetry_updates.load(Ordering::Relaxed),
        }
    }

    fn add(counter: &AtomicU64, n: u64) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }
}

/// Where the receiver publishes its results.
#[derive(Debug, Clone)]
pub struct ReceiverOutputs {
    pub raw_frames: Arc<BoundedChannel<Frame>>,
    pub telemetry: Arc<BoundedChannel<Telemetry>>,
    pub stats: Arc<ReceiverStats>,
}

/// Bind a UDP socket with address reuse and a read timeout.
pub fn bind_socket(addr: SocketAddr, read_timeout: Duration) -> Result<UdpSocket> {
    let bind = || -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        let socket: UdpSocket = socket.into();
        socket.set_read_timeout(Some(read_timeout))?;
        Ok(socket)
    };
    bind().map_err(|e| LiveViewError::transport_failed(addr, e))
}

pub struct PacketReceiver {
    socket: UdpSocket,
    local_addr: SocketAddr,
    assembler: RtpFrameAssembler,
    last_timestamp: Option<u32>,
    max_datagram_bytes: usize,
    outputs: ReceiverOutputs,
}

impl PacketReceiver {
    /// Bind the socket for `port` on the configured address.
    ///
    /// A bind failure is returned as [`LiveViewError::Transport`].
    pub fn bind(config: &LiveViewConfig, port: u16, outputs: ReceiverOutputs) -> Result<Self> {
        let ip = config
            .bind_address
            .parse()
            .map_err(|_| LiveViewError::config_invalid("bind_address", config.bind_address.clone()))?;
        let addr = SocketAddr::new(ip, port);
        let socket = bind_socket(addr, config.recv_timeout())?;
        let local_addr = socket.local_addr().unwrap_or(addr);

        info!(%local_addr, "Live-view socket bound");
        Ok(Self {
            socket,
            local_addr,
            assembler: RtpFrameAssembler::new(config.max_frame_bytes),
            last_timestamp: None,
            max_datagram_bytes: config.max_datagram_bytes,
            outputs,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the receive loop on a named thread.
    pub fn spawn(self, cancel: CancellationToken) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("liveview-receiver".to_string())
            .spawn(move || self.run(cancel))
            .map_err(|e| LiveViewError::worker_spawn_failed("receiver", e))
    }

    /// Blocking receive loop; returns once `cancel` fires.
    pub fn run(mut self, cancel: CancellationToken) {
        info!(addr = %self.local_addr, "Packet receiver started");
        let mut buffer = vec![0u8; self.max_datagram_bytes];
        let mut consecutive_errors = 0u32;

        while !cancel.is_cancelled() {
            let len = match self.socket.recv_from(&mut buffer) {
                Ok((len, _source)) => len,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors <= MAX_LOGGED_ERRORS {
                        error!(error = %e, consecutive_errors, "UDP receive failed");
                    }
                    thread::sleep(ERROR_BACKOFF);
                    continue;
                }
            };
            consecutive_errors = 0;
            self.handle_datagram(&buffer[..len]);
        }

        let stats = self.outputs.stats.snapshot();
        info!(
            packets = stats.packets_received,
            frames = stats.frames_completed,
            discarded = stats.frames_discarded,
            "Packet receiver stopped"
        );
    }

    /// Process one datagram.
    pub fn handle_datagram(&mut self, datagram: &[u8]) {
        let stats = &self.outputs.stats;
        ReceiverStats::add(&stats.packets_received, 1);

        let packet = match RtpPacket::parse(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                ReceiverStats::add(&stats.packets_malformed, 1);
                warn!(error = %e, "Dropping malformed packet");
                return;
            }
        };

        // Telemetry only rides on the first packet of each frame.
        if self.last_timestamp != Some(packet.timestamp) {
            self.last_timestamp = Some(packet.timestamp);
            if let Some(block) = packet.extension {
                let update = TelemetryExtractor::parse(block);
                if !update.is_empty() {
                    trace!(timestamp = packet.timestamp, ?update, "Telemetry decoded");
                    ReceiverStats::add(&stats.telemetry_updates, 1);
                    // Partial updates are folded, never evicted, or their fields would be lost.
                    if self.outputs.telemetry.push_folding(update, |older, newer| newer.merge_under(older)) {
                        debug!(timestamp = packet.timestamp, "Merge behind, folded oldest telemetry update");
                    }
                }
            }
        }

        let discarded_before = self.assembler.frames_discarded();
        let frames = self.assembler.push(packet.timestamp, packet.marker, packet.payload);
        ReceiverStats::add(&stats.frames_discarded, self.assembler.frames_discarded() - discarded_before);
        ReceiverStats::add(&stats.frames_completed, frames.len() as u64);

        for frame in frames {
            trace!(timestamp = frame.timestamp(), bytes = frame.len(), "Frame assembled");
            if let Some(evicted) = self.outputs.raw_frames.push(frame) {
                ReceiverStats::add(&stats.frames_dropped, 1);
                debug!(timestamp = evicted.timestamp(), "Decoder behind, dropped oldest raw frame");
            }
        }
    }
}
