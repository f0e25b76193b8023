//! TCP plumbing for peer channels: accept, dial, and the per-channel tasks.
//!
//! Every established connection, whichever side opened it, becomes one
//! channel in [`PeerChannels`] served by two tasks:
//!
//! - a **reader** that decodes frames and hands them to the [`Reconciler`];
//! - a **writer** that drains the channel's queue onto the socket.
//!
//! When either task ends the channel is removed from the set. The writer
//! also ends once the channel is removed, because removal drops the queue's
//! only sender.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use bytes::Bytes;

use crate::framing::{DEFAULT_MAX_FRAME_BYTES, read_frame, write_frame};
use crate::{
    ChannelId, DEFAULT_QUEUE_DEPTH, Direction, GossipError, GossipResult, PeerChannels,
    PeerRegistry, Reconciler,
};

/// Longest pause between two dial attempts.
const MAX_DIAL_BACKOFF: Duration = Duration::from_secs(5);

/// Tunables for the gossip transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GossipSettings {
    /// Frames a channel may have queued before new ones are dropped.
    pub queue_depth: usize,
    /// Largest accepted frame payload.
    pub max_frame_bytes: usize,
    /// Connection attempts per peer at startup.
    pub dial_attempts: u32,
    /// Pause after the first failed attempt; doubles up to a cap.
    pub dial_backoff: Duration,
}

impl Default for GossipSettings {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            dial_attempts: 10,
            dial_backoff: Duration::from_millis(200),
        }
    }
}

/// Shutdown signal shared by all gossip tasks. `true` means stop.
pub type Shutdown = watch::Receiver<bool>;

/// Accepts and dials peer connections and runs their channel tasks.
#[derive(Debug)]
pub struct GossipTransport {
    channels: Arc<PeerChannels>,
    reconciler: Reconciler,
    settings: GossipSettings,
}

impl GossipTransport {
    pub fn new(
        channels: Arc<PeerChannels>,
        reconciler: Reconciler,
        settings: GossipSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            channels,
            reconciler,
            settings,
        })
    }

    pub fn channels(&self) -> &Arc<PeerChannels> {
        &self.channels
    }

    /// Accepts inbound peers on `listener` until shutdown.
    pub fn spawn_listener(
        self: &Arc<Self>,
        listener: TcpListener,
        shutdown: Shutdown,
    ) -> JoinHandle<()> {
        let transport = Arc::clone(self);
        tokio::spawn(async move {
            let mut stop = shutdown.clone();
            if let Ok(addr) = listener.local_addr() {
                info!(%addr, "gossip listener started");
            }
            loop {
                tokio::select! {
                    _ = stopped(&mut stop) => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, addr)) => {
                            let peer = addr.to_string();
                            transport.attach(stream, peer, Direction::Inbound, shutdown.clone());
                        }
                        Err(e) => warn!(error = %e, "gossip accept failed"),
                    },
                }
            }
            info!("gossip listener stopped");
        })
    }

    /// Dials every peer in `registry`, each in its own task.
    pub fn spawn_dialers(
        self: &Arc<Self>,
        registry: &PeerRegistry,
        shutdown: Shutdown,
    ) -> Vec<JoinHandle<()>> {
        registry
            .iter()
            .map(|peer| {
                let transport = Arc::clone(self);
                let addr = peer.gossip.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    let mut stop = shutdown.clone();
                    tokio::select! {
                        _ = stopped(&mut stop) => {}
                        dialed = transport.dial(&addr) => match dialed {
                            Ok(stream) => {
                                transport.attach(stream, addr, Direction::Outbound, shutdown);
                            }
                            Err(e) => warn!(peer = %addr, error = %e, "giving up on peer"),
                        },
                    }
                })
            })
            .collect()
    }

    /// Connects to `addr`, retrying with doubling backoff.
    pub async fn dial(&self, addr: &str) -> GossipResult<TcpStream> {
        let attempts = self.settings.dial_attempts.max(1);
        let mut backoff = self.settings.dial_backoff;

        for attempt in 1..=attempts {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    debug!(peer = %addr, attempt, "dialed peer");
                    return Ok(stream);
                }
                Err(e) => debug!(peer = %addr, attempt, error = %e, "dial failed"),
            }
            if attempt < attempts {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_DIAL_BACKOFF);
            }
        }

        Err(GossipError::Unreachable {
            addr: addr.to_string(),
            attempts,
        })
    }

    /// Registers `stream` as a channel and starts its reader and writer.
    pub fn attach(
        self: &Arc<Self>,
        stream: TcpStream,
        peer: String,
        direction: Direction,
        shutdown: Shutdown,
    ) -> ChannelId {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, error = %e, "could not set TCP_NODELAY");
        }
        let (reader, writer) = stream.into_split();
        let (id, queue) = self.channels.register(peer, direction);

        tokio::spawn(Arc::clone(self).run_writer(id, writer, queue, shutdown.clone()));
        tokio::spawn(Arc::clone(self).run_reader(id, reader, shutdown));
        id
    }

    async fn run_reader(
        self: Arc<Self>,
        id: ChannelId,
        mut reader: OwnedReadHalf,
        mut shutdown: Shutdown,
    ) {
        loop {
            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                frame = read_frame(&mut reader, self.settings.max_frame_bytes) => match frame {
                    Ok(Some(frame)) => {
                        self.reconciler.apply_frame(&frame);
                    }
                    Ok(None) => {
                        debug!(channel = id, "peer closed the connection");
                        break;
                    }
                    Err(e) => {
                        warn!(channel = id, error = %e, "gossip read failed");
                        break;
                    }
                },
            }
        }
        self.channels.remove(id);
    }

    async fn run_writer(
        self: Arc<Self>,
        id: ChannelId,
        mut writer: OwnedWriteHalf,
        mut queue: mpsc::Receiver<Bytes>,
        mut shutdown: Shutdown,
    ) {
        loop {
            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                next = queue.recv() => match next {
                    Some(frame) => {
                        if let Err(e) = write_frame(&mut writer, &frame).await {
                            warn!(channel = id, error = %e, "gossip write failed");
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        self.channels.remove(id);
        let _ = writer.shutdown().await;
    }
}

/// Resolves once shutdown is requested or the signal's sender is gone.
async fn stopped(shutdown: &mut Shutdown) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
