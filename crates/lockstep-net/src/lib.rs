// SPDX-License-Identifier: Apache-2.0
//! Reliable and datagram transport for the lockstep multiplayer core.
//!
//! [`Transport`] owns two non-blocking channels per peer endpoint: a
//! reliable TCP stream (HELLO/WELCOME/REJECT, lobby chatter, FRAME_DATA,
//! SYNC_CHECK, GAME_START, disconnect — exactly-once, in-order per peer)
//! and an optional UDP datagram socket (duplicated FRAME_DATA for
//! latency; at-most-once, unordered, never required for correctness).
//!
//! The only blocking call anywhere in this crate lives inside the
//! background accept/reader/writer tasks `Transport::bind` spawns.
//! [`Transport::poll`] itself never blocks: a typical host loop is
//! `poll_transport(); step(); render()`, ticking `poll` once per frame.

mod error;
mod reliable;

pub use error::TransportError;

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::mpsc;

use reliable::InternalEvent;

/// A peer's compact id, 0..=15 — matches the 4-bit `origin_peer` field
/// every [`lockstep_event::EventHeader`] carries.
pub type PeerId = u8;

/// Upper bound on concurrently connected peers, matching [`PeerId`]'s range.
pub const MAX_PEERS: usize = 16;

/// How often the reliable channel sends an empty heartbeat frame.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Tunable parameters for a [`Transport`].
#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    /// Address the reliable (TCP) listener binds to.
    pub bind_addr: SocketAddr,
    /// Address the datagram (UDP) socket binds to.
    pub datagram_bind_addr: SocketAddr,
    /// The simulation's configured frame rate, used to convert
    /// `timeout_frames` into wall-clock time.
    pub frame_rate: u32,
    /// Frames of silence tolerated before a peer is evicted.
    pub timeout_frames: u32,
}

/// Something that happened to a peer connection since the last [`Transport::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEvent {
    /// A new peer connected and was assigned an id.
    Connected {
        /// The assigned peer id.
        peer: PeerId,
        /// Its reliable-channel address.
        addr: SocketAddr,
    },
    /// A peer's reliable channel closed.
    Disconnected {
        /// The peer that disconnected.
        peer: PeerId,
    },
    /// A peer went silent beyond `timeout_frames` and was evicted.
    TimedOut {
        /// The evicted peer.
        peer: PeerId,
    },
}

/// A complete frame received from a peer. An empty `bytes` is a
/// heartbeat, not a protocol packet — callers should not hand it to
/// [`lockstep_proto::Packet::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// The peer this frame arrived from.
    pub peer: PeerId,
    /// The frame's payload, with the length prefix already stripped.
    pub bytes: Vec<u8>,
}

struct PeerHandle {
    conn_id: u64,
    addr: SocketAddr,
    writer_tx: mpsc::Sender<Vec<u8>>,
    last_received: Instant,
}

/// Reliable + datagram transport for one host's view of a lockstep session.
pub struct Transport {
    config: TransportConfig,
    local_addr: SocketAddr,
    events_rx: mpsc::UnboundedReceiver<InternalEvent>,
    peers: BTreeMap<PeerId, PeerHandle>,
    conn_to_peer: BTreeMap<u64, PeerId>,
    datagram: Option<UdpSocket>,
    datagram_peers: BTreeMap<SocketAddr, PeerId>,
    last_heartbeat: Instant,
}

impl Transport {
    /// Bind the reliable listener and the datagram socket, and spawn the
    /// background accept loop. Returns immediately; connections are
    /// accepted in the background and surfaced through [`Transport::poll`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if either socket fails to bind.
    pub async fn bind(config: TransportConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let datagram = UdpSocket::bind(config.datagram_bind_addr).await?;

        let (tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(reliable::accept_loop(listener, tx));

        Ok(Self {
            config,
            local_addr,
            events_rx,
            peers: BTreeMap::new(),
            conn_to_peer: BTreeMap::new(),
            datagram: Some(datagram),
            datagram_peers: BTreeMap::new(),
            last_heartbeat: Instant::now(),
        })
    }

    /// The reliable channel's bound local address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Associate a peer with the datagram address it will send from, so
    /// inbound UDP packets can be attributed once the peer's HELLO has
    /// reported its datagram port.
    pub fn register_datagram_addr(&mut self, peer: PeerId, addr: SocketAddr) {
        self.datagram_peers.insert(addr, peer);
    }

    /// Send a frame to one peer on the reliable channel. Silently dropped
    /// if the peer is no longer connected (a poll on the same tick will
    /// have already surfaced its disconnection).
    pub fn send(&self, peer: PeerId, bytes: &[u8]) {
        if let Some(handle) = self.peers.get(&peer) {
            let framed = reliable::frame(bytes);
            if handle.writer_tx.try_send(framed).is_err() {
                tracing::debug!(peer, "reliable send dropped: writer backed up or closed");
            }
        }
    }

    /// Send a datagram to one peer, best-effort. No-op if the peer's
    /// datagram address hasn't been registered.
    pub fn send_datagram(&self, peer: PeerId, bytes: &[u8]) {
        let Some(socket) = &self.datagram else { return };
        let Some((&addr, _)) = self.datagram_peers.iter().find(|(_, &p)| p == peer) else {
            return;
        };
        match socket.try_send_to(bytes, addr) {
            Ok(_) | Err(_) => {}
        }
    }

    fn assign_peer_id(&self) -> Option<PeerId> {
        (0..MAX_PEERS as u8).find(|id| !self.peers.contains_key(id))
    }

    fn evict(&mut self, peer: PeerId, events: &mut Vec<PeerEvent>) {
        if let Some(handle) = self.peers.remove(&peer) {
            self.conn_to_peer.remove(&handle.conn_id);
            self.datagram_peers.retain(|_, p| *p != peer);
            events.push(PeerEvent::Disconnected { peer });
        }
    }

    fn timeout_threshold(&self) -> Duration {
        let frames = f64::from(self.config.timeout_frames);
        let rate = f64::from(self.config.frame_rate.max(1));
        Duration::from_secs_f64(frames / rate)
    }

    fn check_timeouts(&mut self, events: &mut Vec<PeerEvent>) {
        let threshold = self.timeout_threshold();
        let now = Instant::now();
        let timed_out: Vec<PeerId> = self
            .peers
            .iter()
            .filter(|(_, handle)| now.duration_since(handle.last_received) > threshold)
            .map(|(&peer, _)| peer)
            .collect();
        for peer in timed_out {
            tracing::error!(peer, "peer timed out");
            self.peers.remove(&peer);
            events.push(PeerEvent::TimedOut { peer });
        }
    }

    fn run_heartbeat(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_heartbeat) < HEARTBEAT_INTERVAL {
            return;
        }
        self.last_heartbeat = now;
        let peers: Vec<PeerId> = self.peers.keys().copied().collect();
        for peer in peers {
            self.send(peer, &[]);
        }
    }

    fn drain_datagrams(&mut self, messages: &mut Vec<ReceivedMessage>) {
        let Some(socket) = &self.datagram else { return };
        let mut buf = [0u8; lockstep_proto::MAX_FRAME_LEN];
        loop {
            match socket.try_recv_from(&mut buf) {
                Ok((n, addr)) => {
                    if let Some(&peer) = self.datagram_peers.get(&addr) {
                        messages.push(ReceivedMessage { peer, bytes: buf[..n].to_vec() });
                    } else {
                        tracing::debug!(%addr, "datagram from unregistered address, dropped");
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    tracing::warn!(?err, "datagram recv error");
                    break;
                }
            }
        }
    }

    /// Drain everything that happened on the transport since the last
    /// call: accepted connections, complete frames, disconnects, and
    /// timeouts. Never blocks.
    pub fn poll(&mut self) -> (Vec<ReceivedMessage>, Vec<PeerEvent>) {
        let mut messages = Vec::new();
        let mut events = Vec::new();

        while let Ok(internal) = self.events_rx.try_recv() {
            match internal {
                InternalEvent::Accepted { conn_id, addr, writer_tx } => match self.assign_peer_id() {
                    Some(peer) => {
                        self.peers.insert(
                            peer,
                            PeerHandle { conn_id, addr, writer_tx, last_received: Instant::now() },
                        );
                        self.conn_to_peer.insert(conn_id, peer);
                        tracing::info!(peer, %addr, "peer connected");
                        events.push(PeerEvent::Connected { peer, addr });
                    }
                    None => {
                        tracing::warn!(%addr, "rejecting connection: peer table full");
                    }
                },
                InternalEvent::Data { conn_id, bytes } => {
                    if let Some(&peer) = self.conn_to_peer.get(&conn_id) {
                        if let Some(handle) = self.peers.get_mut(&peer) {
                            handle.last_received = Instant::now();
                        }
                        if !bytes.is_empty() {
                            messages.push(ReceivedMessage { peer, bytes });
                        }
                    }
                }
                InternalEvent::Closed { conn_id } => {
                    if let Some(peer) = self.conn_to_peer.remove(&conn_id) {
                        self.evict(peer, &mut events);
                    }
                }
            }
        }

        self.drain_datagrams(&mut messages);
        self.check_timeouts(&mut events);
        self.run_heartbeat();

        (messages, events)
    }
}
