// SPDX-License-Identifier: Apache-2.0
//! The deterministic frame scheduler at the heart of the lockstep core.
//!
//! Every peer runs its own `Scheduler`, fed by the same command stream, and
//! each is expected to reach bit-identical [`Simulation::state_hash`] output
//! on every sync frame. The scheduler never executes simulation logic
//! itself; it only orders events and decides when a frame is safe to
//! deliver.
//!
//! Frame delivery contract
//! - A command queued via [`Scheduler::queue_command`] at frame `F` executes
//!   at frame `F + command_delay`, giving every peer time to hear about it
//!   before it matters.
//! - Within a frame, events are delivered ordered first by origin peer id
//!   ascending, then by the order they were queued — regardless of the
//!   order their `FRAME_DATA` packets arrived on the wire. `BTreeMap` keys
//!   on peer id for exactly this reason.
//! - `step` never errors. Recoverable conditions are outcomes, not
//!   failures: a lagging or silent peer yields `Waiting`, a confirmed state
//!   hash mismatch yields `Desynced`. Only programmer misuse (queuing
//!   before construction, which the type system already forbids) would be
//!   a bug rather than an outcome.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use lockstep_event::Event;
use lockstep_hash::HashRecord;

/// Tunable timing parameters for a [`Scheduler`].
///
/// `timeout_frames` is not consulted by the scheduler itself — peer
/// liveness is a transport concern — but it is kept alongside the other
/// timing knobs because callers configure them together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Frames between queuing a command and its execution.
    pub command_delay: u32,
    /// Frames between state-hash sync checks.
    pub sync_interval: u32,
    /// Maximum frames the local peer may run ahead of the slowest peer's
    /// last reported frame before `step` blocks in `Waiting`.
    pub max_frame_ahead: u32,
    /// Frames of silence from a peer before the transport considers it
    /// timed out.
    pub timeout_frames: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            command_delay: 3,
            sync_interval: 15,
            max_frame_ahead: 10,
            timeout_frames: 90,
        }
    }
}

/// The external collaborator a [`Scheduler`] delivers ordered frames to.
///
/// Implemented by the simulation layer, never by this crate. `execute_frame`
/// applies one frame's worth of ordered events; `state_hash` folds whatever
/// convergence-relevant state the simulation owns (typically via
/// `lockstep_hash::state_hash` over its `lockstep_heap::ObjectHeap`s) into a
/// single CRC-32.
pub trait Simulation {
    /// Apply `events`, already ordered, as frame `frame`.
    fn execute_frame(&mut self, frame: u32, events: &[Event]);

    /// Fold the simulation's convergence-relevant state at `frame`.
    fn state_hash(&mut self, frame: u32) -> u32;
}

/// The result of a single [`Scheduler::step`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// `frame` was delivered to the simulation and the scheduler advanced.
    Advanced {
        /// The frame that was just executed.
        frame: u32,
    },
    /// The scheduler cannot safely advance yet.
    Waiting {
        /// Peers the scheduler is waiting on, ascending by id.
        peers: Vec<u8>,
    },
    /// A state hash mismatch was detected and the session is broken.
    Desynced {
        /// The sync frame at which the mismatch was first detected.
        frame: u32,
        /// The peer whose reported hash first diverged from ours.
        remote: u8,
    },
}

/// Sticky record of a confirmed desync, kept once a mismatch is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesyncInfo {
    /// The sync frame the mismatch was detected at.
    pub frame: u32,
    /// The peer whose reported hash first diverged from ours.
    pub remote: u8,
}

/// A deterministic frame scheduler for one peer in a lockstep session.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    local_peer: u8,
    peers: BTreeSet<u8>,
    current_frame: u32,
    command_buffer: BTreeMap<u32, BTreeMap<u8, Vec<Event>>>,
    peer_frames: BTreeMap<u8, u32>,
    local_pending: BTreeMap<u32, Vec<Event>>,
    hash_log: BTreeMap<u32, BTreeMap<u8, u32>>,
    outgoing: VecDeque<(u32, Vec<Event>)>,
    pending_hashes: VecDeque<HashRecord>,
    desync: Option<DesyncInfo>,
}

/// How far back finished frames and their hash records are kept before
/// being garbage-collected. No peer re-requests history this old.
const RETENTION_FRAMES: u32 = 60;

impl Scheduler {
    /// Builds a scheduler for `local_peer` with the given configuration.
    ///
    /// Frames `0..command_delay` are seeded with an empty local entry (and
    /// queued for broadcast) because the gather step only ever authors the
    /// frame `current_frame + command_delay`; without this seed, no peer's
    /// local entry for those earliest frames would ever be written, and
    /// every scheduler would stall waiting on itself.
    #[must_use]
    pub fn new(local_peer: u8, config: SchedulerConfig) -> Self {
        let mut peers = BTreeSet::new();
        peers.insert(local_peer);

        let mut command_buffer: BTreeMap<u32, BTreeMap<u8, Vec<Event>>> = BTreeMap::new();
        let mut outgoing = VecDeque::new();
        for frame in 0..config.command_delay {
            command_buffer
                .entry(frame)
                .or_default()
                .insert(local_peer, Vec::new());
            outgoing.push_back((frame, Vec::new()));
        }

        let mut peer_frames = BTreeMap::new();
        peer_frames.insert(local_peer, config.command_delay.saturating_sub(1));

        Self {
            config,
            local_peer,
            peers,
            current_frame: 0,
            command_buffer,
            peer_frames,
            local_pending: BTreeMap::new(),
            hash_log: BTreeMap::new(),
            outgoing,
            pending_hashes: VecDeque::new(),
            desync: None,
        }
    }

    /// Builds a scheduler for `local_peer` with [`SchedulerConfig::default`].
    #[must_use]
    pub fn with_default_config(local_peer: u8) -> Self {
        Self::new(local_peer, SchedulerConfig::default())
    }

    /// The frame this scheduler is about to execute.
    #[must_use]
    pub const fn current_frame(&self) -> u32 {
        self.current_frame
    }

    /// The configuration this scheduler was built with.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The sticky desync record, if a mismatch has been detected.
    #[must_use]
    pub const fn desync_info(&self) -> Option<&DesyncInfo> {
        self.desync.as_ref()
    }

    /// The last frame each known peer has reported `FRAME_DATA` for.
    #[must_use]
    pub fn peer_frame(&self, peer: u8) -> Option<u32> {
        self.peer_frames.get(&peer).copied()
    }

    /// Registers a peer as part of this session.
    pub fn add_peer(&mut self, peer: u8) {
        self.peers.insert(peer);
    }

    /// Evicts a peer: its buffered commands are dropped from every frame
    /// still held, and it is excluded from future completeness checks.
    pub fn remove_peer(&mut self, peer: u8) {
        self.peers.remove(&peer);
        self.peer_frames.remove(&peer);
        for entries in self.command_buffer.values_mut() {
            entries.remove(&peer);
        }
        tracing::info!(peer, "peer evicted, buffered commands dropped");
    }

    /// Queues a locally originated command. It will execute at
    /// `current_frame + command_delay` and is broadcast to other peers the
    /// tick that frame becomes the send window.
    pub fn queue_command(&mut self, event: Event) {
        let target_frame = self.current_frame + self.config.command_delay;
        self.local_pending
            .entry(target_frame)
            .or_default()
            .push(event);
    }

    /// Records another peer's `FRAME_DATA` for `frame`. First write wins;
    /// a duplicate (e.g. a datagram-channel retransmit arriving after the
    /// reliable copy) is discarded.
    pub fn receive_frame_data(&mut self, peer: u8, frame: u32, events: Vec<Event>) {
        let frame_entry = self.command_buffer.entry(frame).or_default();
        if frame_entry.contains_key(&peer) {
            tracing::debug!(peer, frame, "duplicate frame data discarded");
            return;
        }
        frame_entry.insert(peer, events);
        let watermark = self.peer_frames.entry(peer).or_insert(0);
        if frame > *watermark {
            *watermark = frame;
        }
    }

    /// Records another peer's sync-check hash for `frame` and compares it
    /// against every hash already on file for that frame. The first
    /// mismatch found sets the sticky desync record.
    pub fn receive_sync_check(&mut self, peer: u8, frame: u32, crc: u32) {
        let frame_log = self.hash_log.entry(frame).or_default();
        if frame_log.contains_key(&peer) {
            tracing::debug!(peer, frame, "duplicate sync check discarded");
            return;
        }
        frame_log.insert(peer, crc);

        if self.desync.is_some() {
            return;
        }
        // Only our own reported hash can anchor a comparison: we have no
        // way to tell which of two disagreeing *other* peers is right.
        let Some(reference_crc) = frame_log.get(&self.local_peer).copied() else {
            return;
        };
        let mismatch = frame_log
            .iter()
            .find(|&(&other_peer, &other_crc)| other_peer != self.local_peer && other_crc != reference_crc);
        if let Some((&remote, _)) = mismatch {
            tracing::error!(frame, remote, "state hash mismatch, session desynced");
            self.desync = Some(DesyncInfo { frame, remote });
        }
    }

    /// Drains `FRAME_DATA` payloads ready for broadcast since the last
    /// call, oldest first.
    pub fn take_outgoing(&mut self) -> Vec<(u32, Vec<Event>)> {
        self.outgoing.drain(..).collect()
    }

    /// Drains this peer's own sync-check hashes ready for broadcast since
    /// the last call, oldest first.
    pub fn take_pending_hashes(&mut self) -> Vec<HashRecord> {
        self.pending_hashes.drain(..).collect()
    }

    /// Clears a sticky desync. Represents the operator intervention the
    /// desync contract requires (e.g. a fresh session after an emergency
    /// save); never called automatically.
    pub fn clear_desync(&mut self) {
        self.desync = None;
    }

    /// Advances the scheduler by at most one frame.
    ///
    /// A desynced scheduler refuses to advance further until
    /// [`Scheduler::clear_desync`] is called; every call until then reports
    /// the original desync frame.
    pub fn step<S: Simulation>(&mut self, sim: &mut S) -> StepOutcome {
        if let Some(info) = &self.desync {
            return StepOutcome::Desynced { frame: info.frame, remote: info.remote };
        }

        self.gather_and_broadcast_local();

        if let Some(waiting) = self.backpressure_wait() {
            return StepOutcome::Waiting { peers: waiting };
        }
        if let Some(waiting) = self.completeness_wait() {
            return StepOutcome::Waiting { peers: waiting };
        }

        let finished_frame = self.current_frame;
        let ordered = self.ordered_events_for(finished_frame);
        sim.execute_frame(finished_frame, &ordered);

        if self.config.sync_interval > 0 && finished_frame.is_multiple_of(self.config.sync_interval)
        {
            let crc = sim.state_hash(finished_frame);
            self.pending_hashes.push_back(HashRecord {
                frame: finished_frame,
                peer: self.local_peer,
                crc,
            });
            self.receive_sync_check(self.local_peer, finished_frame, crc);
        }

        self.retire_stale_history(finished_frame);
        self.current_frame += 1;
        tracing::trace!(frame = finished_frame, "frame advanced");

        if let Some(info) = &self.desync {
            return StepOutcome::Desynced { frame: info.frame, remote: info.remote };
        }
        StepOutcome::Advanced {
            frame: finished_frame,
        }
    }

    /// Idempotent per send frame: `step` may be called repeatedly while
    /// `Waiting`, and the local frame must be broadcast exactly once.
    fn gather_and_broadcast_local(&mut self) {
        let send_frame = self.current_frame + self.config.command_delay;
        let already_sent = self
            .command_buffer
            .get(&send_frame)
            .is_some_and(|peers| peers.contains_key(&self.local_peer));
        if already_sent {
            return;
        }
        let outgoing_events = self.local_pending.remove(&send_frame).unwrap_or_default();
        self.command_buffer
            .entry(send_frame)
            .or_default()
            .insert(self.local_peer, outgoing_events.clone());
        self.peer_frames.insert(self.local_peer, send_frame);
        self.outgoing.push_back((send_frame, outgoing_events));
    }

    fn backpressure_wait(&self) -> Option<Vec<u8>> {
        let remote_peers: Vec<u8> = self.peers.iter().copied().filter(|&peer| peer != self.local_peer).collect();
        if remote_peers.is_empty() {
            return None;
        }

        let min_reported = remote_peers
            .iter()
            .map(|peer| self.peer_frames.get(peer).copied().unwrap_or(0))
            .min()
            .unwrap_or(0);
        if self.current_frame.saturating_sub(min_reported) < self.config.max_frame_ahead {
            return None;
        }

        let mut waiting: Vec<u8> = remote_peers
            .into_iter()
            .filter(|peer| self.peer_frames.get(peer).copied().unwrap_or(0) == min_reported)
            .collect();
        waiting.sort_unstable();
        tracing::debug!(frame = self.current_frame, ?waiting, "backpressure wait");
        Some(waiting)
    }

    fn completeness_wait(&self) -> Option<Vec<u8>> {
        let filed: BTreeSet<u8> = self
            .command_buffer
            .get(&self.current_frame)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default();
        let mut missing: Vec<u8> = self
            .peers
            .iter()
            .copied()
            .filter(|peer| !filed.contains(peer))
            .collect();
        if missing.is_empty() {
            return None;
        }
        missing.sort_unstable();
        tracing::trace!(frame = self.current_frame, ?missing, "awaiting frame data");
        Some(missing)
    }

    fn ordered_events_for(&self, frame: u32) -> Vec<Event> {
        self.command_buffer
            .get(&frame)
            .into_iter()
            .flat_map(|peers| peers.values())
            .flat_map(|events| events.iter().copied())
            .collect()
    }

    fn retire_stale_history(&mut self, finished_frame: u32) {
        let gc_floor = finished_frame.saturating_sub(RETENTION_FRAMES);
        self.command_buffer.retain(|&frame, _| frame >= gc_floor);
        self.hash_log.retain(|&frame, _| frame >= gc_floor);
    }
}

#[cfg(test)]
mod tests {
    use super::{DesyncInfo, Scheduler, SchedulerConfig, Simulation, StepOutcome};
    use lockstep_event::{Event, EventBody, EventHeader};

    #[derive(Default)]
    struct RecordingSim {
        delivered: Vec<(u32, Vec<Event>)>,
        hash_override: Option<u32>,
    }

    impl Simulation for RecordingSim {
        fn execute_frame(&mut self, frame: u32, events: &[Event]) {
            self.delivered.push((frame, events.to_vec()));
        }

        fn state_hash(&mut self, _frame: u32) -> u32 {
            self.hash_override.unwrap_or(0xABCD_1234)
        }
    }

    fn make_event(frame: u32, peer: u8) -> Event {
        Event {
            header: EventHeader {
                frame,
                origin_peer: peer,
                peer_metadata: 0,
            },
            body: EventBody::Idle {
                target: lockstep_ident::TargetHandle::NONE,
            },
        }
    }

    #[test]
    fn lone_peer_advances_through_bootstrap_frames() {
        let mut sched = Scheduler::with_default_config(0);
        let mut sim = RecordingSim::default();
        for expected in 0..3 {
            assert_eq!(sched.step(&mut sim), StepOutcome::Advanced { frame: expected });
        }
    }

    #[test]
    fn two_peer_session_delivers_queued_command_after_command_delay() {
        let config = SchedulerConfig {
            command_delay: 3,
            sync_interval: 15,
            max_frame_ahead: 10,
            timeout_frames: 90,
        };
        let mut a = Scheduler::new(0, config);
        a.add_peer(1);
        let mut sim = RecordingSim::default();

        a.queue_command(make_event(0, 0));
        // Peer 1 never queues anything but must still file FRAME_DATA for
        // every frame or peer 0 stalls waiting on it.
        for frame in 0..4 {
            a.receive_frame_data(1, frame, Vec::new());
        }

        for expected in 0..4u32 {
            assert_eq!(a.step(&mut sim), StepOutcome::Advanced { frame: expected });
        }
        let (frame, events) = &sim.delivered[3];
        assert_eq!(*frame, 3);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].header.origin_peer, 0);
    }

    #[test]
    fn missing_peer_data_blocks_with_waiting() {
        let mut a = Scheduler::with_default_config(0);
        a.add_peer(1);
        let mut sim = RecordingSim::default();
        assert_eq!(
            a.step(&mut sim),
            StepOutcome::Waiting { peers: vec![1] }
        );
    }

    #[test]
    fn backpressure_blocks_then_clears() {
        let config = SchedulerConfig {
            command_delay: 0,
            sync_interval: 15,
            max_frame_ahead: 2,
            timeout_frames: 90,
        };
        let mut a = Scheduler::new(0, config);
        a.add_peer(1);
        let mut sim = RecordingSim::default();

        // Advance A to frame 7 by feeding peer 1's data each tick, but stop
        // reporting once peer 1 is 2 frames behind.
        for frame in 0..5 {
            a.receive_frame_data(1, frame, Vec::new());
            assert_eq!(a.step(&mut sim), StepOutcome::Advanced { frame });
        }
        a.receive_frame_data(1, 5, Vec::new());
        assert_eq!(a.step(&mut sim), StepOutcome::Advanced { frame: 5 });
        // peer 1 last reported frame 5; current_frame is now 6, diff is 1.
        assert_eq!(a.step(&mut sim), StepOutcome::Waiting { peers: vec![1] });

        a.receive_frame_data(1, 6, Vec::new());
        assert_eq!(a.step(&mut sim), StepOutcome::Advanced { frame: 6 });
    }

    #[test]
    fn desync_is_sticky_until_cleared() {
        let mut a = Scheduler::with_default_config(0);
        let mut sim = RecordingSim::default();
        for _ in 0..15 {
            let _ = a.step(&mut sim);
        }
        // Frame 30 is a future sync boundary the scheduler hasn't reached
        // yet; inject both peers' hashes for it directly.
        a.receive_sync_check(0, 30, 0x1111_1111);
        a.receive_sync_check(1, 30, 0x2222_2222);
        assert_eq!(
            a.desync_info(),
            Some(&DesyncInfo {
                frame: 30,
                remote: 1
            })
        );
        assert_eq!(a.step(&mut sim), StepOutcome::Desynced { frame: 30, remote: 1 });
        a.clear_desync();
        assert!(a.desync_info().is_none());
    }

    #[test]
    fn duplicate_frame_data_is_discarded_not_overwritten() {
        let mut a = Scheduler::with_default_config(0);
        a.add_peer(1);
        a.receive_frame_data(1, 0, vec![make_event(0, 1)]);
        a.receive_frame_data(1, 0, Vec::new());
        let events = a.ordered_events_for(0);
        assert_eq!(events.iter().filter(|e| e.header.origin_peer == 1).count(), 1);
    }

    #[test]
    fn remove_peer_drops_its_buffered_commands() {
        let mut a = Scheduler::with_default_config(0);
        a.add_peer(1);
        a.receive_frame_data(1, 4, vec![make_event(4, 1)]);
        a.remove_peer(1);
        assert!(a.command_buffer.get(&4).is_some_and(|m| !m.contains_key(&1)));
    }
}
