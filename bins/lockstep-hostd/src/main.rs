// SPDX-License-Identifier: Apache-2.0
//! Headless host process for a lockstep multiplayer session.
//!
//! Wires the transport, wire protocol, session/lobby state, and frame
//! scheduler into one tick loop. The simulation itself is out of scope
//! here — [`NullSimulation`] stands in for whatever game logic a real
//! engine plugs in through [`lockstep_sched::Simulation`].

use anyhow::{Context, Result};
use lockstep_app_core::{ConfigService, HostPrefs, HOST_PREFS_KEY};
use lockstep_config_fs::FsConfigStore;
use lockstep_event::Event;
use lockstep_hash::{FoldState, StateFolder};
use lockstep_net::{PeerEvent, Transport, TransportConfig};
use lockstep_proto::{
    DesyncDetectedPayload, FrameDataPayload, GameSettingsPayload, Packet, PlayerJoinPayload,
    PlayerLeavePayload, PlayerReadyPayload, SyncCheckPayload,
};
use lockstep_sched::{Scheduler, SchedulerConfig, Simulation, StepOutcome};
use lockstep_session::{GameType, RosterEntry, Session, SessionEvent};
use tracing::{info, warn};

/// Stands in for a real game simulation: folds only the frame counter and
/// the count of events it has ever executed, enough to exercise the
/// scheduler's convergence contract without any actual gameplay state.
#[derive(Default)]
struct NullSimulation {
    events_applied: u64,
}

impl FoldState for NullSimulation {
    fn fold_state(&self, folder: &mut StateFolder) {
        folder.write_u64(self.events_applied);
    }
}

impl Simulation for NullSimulation {
    fn execute_frame(&mut self, _frame: u32, events: &[Event]) {
        self.events_applied += events.len() as u64;
    }

    fn state_hash(&mut self, _frame: u32) -> u32 {
        lockstep_hash::state_hash([&*self as &dyn FoldState])
    }
}

fn session_event_to_packet(event: &SessionEvent) -> Packet {
    match event {
        SessionEvent::PeerJoined(entry) => {
            Packet::PlayerJoin(PlayerJoinPayload { entry: entry.clone() })
        }
        SessionEvent::PeerLeft(peer_id) => {
            Packet::PlayerLeave(PlayerLeavePayload { peer_id: *peer_id })
        }
        SessionEvent::ReadyChanged { peer_id, ready } => {
            Packet::PlayerReady(PlayerReadyPayload { peer_id: *peer_id, ready: *ready })
        }
        SessionEvent::OptionsChanged(options) => {
            Packet::GameSettings(GameSettingsPayload { options: options.clone() })
        }
    }
}

fn broadcast_to_roster(transport: &Transport, session: &Session, packet: &Packet) {
    match packet.encode() {
        Ok(bytes) => {
            for peer in session.roster().map(|r| r.peer_id).collect::<Vec<_>>() {
                transport.send(peer, &bytes);
            }
        }
        Err(err) => warn!(?err, kind = ?packet.kind(), "failed to encode packet for broadcast"),
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config: Option<ConfigService<FsConfigStore>> =
        FsConfigStore::new().map(ConfigService::new).ok();

    let prefs: HostPrefs = config
        .as_ref()
        .and_then(|c| c.load::<HostPrefs>(HOST_PREFS_KEY).ok().flatten())
        .unwrap_or_default();

    if let Some(cfg) = &config {
        let _ = cfg.save(HOST_PREFS_KEY, &prefs);
    }

    let bind_addr = prefs
        .bind_address
        .parse()
        .context("invalid bind_address in host prefs")?;
    let transport_config = TransportConfig {
        bind_addr,
        datagram_bind_addr: "0.0.0.0:0".parse().context("invalid datagram bind addr")?,
        frame_rate: prefs.frame_rate,
        timeout_frames: SchedulerConfig::default().timeout_frames,
    };

    let mut transport = Transport::bind(transport_config).await?;
    info!(addr = %transport.local_addr(), "lockstep host listening");

    let mut session = Session::new(rand_session_id(), GameType::Multiplayer, 0, 0, 0);
    session
        .add_peer(RosterEntry::new(0, "Host", 0, 0))
        .context("host could not join its own roster")?;

    let mut scheduler = Scheduler::with_default_config(0);
    let mut sim = NullSimulation::default();

    let tick = std::time::Duration::from_secs_f64(1.0 / f64::from(prefs.frame_rate.max(1)));
    let mut interval = tokio::time::interval(tick);

    loop {
        interval.tick().await;

        let (messages, events) = transport.poll();

        for event in events {
            match event {
                PeerEvent::Connected { peer, addr } => {
                    info!(peer, %addr, "peer connected");
                    scheduler.add_peer(peer);
                    let name = format!("Player{peer}");
                    if let Err(err) = session.add_peer(RosterEntry::new(peer, &name, 0, peer)) {
                        warn!(?err, peer, "could not add peer to roster");
                    }
                }
                PeerEvent::Disconnected { peer } | PeerEvent::TimedOut { peer } => {
                    info!(peer, "peer left");
                    scheduler.remove_peer(peer);
                    session.remove_peer(peer);
                }
            }
        }

        for message in messages {
            match Packet::decode(&message.bytes) {
                Ok((Packet::FrameData(payload), _)) => {
                    scheduler.receive_frame_data(message.peer, payload.frame, payload.events);
                }
                Ok((Packet::SyncCheck(payload), _)) => {
                    scheduler.receive_sync_check(message.peer, payload.frame, payload.crc);
                }
                Ok((other, _)) => {
                    warn!(peer = message.peer, kind = ?other.kind(), "unexpected packet on frame channel");
                }
                Err(err) => {
                    warn!(?err, peer = message.peer, "failed to decode packet");
                }
            }
        }

        for session_event in session.take_pending() {
            let packet = session_event_to_packet(&session_event);
            broadcast_to_roster(&transport, &session, &packet);
        }

        match scheduler.step(&mut sim) {
            StepOutcome::Advanced { frame } => {
                tracing::trace!(frame, "frame advanced");
                for (out_frame, out_events) in scheduler.take_outgoing() {
                    let packet = Packet::FrameData(FrameDataPayload {
                        frame: out_frame,
                        events: out_events,
                    });
                    broadcast_to_roster(&transport, &session, &packet);
                }
                for record in scheduler.take_pending_hashes() {
                    let packet = Packet::SyncCheck(SyncCheckPayload {
                        frame: record.frame,
                        crc: record.crc,
                    });
                    broadcast_to_roster(&transport, &session, &packet);
                }
            }
            StepOutcome::Waiting { peers } => {
                tracing::debug!(?peers, "scheduler waiting on peers");
            }
            StepOutcome::Desynced { frame, remote } => {
                warn!(frame, remote, "session desynced");
                let packet =
                    Packet::DesyncDetected(DesyncDetectedPayload { frame, remote_peer: remote });
                broadcast_to_roster(&transport, &session, &packet);
            }
        }
    }
}

fn rand_session_id() -> u32 {
    // A session id only needs to be unlikely to collide between hosts on
    // the same network, never cryptographically unpredictable: fold wall
    // clock nanos in with the PID so two hosts launched together by the
    // same init system don't collide on PID alone.
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    nanos ^ std::process::id()
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_session::OptionValue;

    #[test]
    fn peer_joined_becomes_a_player_join_packet() {
        let entry = RosterEntry::new(3, "Scrin", 2, 1);
        let packet = session_event_to_packet(&SessionEvent::PeerJoined(entry.clone()));
        assert_eq!(packet.kind(), lockstep_proto::PacketKind::PlayerJoin);
        assert!(matches!(packet, Packet::PlayerJoin(payload) if payload.entry == entry));
    }

    #[test]
    fn options_changed_becomes_a_game_settings_packet() {
        let mut options = lockstep_session::GameOptions::default();
        options.apply("credits", OptionValue::U32(5_000)).unwrap();
        let packet = session_event_to_packet(&SessionEvent::OptionsChanged(options));
        assert_eq!(packet.kind(), lockstep_proto::PacketKind::GameSettings);
    }

    #[test]
    fn null_simulation_folds_the_events_it_has_applied() {
        let mut sim = NullSimulation::default();
        assert_eq!(sim.state_hash(0), NullSimulation::default().state_hash(0));
        sim.execute_frame(0, &[]);
        assert_eq!(sim.events_applied, 0);
    }
}
