#![allow(missing_docs)]
//! A session's queued [`SessionEvent`]s translate into the packets a host
//! would actually broadcast, and those packets survive the wire.

use lockstep_proto::{
    GameSettingsPayload, Packet, PlayerJoinPayload, PlayerLeavePayload, PlayerReadyPayload,
};
use lockstep_session::{GameType, OptionValue, RosterEntry, Session, SessionEvent};

fn packet_for(event: &SessionEvent) -> Packet {
    match event {
        SessionEvent::PeerJoined(entry) => Packet::PlayerJoin(PlayerJoinPayload { entry: entry.clone() }),
        SessionEvent::PeerLeft(peer_id) => Packet::PlayerLeave(PlayerLeavePayload { peer_id: *peer_id }),
        SessionEvent::ReadyChanged { peer_id, ready } => {
            Packet::PlayerReady(PlayerReadyPayload { peer_id: *peer_id, ready: *ready })
        }
        SessionEvent::OptionsChanged(options) => {
            Packet::GameSettings(GameSettingsPayload { options: *options })
        }
    }
}

#[test]
fn lobby_session_events_become_wire_packets_that_round_trip() {
    let mut host = Session::new(0xABCD_1234, GameType::Multiplayer, 7, 0, 0);

    host.add_peer(RosterEntry::new(0, "Host", 0, 0)).unwrap();
    host.add_peer(RosterEntry::new(1, "Nod", 1, 1)).unwrap();
    host.set_ready(1, true).unwrap();
    host.set_option("credits", OptionValue::U32(3_000)).unwrap();
    host.remove_peer(1);

    let events = host.take_pending();
    assert_eq!(events.len(), 5);

    for event in &events {
        let packet = packet_for(event);
        let bytes = packet.encode().unwrap();
        let (decoded, consumed) = Packet::decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, packet);
    }
}
