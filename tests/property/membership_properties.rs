//! Property-based tests for room membership.
//!
//! Uses proptest to verify, for arbitrary sequences of switch and leave
//! intents:
//! 1. The client is never in more than one room.
//! 2. Every switch away from a room sends `leave` for it before `join` for
//!    the new one, and re-joining the active room sends nothing.
//! 3. Replaying the emitted envelopes reproduces the local membership.

use proptest::prelude::*;
use roomchat::chat::membership::{Membership, RoomMembership};
use roomchat::chat::{SyncController, SyncError};
use roomchat::directory::InMemoryDirectory;
use roomchat::transport::loopback::LoopbackTransport;
use roomchat_proto::envelope::Envelope;

#[derive(Debug, Clone)]
enum Intent {
    Switch(String),
    Leave,
}

/// A small room pool makes re-joins and repeated switches likely.
fn arb_intent() -> impl Strategy<Value = Intent> {
    prop_oneof![
        4 => prop::sample::select(vec!["general", "random", "lobby", "Lobby", " ", ""])
            .prop_map(|room| Intent::Switch(room.to_string())),
        1 => Just(Intent::Leave),
    ]
}

/// Rooms the server would consider us in after applying `envelopes`.
fn server_view(envelopes: &[Envelope]) -> Vec<String> {
    let mut rooms: Vec<String> = Vec::new();
    for envelope in envelopes {
        match envelope {
            Envelope::Join { room } => {
                if !rooms.contains(room) {
                    rooms.push(room.clone());
                }
            }
            Envelope::Leave { room } => rooms.retain(|r| r != room),
            Envelope::Chat(_) => {}
        }
    }
    rooms
}

proptest! {
    #[test]
    fn state_machine_emits_leave_before_join(intents in prop::collection::vec(arb_intent(), 0..40)) {
        let mut membership = RoomMembership::new();
        for intent in intents {
            let before = membership.state().clone();
            let transition = match &intent {
                Intent::Switch(room) => match membership.switch_to(room) {
                    Ok(t) => t,
                    Err(_) => {
                        prop_assert!(room.trim().is_empty());
                        prop_assert_eq!(membership.state(), &before);
                        continue;
                    }
                },
                Intent::Leave => membership.leave(),
            };
            let envelopes = transition.envelopes();

            match (&before, &intent) {
                (Membership::ActiveRoom(from), Intent::Switch(to)) if from == to => {
                    prop_assert!(envelopes.is_empty());
                }
                (Membership::ActiveRoom(from), Intent::Switch(to)) => {
                    prop_assert_eq!(
                        envelopes,
                        vec![Envelope::leave(from.as_str()), Envelope::join(to.as_str())]
                    );
                }
                (Membership::NoActiveRoom, Intent::Switch(to)) => {
                    prop_assert_eq!(envelopes, vec![Envelope::join(to.as_str())]);
                }
                (Membership::ActiveRoom(from), Intent::Leave) => {
                    prop_assert_eq!(envelopes, vec![Envelope::leave(from.as_str())]);
                }
                (Membership::NoActiveRoom, Intent::Leave) => {
                    prop_assert!(envelopes.is_empty());
                }
            }
        }
    }

    #[test]
    fn controller_keeps_a_single_room(intents in prop::collection::vec(arb_intent(), 0..40)) {
        let (transport, _events, mut peer) = LoopbackTransport::create(4);
        let (mut controller, _view) = SyncController::new(transport, InMemoryDirectory::new());
        controller.on_connection_established();

        let mut sent = Vec::new();
        for intent in intents {
            let result = match &intent {
                Intent::Switch(room) => controller.switch_room(room).map(drop),
                Intent::Leave => controller.leave_room().map(drop),
            };
            if let Err(e) = result {
                prop_assert!(matches!(e, SyncError::Validation(_)));
            }
            sent.extend(peer.sent_envelopes());

            let server_rooms = server_view(&sent);
            prop_assert!(server_rooms.len() <= 1);
            prop_assert_eq!(
                server_rooms.first().map(String::as_str),
                controller.active_room()
            );
        }
    }
}
