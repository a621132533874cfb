//! Property-based tests for the envelope codec.
//!
//! Uses proptest to verify:
//! 1. Arbitrary text never causes a panic in `decode` (returns `Err` gracefully).
//! 2. Any `type` tag other than `chat`/`join`/`leave` is rejected.
//! 3. Any chat envelope with a non-empty room survives encode → decode.

use proptest::prelude::*;
use roomchat_proto::codec;
use roomchat_proto::envelope::{ChatMessage, Envelope};

/// Strategy for room names: non-empty, case-sensitive, any printable chars.
fn arb_room() -> impl Strategy<Value = String> {
    "[^\x00]{1,64}"
}

/// Strategy for chat envelopes (content may be empty, as on receipt).
fn arb_chat() -> impl Strategy<Value = Envelope> {
    (arb_room(), "[^\x00]{0,32}", "[^\x00]{0,256}").prop_map(|(room, sender, content)| {
        Envelope::Chat(ChatMessage {
            room,
            sender,
            content,
            timestamp: None,
        })
    })
}

proptest! {
    #[test]
    fn decode_never_panics(text in ".*") {
        let _ = codec::decode(&text);
    }

    #[test]
    fn unknown_type_tags_are_rejected(tag in "[a-z]{1,12}", room in arb_room()) {
        prop_assume!(!matches!(tag.as_str(), "chat" | "join" | "leave"));
        let payload = serde_json::json!({"type": tag, "room": room}).to_string();
        prop_assert!(codec::decode(&payload).is_err());
    }

    #[test]
    fn chat_envelopes_survive_the_wire(envelope in arb_chat()) {
        let text = codec::encode(&envelope).unwrap();
        let decoded = codec::decode(&text).unwrap();
        prop_assert_eq!(decoded, envelope);
    }

    #[test]
    fn membership_envelopes_survive_the_wire(room in arb_room(), leave in any::<bool>()) {
        let envelope = if leave { Envelope::leave(room) } else { Envelope::join(room) };
        let decoded = codec::decode(&codec::encode(&envelope).unwrap()).unwrap();
        prop_assert_eq!(decoded, envelope);
    }
}
