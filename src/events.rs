use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::ChatMessage;

/// What the protocol layer reports to the chat feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Connected {
        channel: String,
        at: DateTime<Utc>,
    },
    Disconnected {
        reason: String,
        at: DateTime<Utc>,
    },
    Message {
        message: ChatMessage,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::ChatEvent;
    use crate::protocol::{parse_emotes_tag, ChatMessage, EmoteSpan};

    #[test]
    fn parses_tagged_message_event() {
        let payload = r##"{
            "type": "message",
            "message": {
                "username": "ahorn",
                "display_name": "Ahorn",
                "text": "hi :) bye",
                "emotes": [{ "key": "1", "begin": 3, "end": 4 }],
                "metadata": { "subscriber": true, "turbo": false, "role": "moderator",
                              "color": { "r": 30, "g": 144, "b": 255 }, "badges": ["moderator/1"] }
            },
            "at": "2026-02-18T00:00:00Z"
        }"##;
        let event: ChatEvent = serde_json::from_str(payload).expect("event should parse");
        match event {
            ChatEvent::Message { message, .. } => {
                assert_eq!(message.display_name, "Ahorn");
                assert_eq!(message.emotes.get(&3), Some(&EmoteSpan::new("1", 3, 4)));
                assert!(message.metadata.subscriber);
            }
            other => panic!("expected message event, got {other:?}"),
        }
    }

    #[test]
    fn parses_connection_events() {
        let payload = r#"{"type":"connected","channel":"horngaming","at":"2026-02-18T00:00:00Z"}"#;
        let event: ChatEvent = serde_json::from_str(payload).expect("event should parse");
        assert!(matches!(event, ChatEvent::Connected { .. }));
    }

    #[test]
    fn message_event_with_emotes_survives_json() {
        let mut message = ChatMessage::plain("viewer", "Kappa x Kappa y PogChamp");
        message.emotes = parse_emotes_tag("25:0-4,8-12/88:16-23");
        let event = ChatEvent::Message {
            message: message.clone(),
            at: Utc::now(),
        };
        let json = serde_json::to_string(&event).expect("event should serialize");
        let parsed: ChatEvent = serde_json::from_str(&json).expect("event should parse");
        match parsed {
            ChatEvent::Message { message: parsed, .. } => assert_eq!(parsed, message),
            other => panic!("expected message event, got {other:?}"),
        }
    }
}
