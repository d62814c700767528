use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::matchmaking::matcher::ChatSessionId;
use crate::matchmaking::registry::ClientId;

// Signaling payloads (offer/answer/candidate) stay opaque serde_json::Value
// blobs end to end; the server forwards them without looking inside.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientMessage {
    FindChat,
    Next,
    EndChat,
    Offer { offer: Value },
    Answer { answer: Value },
    IceCandidate { candidate: Value },
    SendMessage { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerMessage {
    Waiting,
    #[serde(rename_all = "camelCase")]
    ChatStarted {
        partner_id: ClientId,
        chat_session_id: ChatSessionId,
    },
    ChatEnded,
    Offer { offer: Value, from: ClientId },
    Answer { answer: Value, from: ClientId },
    IceCandidate { candidate: Value, from: ClientId },
    MessageReceived { message: String },
}

impl ClientMessage {
    /// Maps a relayable event to the message its partner should see, tagged
    /// with the sender where the protocol carries one. Control events have
    /// no relay form.
    pub fn into_relay(self, from: ClientId) -> Option<ServerMessage> {
        match self {
            ClientMessage::Offer { offer } => Some(ServerMessage::Offer { offer, from }),
            ClientMessage::Answer { answer } => Some(ServerMessage::Answer { answer, from }),
            ClientMessage::IceCandidate { candidate } => {
                Some(ServerMessage::IceCandidate { candidate, from })
            }
            ClientMessage::SendMessage { message } => {
                Some(ServerMessage::MessageReceived { message })
            }
            ClientMessage::FindChat | ClientMessage::Next | ClientMessage::EndChat => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_control_events_parse() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"findChat"}"#).unwrap();
        assert_eq!(msg, ClientMessage::FindChat);

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"next"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Next);
    }

    #[test]
    fn test_send_message_parses_payload() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"sendMessage","payload":{"message":"hola"}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::SendMessage {
                message: "hola".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        // missing required field
        assert!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"sendMessage","payload":{}}"#).is_err()
        );
        // unknown event kind
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shout"}"#).is_err());
        // no type tag at all
        assert!(serde_json::from_str::<ClientMessage>(r#"{"message":"hi"}"#).is_err());
    }

    #[test]
    fn test_waiting_serializes_bare() {
        assert_eq!(
            serde_json::to_string(&ServerMessage::Waiting).unwrap(),
            r#"{"type":"waiting"}"#
        );
    }

    #[test]
    fn test_chat_started_uses_camel_case_fields() {
        let msg = ServerMessage::ChatStarted {
            partner_id: ClientId::new(),
            chat_session_id: ChatSessionId::new(),
        };
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["type"], "chatStarted");
        assert!(value["payload"]["partnerId"].is_string());
        assert!(value["payload"]["chatSessionId"].is_string());
    }

    #[test]
    fn test_relay_mapping_tags_sender() {
        let from = ClientId::new();
        let candidate = json!({"candidate": "candidate:0 1 UDP ...", "sdpMLineIndex": 0});

        let relayed = ClientMessage::IceCandidate {
            candidate: candidate.clone(),
        }
        .into_relay(from);

        assert_eq!(
            relayed,
            Some(ServerMessage::IceCandidate { candidate, from })
        );
        assert_eq!(ClientMessage::FindChat.into_relay(from), None);
        assert_eq!(ClientMessage::Next.into_relay(from), None);
    }
}
