//! Frame validation and JSON encoding for the client protocol.

use staytuned_core::error::AppError;
use staytuned_core::result::AppResult;

use super::types::{InboundMessage, OutboundMessage};

/// Decode an inbound text frame, rejecting empty or oversize input.
pub fn decode_inbound(raw: &str, max_bytes: usize) -> AppResult<InboundMessage> {
    if raw.trim().is_empty() {
        return Err(AppError::validation("Empty message"));
    }
    if raw.len() > max_bytes {
        return Err(AppError::validation(format!(
            "Message too large ({} bytes, max {max_bytes})",
            raw.len()
        )));
    }

    serde_json::from_str(raw).map_err(|e| AppError::validation(format!("Invalid message: {e}")))
}

/// Encode an outbound event as a JSON text frame.
pub fn encode_outbound(msg: &OutboundMessage) -> AppResult<String> {
    Ok(serde_json::to_string(msg)?)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use staytuned_core::error::ErrorKind;
    use staytuned_core::types::{ChannelId, PresenceStatus, UserId};

    use super::*;
    use crate::message::types::{TypingCommand, UserPresenceEvent};

    #[test]
    fn decodes_join_channel() {
        let channel_id = ChannelId::new();
        let raw = json!({ "event": "join_channel", "data": channel_id }).to_string();

        let msg = decode_inbound(&raw, 1024).expect("decode");
        assert_eq!(msg, InboundMessage::JoinChannel(channel_id));
    }

    #[test]
    fn decodes_typing_with_camel_case_payload() {
        let channel_id = ChannelId::new();
        let raw = json!({ "event": "user_typing", "data": { "channelId": channel_id } }).to_string();

        let msg = decode_inbound(&raw, 1024).expect("decode");
        assert_eq!(msg, InboundMessage::UserTyping(TypingCommand { channel_id }));
    }

    #[test]
    fn update_status_keeps_unknown_values_for_the_caller() {
        let raw = r#"{"event":"update_status","data":"sleepy"}"#;
        let msg = decode_inbound(raw, 1024).expect("decode");
        assert_eq!(msg, InboundMessage::UpdateStatus("sleepy".to_string()));
    }

    #[test]
    fn rejects_unknown_event_empty_and_oversize_frames() {
        let unknown = decode_inbound(r#"{"event":"subscribe","data":"x"}"#, 1024).unwrap_err();
        assert_eq!(unknown.kind, ErrorKind::Validation);

        let empty = decode_inbound("   ", 1024).unwrap_err();
        assert_eq!(empty.kind, ErrorKind::Validation);

        let big = format!(r#"{{"event":"update_status","data":"{}"}}"#, "a".repeat(64));
        let oversize = decode_inbound(&big, 32).unwrap_err();
        assert_eq!(oversize.kind, ErrorKind::Validation);
    }

    #[test]
    fn encodes_presence_in_wire_shape() {
        let user_id = UserId::new();
        let msg = OutboundMessage::UserPresence(UserPresenceEvent {
            user_id,
            status: PresenceStatus::Away,
        });

        let value: Value = serde_json::from_str(&encode_outbound(&msg).expect("encode")).expect("json");
        assert_eq!(value["event"], "user_presence");
        assert_eq!(value["data"]["userId"], user_id.to_string());
        assert_eq!(value["data"]["status"], "away");
        assert_eq!(msg.event_name(), "user_presence");
    }

    #[test]
    fn encodes_error_event() {
        let value: Value =
            serde_json::from_str(&encode_outbound(&OutboundMessage::error("nope")).expect("encode"))
                .expect("json");
        assert_eq!(value, json!({ "event": "error", "data": { "message": "nope" } }));
    }
}
