//! Event wire format and forwarding policy.
//!
//! Events travel as JSON text frames: `{"event": <name>, "data": <payload>}`.
//! The forwarding policy is a pure function from event to rule, decoupled
//! from the transport: direct to the owning client, or fanned out to a room.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backend events that fan out to a conversation room when their payload
/// carries a `conversationID`.
pub const BROADCAST_EVENTS: &[&str] = &[
    "new_message",
    "message_updated",
    "message_deleted",
    "messages_read",
    "user_typing",
];

/// Client bookkeeping events, intercepted but still forwarded.
pub const EVENT_JOIN: &str = "join_conversation";
pub const EVENT_LEAVE: &str = "leave_conversation";

/// Gateway-originated events.
pub const EVENT_GATEWAY_READY: &str = "gateway_ready";
pub const EVENT_CONNECT_ERROR: &str = "connect_error";
pub const EVENT_SERVICE_DISCONNECTED: &str = "service_disconnected";

/// One event on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Where a backend event should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardRule {
    /// Only to the client owning the backend connection.
    Direct,
    /// To every connected member of the room.
    Broadcast { room: String },
}

/// Room-membership bookkeeping requested by a client event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomAction {
    Join(String),
    Leave(String),
}

/// Room name for a conversation id.
pub fn conversation_room(conversation_id: &str) -> String {
    format!("conversation:{}", conversation_id)
}

/// Decide how a backend event is forwarded.
pub fn route_backend_event(frame: &EventFrame) -> ForwardRule {
    if BROADCAST_EVENTS.contains(&frame.event.as_str()) {
        if let Some(id) = frame.data.get("conversationID").and_then(Value::as_str) {
            return ForwardRule::Broadcast {
                room: conversation_room(id),
            };
        }
    }
    ForwardRule::Direct
}

/// Extract the bookkeeping action from a client event, if any.
pub fn room_action(frame: &EventFrame) -> Option<RoomAction> {
    let conversation_id = frame.data.get("conversationID").and_then(Value::as_str)?;
    match frame.event.as_str() {
        EVENT_JOIN => Some(RoomAction::Join(conversation_room(conversation_id))),
        EVENT_LEAVE => Some(RoomAction::Leave(conversation_room(conversation_id))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_round_trip() {
        let frame = EventFrame::new("new_message", json!({"conversationID": "c1", "text": "hi"}));
        let parsed = EventFrame::parse(&frame.to_json()).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_broadcast_event_with_conversation_id() {
        let frame = EventFrame::new("new_message", json!({"conversationID": "c1"}));
        assert_eq!(
            route_backend_event(&frame),
            ForwardRule::Broadcast {
                room: "conversation:c1".to_string()
            }
        );
    }

    #[test]
    fn test_broadcast_event_without_conversation_id_goes_direct() {
        let frame = EventFrame::new("new_message", json!({"text": "hi"}));
        assert_eq!(route_backend_event(&frame), ForwardRule::Direct);
    }

    #[test]
    fn test_non_broadcast_event_goes_direct() {
        let frame = EventFrame::new("sync_state", json!({"conversationID": "c1"}));
        assert_eq!(route_backend_event(&frame), ForwardRule::Direct);
    }

    #[test]
    fn test_all_broadcast_class_events_routed() {
        for event in BROADCAST_EVENTS {
            let frame = EventFrame::new(*event, json!({"conversationID": "c9"}));
            assert!(matches!(
                route_backend_event(&frame),
                ForwardRule::Broadcast { .. }
            ));
        }
    }

    #[test]
    fn test_join_and_leave_actions() {
        let join = EventFrame::new(EVENT_JOIN, json!({"conversationID": "c1"}));
        assert_eq!(
            room_action(&join),
            Some(RoomAction::Join("conversation:c1".to_string()))
        );

        let leave = EventFrame::new(EVENT_LEAVE, json!({"conversationID": "c1"}));
        assert_eq!(
            room_action(&leave),
            Some(RoomAction::Leave("conversation:c1".to_string()))
        );

        let other = EventFrame::new("send_message", json!({"conversationID": "c1"}));
        assert_eq!(room_action(&other), None);
    }
}
