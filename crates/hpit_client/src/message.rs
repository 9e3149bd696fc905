use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event name the hub uses for system level transaction messages.
pub const TRANSACTION_MESSAGE_NAME: &str = "transaction";

/// One unit of work fetched from the hub.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct Message {
    pub message_id: String,              // Unique per hub message
    pub sender_entity_id: String,        // Who sent it
    #[serde(rename = "message_name")]
    pub event_name: String,              // What kind of event it is
    #[serde(rename = "message", default)]
    pub payload: Map<String, Value>,     // Opaque key/value data
}

impl Message {
    pub fn new(
        message_id: impl Into<String>,
        sender_entity_id: impl Into<String>,
        event_name: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            sender_entity_id: sender_entity_id.into(),
            event_name: event_name.into(),
            payload,
        }
    }

    pub fn is_transaction(&self) -> bool {
        self.event_name == TRANSACTION_MESSAGE_NAME
    }

    /// Looks up a single payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_hub_field_names() {
        let raw = json!({
            "message_id": "1234",
            "sender_entity_id": "4567",
            "message_name": "test_event",
            "message": {"thing": "test message"}
        });
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.message_id, "1234");
        assert_eq!(msg.sender_entity_id, "4567");
        assert_eq!(msg.event_name, "test_event");
        assert_eq!(msg.get("thing"), Some(&json!("test message")));
        assert!(!msg.is_transaction());
    }

    #[test]
    fn payload_defaults_to_empty() {
        let raw = json!({
            "message_id": "1",
            "sender_entity_id": "2",
            "message_name": "transaction"
        });
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert!(msg.payload.is_empty());
        assert!(msg.is_transaction());
    }
}
