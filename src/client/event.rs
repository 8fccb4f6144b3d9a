//! Wire types exchanged with the agent runtime

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event produced by a session's event stream
///
/// The envelope is `{id, msg: {type, ...}}`; everything past the type tag
/// is runtime-defined and carried opaquely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentEvent {
    /// Submission ID this event responds to (empty for unsolicited events)
    pub id: String,

    /// The event body
    pub msg: EventMsg,
}

/// The typed body of an agent event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventMsg {
    /// Event type tag (e.g. "session_created", "turn_completed")
    #[serde(rename = "type")]
    pub kind: String,

    /// Remaining type-specific fields, kept opaque
    #[serde(flatten)]
    pub data: Value,
}

impl AgentEvent {
    /// Create an event with no extra payload
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            msg: EventMsg {
                kind: kind.into(),
                data: Value::Object(Default::default()),
            },
        }
    }

    /// Event type tag
    pub fn kind(&self) -> &str {
        &self.msg.kind
    }
}

/// One operation submitted to a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    /// Operation type tag (e.g. "user_input", "interrupt")
    pub op: String,

    /// Operation payload, runtime-defined
    #[serde(default)]
    pub data: Value,
}

impl Submission {
    /// Create a submission with no payload
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            data: Value::Object(Default::default()),
        }
    }

    /// Create a submission with a payload
    pub fn with_data(op: impl Into<String>, data: Value) -> Self {
        Self {
            op: op.into(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_round_trip() {
        let raw = json!({
            "id": "sub-1",
            "msg": {
                "type": "turn_completed",
                "turn_id": "t-9",
                "usage": {"input_tokens": 12}
            }
        });

        let event: AgentEvent = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(event.kind(), "turn_completed");
        assert_eq!(event.msg.data["turn_id"], "t-9");

        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_event_missing_type_rejected() {
        let raw = json!({"id": "sub-1", "msg": {"turn_id": "t-9"}});
        assert!(serde_json::from_value::<AgentEvent>(raw).is_err());
    }

    #[test]
    fn test_submission_defaults() {
        let sub: Submission = serde_json::from_value(json!({"op": "interrupt"})).unwrap();
        assert_eq!(sub.op, "interrupt");
        assert!(sub.data.is_null());
    }
}
