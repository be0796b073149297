//! Wire format: JSON request parsing and string-map replies.
//!
//! Every frame is one JSON object with string values. Producer requests are
//! `{queue, payload, [qos]}`; consumer requests dispatch on an `action`
//! field. Replies always carry a `status` field.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Producer publish request.
#[derive(Debug, Deserialize)]
pub struct ProducerRequest {
    /// Target queue name.
    pub queue: String,
    /// Opaque payload.
    pub payload: String,
    /// Optional QoS: `fire_and_forget` (default) or `require_ack`.
    #[serde(default)]
    pub qos: Option<String>,
}

impl ProducerRequest {
    /// True when the producer expects a `message_id` reply.
    #[must_use]
    pub fn wants_ack(&self) -> bool {
        self.qos.as_deref() == Some("require_ack")
    }
}

/// Consumer request, dispatched on the `action` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ConsumerRequest {
    /// Create or overwrite this client's session.
    Subscribe {
        /// Queue to subscribe to.
        queue: String,
        /// Optional QoS: `fire_and_forget`, `require_ack`, or `resume`.
        #[serde(default)]
        qos: Option<String>,
        /// Optional ack timeout override, milliseconds as a string.
        #[serde(default)]
        ack_timeout_ms: Option<String>,
    },
    /// Drop this client's session.
    Unsubscribe,
    /// Deliver the next message per the session's mode.
    Fetch,
    /// Acknowledge the pending delivery.
    Ack {
        /// Id of the message being acknowledged.
        message_id: String,
    },
}

/// Reply frame: an ordered string map serialized as one JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply(BTreeMap<String, String>);

impl Reply {
    /// Start a reply with the given `status` value.
    #[must_use]
    pub fn status(status: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("status".to_owned(), status.to_owned());
        Self(fields)
    }

    /// `{status: error, reason}` frame.
    #[must_use]
    pub fn error(reason: &str) -> Self {
        Self::status("error").with("reason", reason)
    }

    /// Add a field.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_owned(), value.into());
        self
    }

    /// Read a field back (used by tests).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Serialize to the JSON wire form.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| r#"{"status":"error"}"#.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_request_parses_with_optional_qos() {
        let request: ProducerRequest =
            serde_json::from_str(r#"{"queue":"q","payload":"data"}"#).expect("parses");
        assert_eq!(request.queue, "q");
        assert!(!request.wants_ack());

        let request: ProducerRequest =
            serde_json::from_str(r#"{"queue":"q","payload":"data","qos":"require_ack"}"#)
                .expect("parses");
        assert!(request.wants_ack());
    }

    #[test]
    fn producer_request_requires_queue_and_payload() {
        assert!(serde_json::from_str::<ProducerRequest>(r#"{"payload":"x"}"#).is_err());
        assert!(serde_json::from_str::<ProducerRequest>(r#"{"queue":"q"}"#).is_err());
    }

    #[test]
    fn consumer_actions_dispatch_on_tag() {
        let request: ConsumerRequest =
            serde_json::from_str(r#"{"action":"subscribe","queue":"q","qos":"resume"}"#)
                .expect("parses");
        assert!(matches!(request, ConsumerRequest::Subscribe { .. }));

        let request: ConsumerRequest =
            serde_json::from_str(r#"{"action":"fetch"}"#).expect("parses");
        assert!(matches!(request, ConsumerRequest::Fetch));

        assert!(
            serde_json::from_str::<ConsumerRequest>(r#"{"action":"explode"}"#).is_err(),
            "unknown actions are rejected"
        );
    }

    #[test]
    fn reply_serializes_to_flat_json() {
        let reply = Reply::status("ok").with("message_id", "abc");
        let value: serde_json::Value = serde_json::from_str(&reply.to_json()).expect("json");
        assert_eq!(value["status"], "ok");
        assert_eq!(value["message_id"], "abc");
    }
}
