//! Wire message: `{domain, event, user_id?, payload}`
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Broad area the event belongs to (ex: "notification", "log", "billing")
    #[serde(default)]
    pub domain: String,
    /// Event tag used to pick a pipeline
    #[serde(default)]
    pub event: String,
    /// Originating user, if any
    #[serde(default)]
    pub user_id: Option<String>,
    /// Job payload, no schema enforced
    #[serde(default)]
    pub payload: Value,
}

impl Message {
    pub fn new(domain: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            event: event.into(),
            user_id: None,
            payload: Value::Null,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// `domain:event`, used in log lines
    pub fn route(&self) -> String {
        format!("{}:{}", self.domain, self.event)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_default() {
        let msg = Message::from_json(r#"{"event":"signup"}"#).unwrap();
        assert_eq!(msg.event, "signup");
        assert_eq!(msg.domain, "");
        assert!(msg.user_id.is_none());
        assert_eq!(msg.payload, Value::Null);
    }

    #[test]
    fn test_user_id_serializes_as_null() {
        let msg = Message::new("billing", "invoice-paid");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["user_id"], Value::Null);
        assert_eq!(value["domain"], "billing");
    }

    #[test]
    fn test_builder() {
        let msg = Message::new("billing", "invoice-paid")
            .with_user("u-42")
            .with_payload(json!({ "amount": 10 }));

        assert_eq!(msg.user_id.as_deref(), Some("u-42"));
        assert_eq!(msg.payload["amount"], 10);
        assert_eq!(msg.route(), "billing:invoice-paid");
    }
}
