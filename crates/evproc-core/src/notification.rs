//! Outbound envelopes published to the control queue
use evproc_queue::Message;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::{AppContext, Environment};

pub const NOTIFICATION_DOMAIN: &str = "notification";
pub const ERROR_EVENT: &str = "error";
pub const LOG_DOMAIN: &str = "log";
pub const MISSING_PIPELINE_EVENT: &str = "missing-pipeline";

/// `err` body of an error notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub message: String,
    /// Queue identity of the reporting processor (ex: "queue-notifier")
    pub repository: String,
    pub environment: Environment,
}

impl ErrorReport {
    pub fn new(
        message: impl Into<String>,
        repository: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self {
            message: message.into(),
            repository: repository.into(),
            environment,
        }
    }

    /// Report stamped with `app`'s identity and tier
    pub fn for_app(message: impl Into<String>, app: &AppContext) -> Self {
        Self::new(message, app.repository(), app.environment())
    }
}

/// `{domain: "notification", event: "error", user_id, payload: {event_payload, err}}`
///
/// Without an originating message (startup failures) `event_payload` is an
/// empty object and `user_id` is null.
pub fn error_notification(report: &ErrorReport, event: Option<&Message>) -> Message {
    let event_payload = event
        .and_then(|m| serde_json::to_value(m).ok())
        .unwrap_or_else(|| json!({}));

    Message {
        domain: NOTIFICATION_DOMAIN.to_string(),
        event: ERROR_EVENT.to_string(),
        user_id: event.and_then(|m| m.user_id.clone()),
        payload: json!({
            "event_payload": event_payload,
            "err": report,
        }),
    }
}

/// `{domain: "log", event: "missing-pipeline", user_id, payload: original}`
pub fn missing_pipeline(event: &Message) -> Message {
    Message {
        domain: LOG_DOMAIN.to_string(),
        event: MISSING_PIPELINE_EVENT.to_string(),
        user_id: event.user_id.clone(),
        payload: serde_json::to_value(event).unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_notification_shape() {
        let event = Message::new("billing", "invoice-paid")
            .with_user("u-7")
            .with_payload(json!({ "invoice": 12 }));
        let report = ErrorReport::new("STAGE/charge: boom", "queue-billing", Environment::Staging);

        let note = error_notification(&report, Some(&event));

        assert_eq!(note.domain, "notification");
        assert_eq!(note.event, "error");
        assert_eq!(note.user_id.as_deref(), Some("u-7"));
        assert_eq!(note.payload["event_payload"]["payload"]["invoice"], 12);
        assert_eq!(
            note.payload["err"],
            json!({
                "message": "STAGE/charge: boom",
                "repository": "queue-billing",
                "environment": "staging",
            })
        );
    }

    #[test]
    fn test_error_notification_without_event() {
        let report = ErrorReport::new("QUEUE/CONNECT", "queue-sorter", Environment::Production);
        let note = error_notification(&report, None);

        assert!(note.user_id.is_none());
        assert_eq!(note.payload["event_payload"], json!({}));
        assert_eq!(note.payload["err"]["environment"], "production");
    }

    #[test]
    fn test_missing_pipeline_carries_original() {
        let event = Message::new("crm", "lead-created").with_user("u-1");
        let note = missing_pipeline(&event);

        assert_eq!(note.domain, "log");
        assert_eq!(note.event, "missing-pipeline");
        assert_eq!(note.user_id.as_deref(), Some("u-1"));
        assert_eq!(serde_json::from_value::<Message>(note.payload).unwrap(), event);
    }
}
