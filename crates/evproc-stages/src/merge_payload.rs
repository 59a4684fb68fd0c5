use async_trait::async_trait;
use evproc_core::{Message, PipelineContext, Stage, StageData, StageOutcome};
use serde_json::{json, Value};

/// Produces new data: the running data plus the payload's top-level keys
/// and the message's routing fields.
///
/// Payload keys win over keys already in the data. Non-object payloads are
/// kept under `"payload"`.
#[derive(Debug, Clone, Default)]
pub struct MergePayloadStage;

#[async_trait]
impl Stage for MergePayloadStage {
    fn name(&self) -> &str {
        "merge-payload"
    }

    async fn execute(
        &self,
        data: &StageData,
        event: &Message,
        _ctx: &PipelineContext,
    ) -> StageOutcome {
        let mut merged = data.clone();

        match &event.payload {
            Value::Object(map) => {
                for (key, value) in map {
                    merged.insert(key.clone(), value.clone());
                }
            }
            Value::Null => {}
            other => {
                merged.insert("payload", other.clone());
            }
        }

        merged.insert("domain", json!(event.domain));
        merged.insert("event", json!(event.event));
        if let Some(user_id) = &event.user_id {
            merged.insert("user_id", json!(user_id));
        }

        StageOutcome::Continue(Some(merged))
    }
}
