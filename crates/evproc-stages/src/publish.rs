use async_trait::async_trait;
use evproc_core::{Message, PipelineContext, Stage, StageData, StageError, StageOutcome};

/// Event tag [`PublishStage::default`] publishes under.
pub const PROCESSED_EVENT: &str = "processed";

/// Publishes the running data to the control queue as
/// `{domain, event, user_id, payload: data}`.
#[derive(Debug, Clone)]
pub struct PublishStage {
    domain: String,
    event: String,
}

impl PublishStage {
    pub fn new(domain: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            event: event.into(),
        }
    }
}

impl Default for PublishStage {
    fn default() -> Self {
        Self::new("log", PROCESSED_EVENT)
    }
}

#[async_trait]
impl Stage for PublishStage {
    fn name(&self) -> &str {
        "publish"
    }

    fn requirements(&self) -> Vec<String> {
        vec!["main_queue".to_string()]
    }

    async fn execute(
        &self,
        data: &StageData,
        event: &Message,
        ctx: &PipelineContext,
    ) -> StageOutcome {
        let outbound = Message {
            domain: self.domain.clone(),
            event: self.event.clone(),
            user_id: event.user_id.clone(),
            payload: data.clone().into_value(),
        };

        match ctx.app().main_queue().send(&outbound).await {
            Ok(()) => StageOutcome::Continue(None),
            Err(e) => StageOutcome::Fail(StageError::Dependency(e.to_string())),
        }
    }
}
