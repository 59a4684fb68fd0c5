use async_trait::async_trait;
use evproc_core::{Message, PipelineContext, Stage, StageData, StageError, StageOutcome};

/// Fails the run when the message payload lacks any of `fields`.
#[derive(Debug, Clone, Default)]
pub struct RequireFieldsStage {
    fields: Vec<String>,
}

impl RequireFieldsStage {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    fn missing(&self, event: &Message) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| event.payload.get(f.as_str()).map_or(true, |v| v.is_null()))
            .map(String::as_str)
            .collect()
    }
}

#[async_trait]
impl Stage for RequireFieldsStage {
    fn name(&self) -> &str {
        "require-fields"
    }

    async fn execute(
        &self,
        _data: &StageData,
        event: &Message,
        _ctx: &PipelineContext,
    ) -> StageOutcome {
        let missing = self.missing(event);
        if missing.is_empty() {
            return StageOutcome::Continue(None);
        }

        StageOutcome::Fail(StageError::ValidationFailed(format!(
            "{} missing payload fields: {}",
            event.route(),
            missing.join(", ")
        )))
    }
}
