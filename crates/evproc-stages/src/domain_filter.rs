use async_trait::async_trait;
use evproc_core::{Message, PipelineContext, Stage, StageData, StageOutcome};

/// Halts the chain, without failing, for messages outside `allowed`.
#[derive(Debug, Clone, Default)]
pub struct DomainFilterStage {
    allowed: Vec<String>,
}

impl DomainFilterStage {
    pub fn allow<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: domains.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Stage for DomainFilterStage {
    fn name(&self) -> &str {
        "domain-filter"
    }

    async fn execute(
        &self,
        _data: &StageData,
        event: &Message,
        ctx: &PipelineContext,
    ) -> StageOutcome {
        if self.allowed.iter().any(|d| d == &event.domain) {
            StageOutcome::Continue(None)
        } else {
            tracing::debug!(trace_id = %ctx.trace_id, domain = %event.domain, "domain filtered out");
            StageOutcome::Halt
        }
    }
}
