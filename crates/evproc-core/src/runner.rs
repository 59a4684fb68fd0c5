//! Chain Runner: walks the stages of a pipeline strictly in order
use std::time::Instant;

use evproc_queue::Message;
use serde::Serialize;

use crate::context::PipelineContext;
use crate::data_model::StageData;
use crate::error::PipelineError;
use crate::stage::{StageDef, StageOutcome, StageRequirements};

/// How a stage left the running data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Passed,
    Replaced,
    Halted,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub disposition: Disposition,
    /// Fingerprint of the running data after this stage
    pub data_hash: String,
    pub latency_ms: u64,
}

/// Successful run of a chain, halted or not.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipeline_id: String,
    pub trace_id: String,
    pub stages: Vec<StageReport>,
    pub halted: bool,
    pub data: StageData,
}

impl RunReport {
    /// Stage that halted the chain, if one did
    pub fn halted_at(&self) -> Option<&str> {
        if !self.halted {
            return None;
        }
        self.stages.last().map(|s| s.stage.as_str())
    }

    pub fn executed(&self) -> usize {
        self.stages.len()
    }
}

/// Ordered list of stage definitions.
#[derive(Debug, Clone, Default)]
pub struct StageChain {
    stages: Vec<StageDef>,
}

impl StageChain {
    pub fn new(stages: Vec<StageDef>) -> Self {
        Self { stages }
    }

    pub fn then(mut self, stage: StageDef) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.stages.iter().map(StageDef::name).collect()
    }

    pub fn requirements(&self) -> Vec<StageRequirements> {
        self.stages.iter().map(StageDef::describe).collect()
    }

    /// `fetch→validate→persist`
    pub fn pipeline_id(&self) -> String {
        self.names().join("→")
    }

    /// Run every stage in declared order against `data`.
    ///
    /// The next stage is only built once the previous outcome is known.
    /// `Halt` ends the run successfully, `Fail` ends it with
    /// [`PipelineError::Stage`].
    pub async fn run(
        &self,
        mut data: StageData,
        event: &Message,
        ctx: &PipelineContext,
    ) -> Result<RunReport, PipelineError> {
        let mut reports = Vec::with_capacity(self.stages.len());
        let mut halted = false;

        for def in &self.stages {
            let stage = def.instantiate();
            let name = stage.name().to_string();
            let start = Instant::now();

            let outcome = stage.execute(&data, event, ctx).await;
            let latency_ms = start.elapsed().as_millis() as u64;

            let disposition = match outcome {
                StageOutcome::Continue(Some(new_data)) if !new_data.is_empty() => {
                    data = new_data;
                    Disposition::Replaced
                }
                StageOutcome::Continue(_) => Disposition::Passed,
                StageOutcome::Halt => Disposition::Halted,
                StageOutcome::Fail(source) => {
                    tracing::debug!(trace_id = %ctx.trace_id, stage = %name, error = %source, "stage failed");
                    return Err(PipelineError::Stage { stage: name, source });
                }
            };

            tracing::debug!(
                trace_id = %ctx.trace_id,
                stage = %name,
                ?disposition,
                latency_ms,
                "stage done"
            );

            reports.push(StageReport {
                stage: name,
                disposition,
                data_hash: data.digest(),
                latency_ms,
            });

            if disposition == Disposition::Halted {
                halted = true;
                break;
            }
        }

        Ok(RunReport {
            pipeline_id: self.pipeline_id(),
            trace_id: ctx.trace_id.clone(),
            stages: reports,
            halted,
            data,
        })
    }
}
