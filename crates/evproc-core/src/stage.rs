//! Stage Trait: single contract for every unit of work in a chain
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use evproc_queue::Message;
use serde::{Deserialize, Serialize};

use crate::context::PipelineContext;
use crate::data_model::StageData;

/// What a stage tells the chain runner to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Go on to the next stage. Present, non-empty data replaces the
    /// running data; `None` or an empty object leaves it untouched.
    Continue(Option<StageData>),
    /// Stop here; the run still counts as a success.
    Halt,
    /// Stop here; the run fails with this error.
    Fail(StageError),
}

impl StageOutcome {
    pub fn pass() -> Self {
        Self::Continue(None)
    }

    pub fn replace(data: StageData) -> Self {
        Self::Continue(Some(data))
    }
}

/// Contract for one stage.
///
/// A fresh instance is built from its [`StageDef`] for every run, so
/// implementations may keep per-run state in `self` without it leaking into
/// the next message.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Display name (ex: "fetch", "validate")
    fn name(&self) -> &str;

    /// Names of settings or services this stage expects to find.
    /// Reported for diagnostics only; the runner does not check them.
    fn requirements(&self) -> Vec<String> {
        Vec::new()
    }

    /// Run the stage against the current data.
    async fn execute(
        &self,
        _data: &StageData,
        _event: &Message,
        _ctx: &PipelineContext,
    ) -> StageOutcome {
        StageOutcome::Continue(None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageError {
    ValidationFailed(String),
    ExecutionFailed(String),
    MissingData(String),
    Dependency(String),
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "PARSE/VALIDATION: {}", msg),
            Self::ExecutionFailed(msg) => write!(f, "STAGE/EXEC: {}", msg),
            Self::MissingData(key) => write!(f, "DATA/MISSING: {}", key),
            Self::Dependency(msg) => write!(f, "DEP/UNAVAILABLE: {}", msg),
        }
    }
}

impl std::error::Error for StageError {}

/// A stage's name with its declared requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRequirements {
    pub name: String,
    pub requirements: Vec<String>,
}

/// Declared position in a chain: knows how to build a fresh stage.
#[derive(Clone)]
pub struct StageDef {
    factory: Arc<dyn Fn() -> Box<dyn Stage> + Send + Sync>,
}

impl StageDef {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn Stage> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// Definition for a stage type built with `Default`.
    pub fn of<S>() -> Self
    where
        S: Stage + Default + 'static,
    {
        Self::new(|| Box::new(S::default()))
    }

    /// Definition that clones a configured prototype for every run.
    pub fn from_prototype<S>(prototype: S) -> Self
    where
        S: Stage + Clone + 'static,
    {
        Self::new(move || Box::new(prototype.clone()))
    }

    pub fn instantiate(&self) -> Box<dyn Stage> {
        (self.factory)()
    }

    pub fn name(&self) -> String {
        self.instantiate().name().to_string()
    }

    pub fn describe(&self) -> StageRequirements {
        let stage = self.instantiate();
        StageRequirements {
            name: stage.name().to_string(),
            requirements: stage.requirements(),
        }
    }
}

impl fmt::Debug for StageDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StageDef").field(&self.name()).finish()
    }
}
