//! Unified Error Model
use evproc_queue::QueueError;
use thiserror::Error;

use crate::stage::StageError;

/// Failure of one pipeline run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// `load_data` failed; no stage ran
    #[error("LOAD/{0}")]
    Load(String),

    /// A stage returned `Fail`; later stages did not run
    #[error("STAGE/{stage}: {source}")]
    Stage { stage: String, source: StageError },
}

impl PipelineError {
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    /// Name of the failing stage, if a stage failed
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            Self::Load(_) => None,
        }
    }
}

/// Errors raised by the processor around pipeline runs.
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("SETUP/{0}")]
    Setup(String),

    #[error("CONFIG/{0}")]
    Config(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("PANIC/{0}")]
    Panic(String),

    #[error("REGISTRY/{0}")]
    Registry(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        let err = PipelineError::Stage {
            stage: "validate".to_string(),
            source: StageError::ValidationFailed("missing email".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "STAGE/validate: PARSE/VALIDATION: missing email"
        );
        assert_eq!(err.stage(), Some("validate"));

        assert_eq!(PipelineError::load("db down").to_string(), "LOAD/db down");
    }

    #[test]
    fn test_queue_error_is_transparent() {
        let err: ProcessorError = QueueError::NotConnected("main".to_string()).into();
        assert_eq!(err.to_string(), "QUEUE/NOT_CONNECTED: main");
    }
}
