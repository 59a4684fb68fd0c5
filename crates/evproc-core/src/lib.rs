//! evproc Core: Stage contract, chain runner and pipeline model
//!
//! A pipeline loads whatever data its stages need, then walks its stage
//! chain in declared order. Each stage either passes the data through,
//! replaces it, halts the chain quietly or fails the run.

pub mod context;
pub mod data_model;
pub mod error;
pub mod notification;
pub mod pipeline;
pub mod runner;
pub mod stage;

pub use context::{AppContext, Environment, PipelineContext, Services};
pub use data_model::StageData;
pub use error::{PipelineError, ProcessorError};
pub use notification::{error_notification, missing_pipeline, ErrorReport};
pub use pipeline::{ChainPipeline, DataLoader, Pipeline};
pub use runner::{Disposition, RunReport, StageChain, StageReport};
pub use stage::{Stage, StageDef, StageError, StageOutcome, StageRequirements};

pub use evproc_queue::Message;

/// Version reported by the admin health endpoint
pub const EVPROC_VERSION: &str = "1.0.0";
