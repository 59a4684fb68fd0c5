//! Pipeline: load the data a message needs, then run the stage chain
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use evproc_queue::Message;

use crate::context::{AppContext, PipelineContext};
use crate::data_model::StageData;
use crate::error::PipelineError;
use crate::runner::{RunReport, StageChain};
use crate::stage::StageRequirements;

/// Capability every registered pipeline implements.
///
/// Implementors supply their context and chain; `load_data` is the usual
/// override point and `run` rarely needs replacing.
#[async_trait]
pub trait Pipeline: Send + Sync {
    fn context(&self) -> &PipelineContext;

    fn stages(&self) -> &StageChain;

    /// Fetch auxiliary data for `event`. An error aborts the run before any
    /// stage executes.
    async fn load_data(&self, _event: &Message) -> Result<StageData, PipelineError> {
        Ok(StageData::new())
    }

    async fn run(&self, event: &Message) -> Result<RunReport, PipelineError> {
        let data = self.load_data(event).await?;
        self.stages().run(data, event, self.context()).await
    }

    fn name_stages(&self) -> Vec<String> {
        self.stages().names()
    }

    fn name_requirements(&self) -> Vec<StageRequirements> {
        self.stages().requirements()
    }
}

/// Async loader used by [`ChainPipeline`].
#[async_trait]
pub trait DataLoader: Send + Sync {
    async fn load(&self, event: &Message, ctx: &PipelineContext)
        -> Result<StageData, PipelineError>;
}

/// Pipeline assembled from a chain and an optional loader.
pub struct ChainPipeline {
    ctx: PipelineContext,
    chain: StageChain,
    loader: Option<Arc<dyn DataLoader>>,
}

impl ChainPipeline {
    pub fn new(app: Arc<AppContext>, event: impl Into<String>, chain: StageChain) -> Self {
        Self {
            ctx: PipelineContext::new(app, event),
            chain,
            loader: None,
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn DataLoader>) -> Self {
        self.loader = Some(loader);
        self
    }
}

impl fmt::Debug for ChainPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainPipeline")
            .field("event", &self.ctx.event)
            .field("stages", &self.chain.names())
            .field("loader", &self.loader.is_some())
            .finish()
    }
}

#[async_trait]
impl Pipeline for ChainPipeline {
    fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    fn stages(&self) -> &StageChain {
        &self.chain
    }

    async fn load_data(&self, event: &Message) -> Result<StageData, PipelineError> {
        match &self.loader {
            Some(loader) => loader.load(event, &self.ctx).await,
            None => Ok(StageData::new()),
        }
    }
}
