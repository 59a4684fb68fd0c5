//! Pipeline Registry: event tag → pipeline constructor
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use evproc_core::notification::{ERROR_EVENT, MISSING_PIPELINE_EVENT};
use evproc_core::{AppContext, ChainPipeline, Pipeline, ProcessorError, StageChain};
use evproc_stages::PROCESSED_EVENT;

use crate::head::watches_control_queue;

/// Builds a fresh pipeline against the shared application context.
pub type PipelineFactory = Arc<dyn Fn(Arc<AppContext>) -> Box<dyn Pipeline> + Send + Sync>;

/// Filled at startup, read-only afterwards. Tags are unique.
#[derive(Clone, Default)]
pub struct PipelineRegistry {
    factories: HashMap<String, PipelineFactory>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, tag: impl Into<String>, factory: F) -> Result<(), ProcessorError>
    where
        F: Fn(Arc<AppContext>) -> Box<dyn Pipeline> + Send + Sync + 'static,
    {
        let tag = tag.into();
        if self.factories.contains_key(&tag) {
            return Err(ProcessorError::Registry(format!(
                "pipeline already registered for '{}'",
                tag
            )));
        }
        self.factories.insert(tag, Arc::new(factory));
        Ok(())
    }

    /// Register a [`ChainPipeline`] running `chain` for `tag`.
    pub fn register_chain(
        &mut self,
        tag: impl Into<String>,
        chain: StageChain,
    ) -> Result<(), ProcessorError> {
        let tag = tag.into();
        let event = tag.clone();
        self.register(tag, move |app| {
            Box::new(ChainPipeline::new(app, event.clone(), chain.clone())) as Box<dyn Pipeline>
        })
    }

    pub fn get(&self, tag: &str) -> Option<&PipelineFactory> {
        self.factories.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.factories.keys().cloned().collect();
        tags.sort();
        tags
    }
}

impl fmt::Debug for PipelineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

/// Registry the `evproc` binary starts with.
///
/// A processor watching the control queue also receives everything
/// published there, its own notifications included. It gets empty sink
/// pipelines for those tags so a notification is consumed once instead of
/// producing another one.
pub fn default_registry(processor: &str) -> Result<PipelineRegistry, ProcessorError> {
    let mut registry = PipelineRegistry::new();
    for (tag, chain) in evproc_stages::default_pipelines() {
        registry.register_chain(tag, chain)?;
    }

    if watches_control_queue(processor) {
        for tag in [MISSING_PIPELINE_EVENT, ERROR_EVENT, PROCESSED_EVENT] {
            registry.register_chain(tag, StageChain::default())?;
        }
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_tag_rejected() {
        let mut registry = PipelineRegistry::new();
        registry
            .register_chain("signup", StageChain::default())
            .unwrap();

        let err = registry
            .register_chain("signup", StageChain::default())
            .unwrap_err();

        assert!(err.to_string().contains("signup"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_tags_sorted() {
        let mut registry = PipelineRegistry::new();
        registry.register_chain("b", StageChain::default()).unwrap();
        registry.register_chain("a", StageChain::default()).unwrap();

        assert_eq!(registry.tags(), vec!["a", "b"]);
        assert!(registry.contains("a"));
        assert!(registry.get("c").is_none());
    }

    #[test]
    fn test_default_registry_sinks_for_sorter_only() {
        let sorter = default_registry("sorter").unwrap();
        assert_eq!(
            sorter.tags(),
            vec!["echo", "error", "missing-pipeline", "processed", "user-signup"]
        );

        let notifier = default_registry("notifier").unwrap();
        assert_eq!(notifier.tags(), vec!["echo", "user-signup"]);
    }
}
