//! Execution Context: dependencies shared by every pipeline in a process
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use evproc_queue::{processor_queue, QueueClient};
use serde::{Deserialize, Serialize};

/// Deployment tier stamped onto outbound error notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Staging,
    #[default]
    Production,
}

impl Environment {
    pub fn from_staging_flag(staging: bool) -> Self {
        if staging {
            Self::Staging
        } else {
            Self::Production
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed bag of shared services, filled during dependency setup.
#[derive(Clone, Default)]
pub struct Services {
    inner: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value`, replacing any earlier service of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.inner.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|service| service.downcast::<T>().ok())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.inner.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("count", &self.inner.len())
            .finish()
    }
}

/// Process-wide dependency bundle.
///
/// Built once after startup and shared behind an `Arc`; nothing in it is
/// mutated by pipeline runs.
pub struct AppContext {
    name: String,
    environment: Environment,
    main_queue: Arc<dyn QueueClient>,
    subqueue: Arc<dyn QueueClient>,
    services: Services,
}

impl AppContext {
    pub fn new(
        name: impl Into<String>,
        environment: Environment,
        main_queue: Arc<dyn QueueClient>,
        subqueue: Arc<dyn QueueClient>,
        services: Services,
    ) -> Self {
        Self {
            name: name.into(),
            environment,
            main_queue,
            subqueue,
            services,
        }
    }

    /// Processor identity (ex: "sorter", "notifier")
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity reported in error notifications: the processor's own queue
    pub fn repository(&self) -> String {
        processor_queue(&self.name)
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Shared control queue
    pub fn main_queue(&self) -> &Arc<dyn QueueClient> {
        &self.main_queue
    }

    /// This processor's work queue
    pub fn subqueue(&self) -> &Arc<dyn QueueClient> {
        &self.subqueue
    }

    pub fn services(&self) -> &Services {
        &self.services
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("name", &self.name)
            .field("environment", &self.environment)
            .field("main_queue", &self.main_queue.name())
            .field("subqueue", &self.subqueue.name())
            .field("services", &self.services)
            .finish()
    }
}

/// Per-run view handed to every stage of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    app: Arc<AppContext>,
    pub event: String,
    pub trace_id: String,
    pub started_at: DateTime<Utc>,
}

impl PipelineContext {
    pub fn new(app: Arc<AppContext>, event: impl Into<String>) -> Self {
        Self {
            app,
            event: event.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
        }
    }

    pub fn app(&self) -> &AppContext {
        &self.app
    }

    pub fn app_handle(&self) -> Arc<AppContext> {
        Arc::clone(&self.app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evproc_queue::{MemoryBroker, QueueOptions};

    fn app(name: &str) -> Arc<AppContext> {
        let broker = MemoryBroker::new();
        let main = broker.queue(QueueOptions::new("memory://test", "main"));
        let sub = broker.queue(QueueOptions::new("memory://test", processor_queue(name)));
        Arc::new(AppContext::new(
            name,
            Environment::Staging,
            Arc::new(main),
            Arc::new(sub),
            Services::new(),
        ))
    }

    #[test]
    fn test_environment_strings() {
        assert_eq!(Environment::from_staging_flag(true).to_string(), "staging");
        assert_eq!(Environment::from_staging_flag(false).to_string(), "production");
        assert_eq!(
            serde_json::to_value(Environment::Staging).unwrap(),
            serde_json::json!("staging")
        );
    }

    #[test]
    fn test_services_typed_lookup() {
        #[derive(Debug, PartialEq)]
        struct Store(&'static str);

        let mut services = Services::new();
        services.insert(Store("users"));

        assert!(services.contains::<Store>());
        assert_eq!(services.get::<Store>().unwrap().0, "users");
        assert!(services.get::<String>().is_none());
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn test_app_context_identity() {
        let app = app("notifier");
        assert_eq!(app.repository(), "queue-notifier");
        assert_eq!(app.main_queue().name(), "main");
        assert_eq!(app.subqueue().name(), "queue-notifier");
    }

    #[test]
    fn test_pipeline_context_trace_ids_differ() {
        let app = app("notifier");
        let a = PipelineContext::new(Arc::clone(&app), "signup");
        let b = PipelineContext::new(app, "signup");

        assert_eq!(a.event, "signup");
        assert_ne!(a.trace_id, b.trace_id);
        assert_eq!(a.app().name(), "notifier");
    }
}
