//! Head: boots a processor, watches its queue and routes every message to
//! the pipeline registered for its event tag.
//!
//! Pipeline failures never escape the dispatcher. They are turned into an
//! error notification on the control queue and the watch loop moves on.
//! Only startup failures are fatal, and those are escalated the same way
//! (best effort) before [`Head::start`] returns the error.
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use evproc_core::{
    error_notification, missing_pipeline, AppContext, Environment, ErrorReport, Message,
    ProcessorError, Services,
};
use evproc_queue::{
    processor_queue, QueueClient, QueueError, QueueFactory, QueueOptions, Subscription, MAIN_QUEUE,
};
use tokio::task::JoinError;

use crate::metrics::DispatchMetrics;
use crate::registry::PipelineRegistry;

/// Processor identity that reads the control queue and re-routes.
pub const SORTER: &str = "sorter";

/// Whether processor `name` watches the control queue rather than its own.
pub fn watches_control_queue(name: &str) -> bool {
    name == SORTER
}

/// Queue that processor `name` watches for its whole lifetime.
pub fn watched_queue(name: &str) -> String {
    if watches_control_queue(name) {
        MAIN_QUEUE.to_string()
    } else {
        processor_queue(name)
    }
}

/// Startup hook for shared services. Runs before any queue connects.
#[async_trait]
pub trait DependencySetup: Send + Sync {
    async fn setup(&self, services: &mut Services) -> Result<(), ProcessorError>;
}

/// Default hook: nothing to set up.
pub struct NoDependencies;

#[async_trait]
impl DependencySetup for NoDependencies {
    async fn setup(&self, _services: &mut Services) -> Result<(), ProcessorError> {
        Ok(())
    }
}

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Completed,
    Halted,
    Failed,
    Missing,
}

impl Dispatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Halted => "halted",
            Self::Failed => "failed",
            Self::Missing => "missing",
        }
    }
}

/// Publish an error notification for `report` on `control`.
///
/// Failure to publish is logged and handed back; callers treat it as
/// non-fatal.
pub async fn escalate(
    control: &Arc<dyn QueueClient>,
    report: &ErrorReport,
    event: Option<&Message>,
) -> Result<(), QueueError> {
    tracing::error!(
        repository = %report.repository,
        environment = %report.environment,
        error = %report.message,
        event = ?event.map(Message::route),
        "error occurred"
    );

    let envelope = error_notification(report, event);
    match control.send(&envelope).await {
        Ok(()) => {
            tracing::debug!("sent error notification");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not send error notification");
            Err(e)
        }
    }
}

/// Control queue handle as far as startup got with it.
struct Control {
    queue: Arc<dyn QueueClient>,
    connected: bool,
}

/// Processor bootstrap: identity, transport and registered pipelines.
pub struct Head {
    name: String,
    environment: Environment,
    url: String,
    queues: Arc<dyn QueueFactory>,
    registry: PipelineRegistry,
    setup: Arc<dyn DependencySetup>,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl Head {
    pub fn new(
        name: impl Into<String>,
        environment: Environment,
        url: impl Into<String>,
        queues: Arc<dyn QueueFactory>,
        registry: PipelineRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            environment,
            url: url.into(),
            queues,
            registry,
            setup: Arc::new(NoDependencies),
            metrics: None,
        }
    }

    pub fn with_setup(mut self, setup: Arc<dyn DependencySetup>) -> Self {
        self.setup = setup;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set up dependencies, connect the control queue then the work queue,
    /// and subscribe to the one queue this processor watches.
    ///
    /// Any failure is escalated to the control queue and returned; the
    /// caller is expected to exit. Escalation is best effort: a failure
    /// before the control queue connected (dependency setup) first tries to
    /// connect it just to report, and a refused control queue leaves the
    /// failure in the logs only.
    pub async fn start(self) -> Result<(Dispatcher, Subscription), ProcessorError> {
        let mut control: Option<Control> = None;

        match self.boot(&mut control).await {
            Ok(started) => Ok(started),
            Err(err) => {
                tracing::error!(processor = %self.name, error = %err, "startup failed");
                if let Some(control) = control {
                    self.report_startup_failure(control, &err).await;
                }
                Err(err)
            }
        }
    }

    async fn report_startup_failure(&self, control: Control, err: &ProcessorError) {
        if !control.connected {
            if let Err(e) = control.queue.connect().await {
                tracing::warn!(
                    error = %e,
                    "control queue unavailable, startup failure not published"
                );
                return;
            }
        }
        let report = ErrorReport::new(
            err.to_string(),
            processor_queue(&self.name),
            self.environment,
        );
        let _ = escalate(&control.queue, &report, None).await;
    }

    async fn boot(
        &self,
        control: &mut Option<Control>,
    ) -> Result<(Dispatcher, Subscription), ProcessorError> {
        let main_queue = self
            .queues
            .open(QueueOptions::new(&self.url, MAIN_QUEUE).delayed(true))?;
        let subqueue = self
            .queues
            .open(QueueOptions::new(&self.url, processor_queue(&self.name)))?;
        let control = control.insert(Control {
            queue: Arc::clone(&main_queue),
            connected: false,
        });

        let mut services = Services::new();
        self.setup.setup(&mut services).await?;

        main_queue.connect().await?;
        control.connected = true;
        tracing::info!(queue = %main_queue.name(), "connected to main message queue");
        subqueue.connect().await?;
        tracing::info!(queue = %subqueue.name(), "connected to {} message queue", self.name);

        let app = Arc::new(AppContext::new(
            self.name.clone(),
            self.environment,
            main_queue,
            subqueue,
            services,
        ));

        let watched = if watches_control_queue(&self.name) {
            app.main_queue()
        } else {
            app.subqueue()
        };
        let subscription = watched.watch().await?;
        tracing::info!(processor = %self.name, queue = %subscription.queue(), "watching");

        let mut dispatcher = Dispatcher::new(app, self.registry.clone());
        if let Some(metrics) = &self.metrics {
            dispatcher = dispatcher.with_metrics(Arc::clone(metrics));
        }
        Ok((dispatcher, subscription))
    }

    /// Start, then handle messages until the subscription closes or
    /// `shutdown` resolves. Returns the number of messages handled.
    pub async fn run_until<F>(self, shutdown: F) -> Result<usize, ProcessorError>
    where
        F: Future<Output = ()>,
    {
        let (dispatcher, subscription) = self.start().await?;
        Ok(dispatcher.watch(subscription, shutdown).await)
    }
}

/// Routes messages of a started processor.
pub struct Dispatcher {
    app: Arc<AppContext>,
    registry: PipelineRegistry,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl Dispatcher {
    pub fn new(app: Arc<AppContext>, registry: PipelineRegistry) -> Self {
        Self {
            app,
            registry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn app(&self) -> &Arc<AppContext> {
        &self.app
    }

    pub fn registry(&self) -> &PipelineRegistry {
        &self.registry
    }

    /// Handle one message.
    ///
    /// The pipeline runs in its own task so a panicking stage is reported
    /// like any other failure, with the in-flight message attached. The task
    /// is awaited before returning.
    pub async fn event_processor(&self, message: Message) -> Dispatch {
        let Some(factory) = self.registry.get(&message.event).cloned() else {
            tracing::debug!(route = %message.route(), "missing pipeline");
            if let Err(e) = self.missing_pipeline(&message).await {
                tracing::warn!(error = %e, "could not log missing pipeline");
            }
            return self.finish(Dispatch::Missing);
        };

        tracing::debug!(event = %message.event, "piping to pipeline");
        let app = Arc::clone(&self.app);
        let job = message.clone();
        let start = Instant::now();

        let joined = tokio::spawn(async move {
            let pipeline = factory(app);
            pipeline.run(&job).await
        })
        .await;

        if let Some(metrics) = &self.metrics {
            metrics.observe_run(start.elapsed().as_secs_f64());
        }
        tracing::debug!(event = %message.event, "done with message");

        let dispatch = match joined {
            Ok(Ok(report)) if report.halted => {
                tracing::debug!(trace_id = %report.trace_id, halted_at = ?report.halted_at(), "pipeline halted");
                Dispatch::Halted
            }
            Ok(Ok(_)) => Dispatch::Completed,
            Ok(Err(err)) => {
                let _ = self.error(&err.to_string(), Some(&message)).await;
                Dispatch::Failed
            }
            Err(join) => {
                let err = ProcessorError::Panic(panic_reason(join));
                let _ = self.error(&err.to_string(), Some(&message)).await;
                Dispatch::Failed
            }
        };
        self.finish(dispatch)
    }

    fn finish(&self, dispatch: Dispatch) -> Dispatch {
        if let Some(metrics) = &self.metrics {
            metrics.record(dispatch.as_str());
        }
        dispatch
    }

    /// Publish an error notification stamped with this processor's identity.
    pub async fn error(&self, message: &str, event: Option<&Message>) -> Result<(), QueueError> {
        let report = ErrorReport::for_app(message, &self.app);
        escalate(self.app.main_queue(), &report, event).await
    }

    /// Publish a missing-pipeline log carrying `event`.
    pub async fn missing_pipeline(&self, event: &Message) -> Result<(), QueueError> {
        self.app.main_queue().send(&missing_pipeline(event)).await
    }

    /// Drain `subscription` until it closes or `shutdown` resolves.
    ///
    /// Messages are handled one at a time: the next delivery is read only
    /// once the current pipeline task has finished, so runs of one processor
    /// never overlap. A message already being handled always runs to
    /// completion.
    pub async fn watch<F>(&self, mut subscription: Subscription, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let queue = subscription.queue().to_string();
        let mut handled = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(queue = %queue, "shutdown requested");
                    break;
                }
                delivery = subscription.recv() => match delivery {
                    Some(Ok(message)) => {
                        self.event_processor(message).await;
                        handled += 1;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(queue = %queue, error = %e, "delivery failed");
                    }
                    None => {
                        tracing::info!(queue = %queue, "subscription closed");
                        break;
                    }
                },
            }
        }

        handled
    }
}

fn panic_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return "pipeline task cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "pipeline panicked".to_string()
    }
}
