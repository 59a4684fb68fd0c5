//! QueueClient: the only transport surface the processor core relies on
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::QueueError;
use crate::message::Message;

/// Connection options for one queue handle.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueOptions {
    /// Broker location (ex: "memory://local")
    pub url: String,
    /// Queue name on that broker
    pub queue: String,
    /// Whether the queue accepts delayed delivery
    pub delayed: bool,
}

impl QueueOptions {
    pub fn new(url: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            queue: queue.into(),
            delayed: false,
        }
    }

    pub fn delayed(mut self, delayed: bool) -> Self {
        self.delayed = delayed;
        self
    }
}

/// Transport capability.
///
/// `watch` hands back a [`Subscription`] that yields one item per delivery
/// for as long as the subscription lives. Delivery problems show up as
/// `Err` items rather than ending the stream.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Queue name this handle is bound to
    fn name(&self) -> &str;

    async fn connect(&self) -> Result<(), QueueError>;

    async fn send(&self, message: &Message) -> Result<(), QueueError>;

    async fn watch(&self) -> Result<Subscription, QueueError>;
}

/// Stream of deliveries from a watched queue.
pub struct Subscription {
    queue: String,
    rx: mpsc::UnboundedReceiver<Result<Message, QueueError>>,
}

impl Subscription {
    pub fn new(
        queue: impl Into<String>,
        rx: mpsc::UnboundedReceiver<Result<Message, QueueError>>,
    ) -> Self {
        Self {
            queue: queue.into(),
            rx,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Next delivery; `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<Result<Message, QueueError>> {
        self.rx.recv().await
    }
}

/// Opens queue handles on one broker.
pub trait QueueFactory: Send + Sync {
    fn open(&self, options: QueueOptions) -> Result<Arc<dyn QueueClient>, QueueError>;
}
