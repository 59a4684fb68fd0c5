//! In-process broker backed by tokio channels.
//!
//! Every named queue gets one unbounded channel. Handles created from the
//! same broker share queues by name, so a processor publishing to `main`
//! is visible to whoever watches `main`. A broker built with
//! [`MemoryBroker::with_history`] also records everything sent per queue,
//! which is what tests assert against.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::client::{QueueClient, QueueFactory, QueueOptions, Subscription};
use crate::error::QueueError;
use crate::message::Message;

type Delivery = Result<Message, QueueError>;

#[derive(Debug)]
struct Slot {
    tx: Option<mpsc::UnboundedSender<Delivery>>,
    rx: Option<mpsc::UnboundedReceiver<Delivery>>,
    history: Vec<Message>,
    fail_connect: Option<String>,
}

impl Slot {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Some(tx),
            rx: Some(rx),
            history: Vec::new(),
            fail_connect: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Shared {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
    record: bool,
}

impl Shared {
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        // a panicking holder cannot leave a slot half-written
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, queue: &str, message: Message) -> Result<(), QueueError> {
        let mut slots = self.slots();
        let slot = slots.entry(queue.to_string()).or_insert_with(Slot::new);
        let tx = slot
            .tx
            .as_ref()
            .ok_or_else(|| QueueError::Closed(queue.to_string()))?;
        tx.send(Ok(message.clone()))
            .map_err(|_| QueueError::Closed(queue.to_string()))?;
        if self.record {
            slot.history.push(message);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryBroker {
    shared: Shared,
}

impl MemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Broker that keeps every sent message for [`MemoryBroker::sent`].
    /// The history is never trimmed; meant for tests and short local runs.
    pub fn with_history() -> Arc<Self> {
        Arc::new(Self {
            shared: Shared {
                record: true,
                ..Shared::default()
            },
        })
    }

    /// Handle bound to `options.queue` on this broker.
    pub fn queue(&self, options: QueueOptions) -> MemoryQueue {
        self.shared
            .slots()
            .entry(options.queue.clone())
            .or_insert_with(Slot::new);
        MemoryQueue {
            shared: self.shared.clone(),
            options,
            connected: AtomicBool::new(false),
        }
    }

    /// Make every later `connect` on `queue` fail with `reason`.
    pub fn fail_connect(&self, queue: &str, reason: impl Into<String>) {
        self.shared
            .slots()
            .entry(queue.to_string())
            .or_insert_with(Slot::new)
            .fail_connect = Some(reason.into());
    }

    /// Enqueue a message without going through a connected handle.
    pub fn publish(&self, queue: &str, message: Message) -> Result<(), QueueError> {
        self.shared.publish(queue, message)
    }

    /// Push a delivery failure to the subscriber of `queue`.
    pub fn inject_error(&self, queue: &str, error: QueueError) -> Result<(), QueueError> {
        let mut slots = self.shared.slots();
        let slot = slots.entry(queue.to_string()).or_insert_with(Slot::new);
        match slot.tx.as_ref() {
            Some(tx) => tx
                .send(Err(error))
                .map_err(|_| QueueError::Closed(queue.to_string())),
            None => Err(QueueError::Closed(queue.to_string())),
        }
    }

    /// Stop accepting messages on `queue`. The subscriber drains what is
    /// already queued and then sees the end of the stream.
    pub fn close(&self, queue: &str) {
        if let Some(slot) = self.shared.slots().get_mut(queue) {
            slot.tx = None;
        }
    }

    /// Every message sent to `queue` so far, in send order. Always empty
    /// unless the broker was built with [`MemoryBroker::with_history`].
    pub fn sent(&self, queue: &str) -> Vec<Message> {
        self.shared
            .slots()
            .get(queue)
            .map(|slot| slot.history.clone())
            .unwrap_or_default()
    }
}

impl QueueFactory for MemoryBroker {
    fn open(&self, options: QueueOptions) -> Result<Arc<dyn QueueClient>, QueueError> {
        Ok(Arc::new(self.queue(options)))
    }
}

pub struct MemoryQueue {
    shared: Shared,
    options: QueueOptions,
    connected: AtomicBool,
}

impl MemoryQueue {
    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> Result<(), QueueError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(QueueError::NotConnected(self.options.queue.clone()))
        }
    }
}

#[async_trait]
impl QueueClient for MemoryQueue {
    fn name(&self) -> &str {
        &self.options.queue
    }

    async fn connect(&self) -> Result<(), QueueError> {
        let refused = self
            .shared
            .slots()
            .get(&self.options.queue)
            .and_then(|slot| slot.fail_connect.clone());
        if let Some(reason) = refused {
            return Err(QueueError::Connect {
                queue: self.options.queue.clone(),
                reason,
            });
        }

        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!(queue = %self.options.queue, url = %self.options.url, "memory queue connected");
        Ok(())
    }

    async fn send(&self, message: &Message) -> Result<(), QueueError> {
        self.ensure_connected()?;
        self.shared.publish(&self.options.queue, message.clone())
    }

    async fn watch(&self) -> Result<Subscription, QueueError> {
        self.ensure_connected()?;
        let rx = self
            .shared
            .slots()
            .get_mut(&self.options.queue)
            .and_then(|slot| slot.rx.take())
            .ok_or_else(|| QueueError::AlreadyWatched(self.options.queue.clone()))?;
        Ok(Subscription::new(self.options.queue.clone(), rx))
    }
}
