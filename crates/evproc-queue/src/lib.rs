//! evproc Queue: wire message and the transport capability processors depend on.
//!
//! The processor core never talks to a broker directly. It holds
//! `Arc<dyn QueueClient>` handles and only ever calls `connect`, `send`
//! and `watch` on them.
//!
//! ```text
//! main (control) ──▶ sorter ──▶ queue-<processor> ──▶ processor
//!      ▲                                                  │
//!      └──────────── notifications (error, log) ◀─────────┘
//! ```

pub mod client;
pub mod error;
pub mod memory;
pub mod message;

pub use client::{QueueClient, QueueFactory, QueueOptions, Subscription};
pub use error::QueueError;
pub use memory::{MemoryBroker, MemoryQueue};
pub use message::Message;

/// Name of the shared control queue every processor publishes to.
pub const MAIN_QUEUE: &str = "main";

/// Name of the work queue owned by the processor `name`.
pub fn processor_queue(name: &str) -> String {
    format!("queue-{}", name)
}
