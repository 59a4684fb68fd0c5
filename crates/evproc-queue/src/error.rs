//! Queue error model
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("QUEUE/CONNECT: {queue}: {reason}")]
    Connect { queue: String, reason: String },

    #[error("QUEUE/NOT_CONNECTED: {0}")]
    NotConnected(String),

    #[error("QUEUE/ALREADY_WATCHED: {0}")]
    AlreadyWatched(String),

    #[error("QUEUE/CLOSED: {0}")]
    Closed(String),

    #[error("QUEUE/DELIVERY: {0}")]
    Delivery(String),

    #[error("QUEUE/UNSUPPORTED: {0}")]
    Unsupported(String),
}
