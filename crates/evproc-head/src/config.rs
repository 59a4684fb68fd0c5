//! Process configuration, from flags or the environment
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::builder::FalseyValueParser;
use clap::Parser;
use evproc_core::{Environment, Message, ProcessorError};
use evproc_queue::MemoryBroker;

const MEMORY_SCHEME: &str = "memory://";

#[derive(Debug, Clone, Parser)]
#[command(name = "evproc", about = "Queue-driven event processor")]
pub struct ProcessorConfig {
    /// Processor identity. `sorter` watches the control queue, every other
    /// name watches `queue-<name>`.
    #[arg(long, env = "PROCESSOR_NAME")]
    pub name: String,

    /// Message queue location.
    #[arg(long, env = "MQ_URL", default_value = "memory://local")]
    pub mq_url: String,

    /// Stamp error notifications with `staging` instead of `production`.
    /// Any value of `STAGING` other than a false literal (0, false, no, off)
    /// turns it on.
    #[arg(long, env = "STAGING", value_parser = FalseyValueParser::new())]
    pub staging: bool,

    /// Serve `/health` and `/metrics` on this address.
    #[arg(long, env = "PROCESSOR_ADMIN_ADDR")]
    pub admin_addr: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    pub json_logs: bool,

    /// JSON-lines file of messages to enqueue on the watched queue at startup.
    #[arg(long)]
    pub replay: Option<PathBuf>,
}

impl ProcessorConfig {
    pub fn environment(&self) -> Environment {
        Environment::from_staging_flag(self.staging)
    }

    /// Broker for `mq_url`. Only the in-process broker is built in.
    pub fn broker(&self) -> Result<Arc<MemoryBroker>, ProcessorError> {
        if self.mq_url.starts_with(MEMORY_SCHEME) {
            Ok(MemoryBroker::new())
        } else {
            Err(ProcessorError::Config(format!(
                "unsupported queue url '{}', expected {}<name>",
                self.mq_url, MEMORY_SCHEME
            )))
        }
    }

    /// Messages from the replay file, if one was given.
    pub async fn load_replay(&self) -> Result<Vec<Message>, ProcessorError> {
        let Some(path) = &self.replay else {
            return Ok(Vec::new());
        };

        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProcessorError::Config(format!("{}: {}", path.display(), e)))?;
        parse_replay(&raw)
            .map_err(|e| ProcessorError::Config(format!("{}: {}", path.display(), e)))
    }
}

/// One message per non-blank line.
pub fn parse_replay(raw: &str) -> Result<Vec<Message>, String> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            Message::from_json(line).map_err(|e| format!("line {}: {}", idx + 1, e))
        })
        .collect()
}
