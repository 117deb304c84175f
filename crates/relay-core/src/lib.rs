use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub mod auth;
pub mod config;
mod error;
pub mod event;
pub mod reply;

pub use auth::{is_authorized, AllowList};
pub use config::{RelayConfig, RestartTarget, SlackCredentials};
pub use error::{RelayError, RelayResult, RunError};
pub use event::{Envelope, InboundEvent, MentionEvent, SlashCommand};
pub use reply::{format_reply, Attachment, AttachmentField, ColorTag, CommandResult};

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Standard output and standard error interleaved in arrival order.
    pub output: Vec<u8>,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Runs one external program under a wall-clock deadline.
///
/// A non-zero exit is not an error; only resolution failure, spawn failure and
/// deadline expiry are.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, action: &str, args: &[String]) -> Result<ProcessOutput, RunError>;
}

/// Looks up candidate image URLs for a free-text query.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    async fn candidates(&self, query: &str) -> RelayResult<Vec<String>>;
}

/// Chat platform boundary.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver inbound events into `events` until the connection ends or the
    /// receiver is dropped.
    async fn listen(&self, events: mpsc::Sender<Envelope>) -> RelayResult<()>;

    async fn ack(&self, envelope_id: &str) -> RelayResult<()>;

    async fn post(&self, channel: &str, attachment: &Attachment) -> RelayResult<()>;

    /// Fill in details that need a round trip, such as the sender's display
    /// name. Runs after the event has been acknowledged.
    async fn resolve(&self, event: InboundEvent) -> InboundEvent {
        event
    }
}

/// Handler selected by keyword containment in a mention.
#[async_trait]
pub trait MentionHandler: Send + Sync {
    fn keyword(&self) -> &str;

    /// Privileged handlers only run for allow-listed senders.
    fn privileged(&self) -> bool {
        false
    }

    async fn handle(&self, event: &MentionEvent) -> RelayResult<CommandResult>;
}

/// Handler selected by exact slash command name.
#[async_trait]
pub trait SlashHandler: Send + Sync {
    fn command(&self) -> &str;

    async fn handle(&self, command: &SlashCommand) -> RelayResult<CommandResult>;
}
