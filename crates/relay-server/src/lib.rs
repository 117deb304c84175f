use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use relay_core::{
    format_reply, is_authorized, AllowList, CommandResult, Envelope, InboundEvent, MentionEvent,
    MentionHandler, RelayError, RelayResult, SlashCommand, SlashHandler, Transport,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod slack;
pub mod transport;

/// Capacity of the channel between the transport and the event loop.
pub const EVENT_BUFFER: usize = 64;

pub const FAILURE_NOTICE: &str = "Something went wrong while handling your command";

/// Maps inbound events to exactly one handler.
#[derive(Clone)]
pub struct CommandRouter {
    mention: Vec<Arc<dyn MentionHandler>>,
    fallback: Arc<dyn MentionHandler>,
    slash: HashMap<String, Arc<dyn SlashHandler>>,
    allow_list: AllowList,
}

impl CommandRouter {
    pub fn new(
        mention: Vec<Arc<dyn MentionHandler>>,
        fallback: Arc<dyn MentionHandler>,
        slash: Vec<Arc<dyn SlashHandler>>,
        allow_list: AllowList,
    ) -> Self {
        let mut table = HashMap::new();
        for handler in slash {
            let name = handler.command().to_string();
            if table.contains_key(&name) {
                warn!(command = %name, "duplicate slash command ignored");
                continue;
            }
            table.insert(name, handler);
        }

        Self {
            mention,
            fallback,
            slash: table,
            allow_list,
        }
    }

    /// First handler, in registration order, whose keyword occurs in `text`.
    pub fn route_mention(&self, text: &str) -> &Arc<dyn MentionHandler> {
        let lowered = text.to_lowercase();
        self.mention
            .iter()
            .find(|handler| lowered.contains(handler.keyword()))
            .unwrap_or(&self.fallback)
    }

    pub fn route_slash(&self, command: &str) -> Option<&Arc<dyn SlashHandler>> {
        self.slash.get(command)
    }

    /// Route a mention and run its handler. Privileged handlers are gated on
    /// the sender before they are invoked.
    pub async fn dispatch_mention(&self, event: &MentionEvent) -> RelayResult<CommandResult> {
        let handler = self.route_mention(&event.text);
        debug!(keyword = handler.keyword(), sender = %event.sender, "mention routed");

        if handler.privileged() && !is_authorized(&event.sender, &self.allow_list) {
            let denial = RelayError::Denied {
                identity: event.sender.clone(),
            };
            info!(keyword = handler.keyword(), "{}", denial);
            return Ok(CommandResult::denied());
        }

        handler.handle(event).await
    }

    /// Unknown commands produce `Ok(None)`.
    pub async fn dispatch_slash(&self, command: &SlashCommand) -> RelayResult<Option<CommandResult>> {
        let Some(handler) = self.route_slash(&command.command) else {
            debug!(command = %command.command, "ignoring unknown slash command");
            return Ok(None);
        };
        handler.handle(command).await.map(Some)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    ShuttingDown,
}

/// Single dispatcher between a transport and the router.
pub struct RelayServer {
    router: CommandRouter,
    transport: Arc<dyn Transport>,
}

impl RelayServer {
    pub fn new(router: CommandRouter, transport: Arc<dyn Transport>) -> Self {
        Self { router, transport }
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    /// Run the transport and the event loop until the transport ends or
    /// `shutdown` fires.
    pub async fn serve(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let server = Arc::clone(&self);
        let loop_shutdown = shutdown.clone();
        let event_loop = tokio::spawn(async move { server.run(rx, loop_shutdown).await });

        info!(transport = self.transport.name(), "relay listening");
        let listened = tokio::select! {
            result = self.transport.listen(tx) => result,
            _ = shutdown.cancelled() => Ok(()),
        };

        // The sender is gone either way, so the loop drains what is queued and stops.
        let final_state = event_loop
            .await
            .map_err(|err| anyhow!("event loop task failed: {err}"))?;
        debug!(?final_state, "event loop finished");

        listened?;
        Ok(())
    }

    /// Process events one at a time until cancelled or the channel closes.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<Envelope>,
        shutdown: CancellationToken,
    ) -> LoopState {
        let mut state = LoopState::Running;

        while state == LoopState::Running {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutting down event listener");
                    state = LoopState::ShuttingDown;
                }
                next = events.recv() => match next {
                    Some(envelope) => self.process(envelope).await,
                    None => {
                        info!("event channel closed");
                        state = LoopState::ShuttingDown;
                    }
                },
            }
        }

        state
    }

    /// Acknowledge, dispatch and reply to one event. Never fails: every error is
    /// logged and at most turns into a failure notice for the requester.
    pub async fn process(&self, envelope: Envelope) {
        let Envelope { id, event } = envelope;

        if let Err(err) = self.transport.ack(&id).await {
            warn!(envelope_id = %id, "failed to acknowledge event: {}", err);
        }

        let event = self.transport.resolve(event).await;
        let outcome = self.handle_event(&event).await;
        let Some(channel) = event.channel() else {
            if let Err(err) = outcome {
                debug!(kind = event.kind(), "{}", err);
            }
            return;
        };

        let result = match outcome {
            Ok(Some(result)) => result,
            Ok(None) => return,
            Err(err @ RelayError::UnsupportedEvent(_)) => {
                debug!("{}", err);
                return;
            }
            Err(err) => {
                warn!(%channel, kind = event.kind(), "handler failed: {}", err);
                CommandResult::info(FAILURE_NOTICE).with_pretext("Error")
            }
        };

        let attachment = format_reply(result);
        if let Err(err) = self.transport.post(channel, &attachment).await {
            warn!(%channel, "failed to post reply: {}", err);
        }
    }

    async fn handle_event(&self, event: &InboundEvent) -> RelayResult<Option<CommandResult>> {
        match event {
            InboundEvent::Mention(mention) => self.router.dispatch_mention(mention).await.map(Some),
            InboundEvent::SlashCommand(command) => self.router.dispatch_slash(command).await,
            InboundEvent::Unsupported { kind } => Err(RelayError::UnsupportedEvent(kind.clone())),
        }
    }
}
