//! Slack Socket Mode transport.
//!
//! Events arrive over a WebSocket opened with the app-level token; replies and
//! user lookups go through the Web API with the bot token.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use relay_core::{
    Attachment, Envelope, InboundEvent, MentionEvent, RelayError, RelayResult, SlackCredentials,
    SlashCommand, Transport,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

const API_BASE: &str = "https://slack.com/api";
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SocketSink = SplitSink<Socket, Message>;
type SocketStream = SplitStream<Socket>;

#[derive(Debug, Deserialize)]
struct OpenConnectionResponse {
    ok: bool,
    error: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    ok: bool,
    error: Option<String>,
    user: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

fn api_error(error: Option<String>) -> RelayError {
    RelayError::Transport(error.unwrap_or_else(|| "unknown error".into()))
}

fn http_error(err: reqwest::Error) -> RelayError {
    RelayError::Transport(err.to_string())
}

/// Minimal Web API wrapper.
pub struct SlackApi {
    client: Client,
    credentials: SlackCredentials,
}

impl SlackApi {
    pub fn new(credentials: SlackCredentials) -> Self {
        Self {
            client: Client::new(),
            credentials,
        }
    }

    /// WebSocket URL for a fresh Socket Mode connection.
    pub async fn open_connection(&self) -> RelayResult<String> {
        let parsed: OpenConnectionResponse = self
            .client
            .post(format!("{API_BASE}/apps.connections.open"))
            .bearer_auth(&self.credentials.app_token)
            .send()
            .await
            .map_err(http_error)?
            .json()
            .await
            .map_err(http_error)?;
        if !parsed.ok {
            return Err(api_error(parsed.error));
        }
        parsed
            .url
            .ok_or_else(|| RelayError::Transport("missing socket url".into()))
    }

    pub async fn user_name(&self, user_id: &str) -> RelayResult<String> {
        let parsed: UserInfoResponse = self
            .client
            .get(format!("{API_BASE}/users.info"))
            .bearer_auth(&self.credentials.bot_token)
            .query(&[("user", user_id)])
            .send()
            .await
            .map_err(http_error)?
            .json()
            .await
            .map_err(http_error)?;
        if !parsed.ok {
            return Err(api_error(parsed.error));
        }
        parsed
            .user
            .map(|user| user.name)
            .ok_or_else(|| RelayError::Transport("missing user".into()))
    }

    pub async fn post_message(&self, channel: &str, attachment: &Attachment) -> RelayResult<()> {
        let body = json!({
            "channel": channel,
            "attachments": [attachment],
        });
        let parsed: PostMessageResponse = self
            .client
            .post(format!("{API_BASE}/chat.postMessage"))
            .bearer_auth(&self.credentials.bot_token)
            .json(&body)
            .send()
            .await
            .map_err(http_error)?
            .json()
            .await
            .map_err(http_error)?;
        if !parsed.ok {
            return Err(api_error(parsed.error));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SocketEnvelope {
    #[serde(rename = "type")]
    kind: String,
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Value,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppMention {
    user: String,
    channel: String,
    #[serde(default)]
    text: String,
}

/// One decoded Socket Mode frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Hello,
    Disconnect(String),
    Mention {
        envelope_id: String,
        user: String,
        channel: String,
        text: String,
    },
    Slash {
        envelope_id: String,
        command: SlashCommand,
    },
    Other {
        envelope_id: Option<String>,
        kind: String,
    },
}

pub fn parse_frame(raw: &str) -> RelayResult<Frame> {
    let envelope: SocketEnvelope = serde_json::from_str(raw)
        .map_err(|err| RelayError::Transport(format!("bad socket frame: {err}")))?;

    let frame = match (envelope.kind.as_str(), envelope.envelope_id) {
        ("hello", _) => Frame::Hello,
        ("disconnect", _) => Frame::Disconnect(envelope.reason.unwrap_or_default()),
        ("events_api", Some(envelope_id)) => {
            let event = envelope.payload.get("event").cloned().unwrap_or(Value::Null);
            let inner = event
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            match (inner.as_str(), serde_json::from_value::<AppMention>(event)) {
                ("app_mention", Ok(mention)) => Frame::Mention {
                    envelope_id,
                    user: mention.user,
                    channel: mention.channel,
                    text: mention.text,
                },
                _ => Frame::Other {
                    envelope_id: Some(envelope_id),
                    kind: format!("events_api/{inner}"),
                },
            }
        }
        ("slash_commands", Some(envelope_id)) => {
            match serde_json::from_value::<SlashCommand>(envelope.payload) {
                Ok(command) => Frame::Slash {
                    envelope_id,
                    command,
                },
                Err(err) => {
                    warn!("malformed slash command payload: {}", err);
                    Frame::Other {
                        envelope_id: Some(envelope_id),
                        kind: "slash_commands".into(),
                    }
                }
            }
        }
        (kind, envelope_id) => Frame::Other {
            envelope_id,
            kind: kind.to_string(),
        },
    };
    Ok(frame)
}

/// Envelope for the event loop. Mentions carry the raw user id as sender until
/// `Transport::resolve` runs.
pub fn into_envelope(frame: Frame) -> Option<Envelope> {
    match frame {
        Frame::Hello => {
            debug!("socket mode hello");
            None
        }
        Frame::Disconnect(_) => None,
        Frame::Mention {
            envelope_id,
            user,
            channel,
            text,
        } => Some(Envelope {
            id: envelope_id,
            event: InboundEvent::Mention(MentionEvent {
                sender: user,
                channel,
                text,
            }),
        }),
        Frame::Slash {
            envelope_id,
            command,
        } => Some(Envelope {
            id: envelope_id,
            event: InboundEvent::SlashCommand(command),
        }),
        Frame::Other {
            envelope_id: Some(envelope_id),
            kind,
        } => Some(Envelope {
            id: envelope_id,
            event: InboundEvent::Unsupported { kind },
        }),
        Frame::Other {
            envelope_id: None,
            kind,
        } => {
            debug!(%kind, "ignoring frame without envelope");
            None
        }
    }
}

enum Pump {
    Reconnect,
    Stop,
}

pub struct SlackTransport {
    api: SlackApi,
    sink: Mutex<Option<SocketSink>>,
}

impl SlackTransport {
    pub fn new(credentials: SlackCredentials) -> Self {
        Self {
            api: SlackApi::new(credentials),
            sink: Mutex::new(None),
        }
    }

    async fn connect(&self) -> RelayResult<SocketStream> {
        let url = self.api.open_connection().await?;
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|err| RelayError::Transport(format!("socket connect failed: {err}")))?;
        let (sink, stream) = socket.split();
        *self.sink.lock().await = Some(sink);
        info!("socket mode connection established");
        Ok(stream)
    }

    /// Display name of a user; the raw id if the lookup fails.
    async fn resolve_sender(&self, user_id: &str) -> String {
        match self.api.user_name(user_id).await {
            Ok(name) => name,
            Err(err) => {
                warn!(%user_id, "user lookup failed: {}", err);
                user_id.to_string()
            }
        }
    }

    async fn pump(&self, stream: &mut SocketStream, events: &mpsc::Sender<Envelope>) -> Pump {
        while let Some(message) = stream.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(frame)) => {
                    info!(?frame, "socket closed by server");
                    return Pump::Reconnect;
                }
                Ok(_) => continue,
                Err(err) => {
                    warn!("socket read failed: {}", err);
                    return Pump::Reconnect;
                }
            };

            let frame = match parse_frame(&text) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!("{}", err);
                    continue;
                }
            };
            if let Frame::Disconnect(reason) = &frame {
                info!(%reason, "server requested reconnect");
                return Pump::Reconnect;
            }

            if let Some(envelope) = into_envelope(frame) {
                if events.send(envelope).await.is_err() {
                    return Pump::Stop;
                }
            }
        }
        Pump::Reconnect
    }
}

#[async_trait]
impl Transport for SlackTransport {
    fn name(&self) -> &str {
        "slack"
    }

    /// The first connection failure is returned; later ones are retried with
    /// backoff.
    async fn listen(&self, events: mpsc::Sender<Envelope>) -> RelayResult<()> {
        let mut stream = self.connect().await?;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if let Pump::Stop = self.pump(&mut stream, &events).await {
                return Ok(());
            }
            self.sink.lock().await.take();

            stream = loop {
                match self.connect().await {
                    Ok(stream) => {
                        backoff = INITIAL_BACKOFF;
                        break stream;
                    }
                    Err(err) => {
                        warn!(backoff_secs = backoff.as_secs(), "reconnect failed: {}", err);
                        sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            };
        }
    }

    async fn ack(&self, envelope_id: &str) -> RelayResult<()> {
        let mut guard = self.sink.lock().await;
        let sink = guard
            .as_mut()
            .ok_or_else(|| RelayError::Transport("socket not connected".into()))?;
        sink.send(Message::Text(
            json!({ "envelope_id": envelope_id }).to_string(),
        ))
        .await
        .map_err(|err| RelayError::Transport(format!("ack failed: {err}")))
    }

    async fn post(&self, channel: &str, attachment: &Attachment) -> RelayResult<()> {
        self.api.post_message(channel, attachment).await
    }

    async fn resolve(&self, event: InboundEvent) -> InboundEvent {
        match event {
            InboundEvent::Mention(mut mention) => {
                mention.sender = self.resolve_sender(&mention.sender).await;
                InboundEvent::Mention(mention)
            }
            other => other,
        }
    }
}
