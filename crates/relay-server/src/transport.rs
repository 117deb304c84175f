use anyhow::{anyhow, Result};
use async_trait::async_trait;
use relay_core::{Attachment, Envelope, InboundEvent, RelayError, RelayResult, Transport};
use serde_json::json;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Slack,
    Stdio,
}

/// CLI flag first, then `RELAY_TRANSPORT`, then Slack.
pub fn determine_transport(cli: Option<&str>, env: Option<&str>) -> Result<TransportKind> {
    let choice = cli
        .or(env)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("slack");

    match choice {
        "slack" => Ok(TransportKind::Slack),
        "stdio" => Ok(TransportKind::Stdio),
        other => Err(anyhow!("Unsupported transport '{}'", other)),
    }
}

type LineReader = Box<dyn AsyncBufRead + Unpin + Send>;
type LineWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// JSON-lines transport: one `InboundEvent` per input line, acks and replies
/// written as JSON lines.
pub struct LineTransport {
    reader: Mutex<Option<LineReader>>,
    writer: Mutex<LineWriter>,
}

impl LineTransport {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            reader: Mutex::new(Some(Box::new(reader))),
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }

    async fn write_line(&self, value: serde_json::Value) -> RelayResult<()> {
        let line = value.to_string() + "\n";
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|err| RelayError::Transport(err.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|err| RelayError::Transport(err.to_string()))
    }
}

#[async_trait]
impl Transport for LineTransport {
    fn name(&self) -> &str {
        "stdio"
    }

    async fn listen(&self, events: mpsc::Sender<Envelope>) -> RelayResult<()> {
        let Some(mut reader) = self.reader.lock().await.take() else {
            return Err(RelayError::Transport("input already consumed".into()));
        };

        let mut line = String::new();
        let mut line_no = 0u64;
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .await
                .map_err(|err| RelayError::Transport(err.to_string()))?;
            if read == 0 {
                debug!("input closed (EOF)");
                return Ok(());
            }
            line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let event = match serde_json::from_str::<InboundEvent>(trimmed) {
                Ok(event) => event,
                Err(err) => {
                    warn!(line = line_no, "unparseable event: {}", err);
                    InboundEvent::Unsupported {
                        kind: "invalid".into(),
                    }
                }
            };

            let envelope = Envelope {
                id: format!("line-{line_no}"),
                event,
            };
            if events.send(envelope).await.is_err() {
                debug!("event loop gone; stopping input");
                return Ok(());
            }
        }
    }

    async fn ack(&self, envelope_id: &str) -> RelayResult<()> {
        self.write_line(json!({ "ack": envelope_id })).await
    }

    async fn post(&self, channel: &str, attachment: &Attachment) -> RelayResult<()> {
        self.write_line(json!({
            "channel": channel,
            "attachments": [attachment],
        }))
        .await
    }
}
