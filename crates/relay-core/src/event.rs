use serde::{Deserialize, Serialize};

/// Message in which the bot was mentioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionEvent {
    /// Display name of the author once the transport has resolved it; the key
    /// checked against the allow-list.
    pub sender: String,
    pub channel: String,
    pub text: String,
}

impl MentionEvent {
    /// Text used for keyword matching.
    pub fn normalized_text(&self) -> String {
        self.text.to_lowercase()
    }

    /// Tokens following the mention and the keyword, joined with `sep`.
    ///
    /// `"@bot shell ls -la /tmp"` yields `"ls -la /tmp"` for `sep = " "`. Fewer
    /// than three tokens yields an empty string.
    pub fn remainder(&self, sep: &str) -> String {
        self.text
            .split_whitespace()
            .skip(2)
            .collect::<Vec<_>>()
            .join(sep)
    }
}

/// Structured slash command, field names follow the Slack payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashCommand {
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Mention(MentionEvent),
    SlashCommand(SlashCommand),
    /// Anything the transport delivered that no handler understands.
    Unsupported { kind: String },
}

impl InboundEvent {
    pub fn kind(&self) -> &str {
        match self {
            InboundEvent::Mention(_) => "mention",
            InboundEvent::SlashCommand(_) => "slash_command",
            InboundEvent::Unsupported { kind } => kind,
        }
    }

    /// Channel replies for this event go to, if any.
    pub fn channel(&self) -> Option<&str> {
        match self {
            InboundEvent::Mention(ev) => Some(&ev.channel),
            InboundEvent::SlashCommand(cmd) => Some(&cmd.channel_id),
            InboundEvent::Unsupported { .. } => None,
        }
    }
}

/// An event plus the id the transport needs to acknowledge it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub id: String,
    pub event: InboundEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(text: &str) -> MentionEvent {
        MentionEvent {
            sender: "alice".into(),
            channel: "C1".into(),
            text: text.into(),
        }
    }

    #[test]
    fn remainder_drops_mention_and_keyword() {
        let ev = mention("<@U123> shell ls   -la /tmp");
        assert_eq!(ev.remainder(" "), "ls -la /tmp");
        assert_eq!(ev.remainder(""), "ls-la/tmp");
    }

    #[test]
    fn remainder_of_short_text_is_empty() {
        assert_eq!(mention("<@U123> shell").remainder(" "), "");
        assert_eq!(mention("").remainder(" "), "");
    }

    #[test]
    fn parses_tagged_json_lines() {
        let ev: InboundEvent = serde_json::from_str(
            r#"{"type":"slash_command","command":"/hello","text":"world","user_name":"alice","channel_id":"C1"}"#,
        )
        .expect("parse slash command");
        match &ev {
            InboundEvent::SlashCommand(cmd) => {
                assert_eq!(cmd.command, "/hello");
                assert_eq!(cmd.user_id, "");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(ev.channel(), Some("C1"));
        assert_eq!(ev.kind(), "slash_command");
    }
}
