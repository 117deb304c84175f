//! Handler results and their rendering into rich chat attachments.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    Success,
    Denied,
    Timeout,
    Info,
}

impl ColorTag {
    pub fn hex(self) -> &'static str {
        match self {
            ColorTag::Success => "#4af030",
            ColorTag::Denied => "#d40e0d",
            ColorTag::Timeout => "#ecb22e",
            ColorTag::Info => "#3d3d3d",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
}

impl AttachmentField {
    pub fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextKind {
    #[serde(rename = "mrkdwn")]
    Markdown,
    #[serde(rename = "plain_text")]
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextObject {
    #[serde(rename = "type")]
    pub kind: TextKind,
    pub text: String,
}

impl TextObject {
    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            kind: TextKind::Markdown,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionObject {
    pub text: TextObject,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<TextObject>,
}

/// Interactive element placed as a block accessory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockElement {
    Checkboxes {
        action_id: String,
        options: Vec<OptionObject>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        text: TextObject,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accessory: Option<BlockElement>,
    },
}

/// Outcome of exactly one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub text: String,
    pub pretext: String,
    pub color: ColorTag,
    pub fields: Vec<AttachmentField>,
    pub blocks: Vec<Block>,
}

impl CommandResult {
    pub fn new(text: impl Into<String>, color: ColorTag) -> Self {
        Self {
            text: text.into(),
            pretext: String::new(),
            color,
            fields: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(text, ColorTag::Success)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, ColorTag::Info)
    }

    pub fn denied() -> Self {
        Self::new("", ColorTag::Denied).with_pretext("No Permission!")
    }

    pub fn with_pretext(mut self, pretext: impl Into<String>) -> Self {
        self.pretext = pretext.into();
        self
    }

    pub fn with_fields(mut self, fields: Vec<AttachmentField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_blocks(mut self, blocks: Vec<Block>) -> Self {
        self.blocks = blocks;
        self
    }
}

/// Transport-agnostic rich message, serialized in Slack attachment shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub text: String,
    pub pretext: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
}

pub fn format_reply(result: CommandResult) -> Attachment {
    let CommandResult {
        text,
        pretext,
        color,
        fields,
        blocks,
    } = result;

    Attachment {
        text,
        pretext,
        color: color.hex().to_string(),
        fields,
        blocks,
    }
}
