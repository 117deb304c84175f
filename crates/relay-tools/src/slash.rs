use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use relay_core::reply::{Block, BlockElement, OptionObject, TextObject};
use relay_core::{AttachmentField, CommandResult, RelayResult, SlashCommand, SlashHandler};

/// `/hello <text>`: greeting with the date and the initiating user.
pub struct HelloCommand;

#[async_trait]
impl SlashHandler for HelloCommand {
    fn command(&self) -> &str {
        "/hello"
    }

    async fn handle(&self, command: &SlashCommand) -> RelayResult<CommandResult> {
        let fields = vec![
            AttachmentField::new(
                "Date",
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            AttachmentField::new("Initializer", command.user_name.clone()),
        ];
        Ok(CommandResult::success(format!("Hello {}", command.text)).with_fields(fields))
    }
}

/// `/was-this-article-useful`: yes/no checkbox survey.
pub struct ArticleFeedbackCommand;

impl ArticleFeedbackCommand {
    fn survey() -> Block {
        let option = |value: &str, label: &str, hint: &str| OptionObject {
            text: TextObject::markdown(label),
            value: value.to_string(),
            description: Some(TextObject::markdown(hint)),
        };

        Block::Section {
            text: TextObject::markdown("Did you think this article was helpful?"),
            accessory: Some(BlockElement::Checkboxes {
                action_id: "answer".to_string(),
                options: vec![
                    option("yes", "Yes", "Did you Enjoy it?"),
                    option("no", "No", "Did you Dislike it?"),
                ],
            }),
        }
    }
}

#[async_trait]
impl SlashHandler for ArticleFeedbackCommand {
    fn command(&self) -> &str {
        "/was-this-article-useful"
    }

    async fn handle(&self, _command: &SlashCommand) -> RelayResult<CommandResult> {
        Ok(CommandResult::success("Rate the tutorial").with_blocks(vec![Self::survey()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(name: &str, text: &str) -> SlashCommand {
        SlashCommand {
            command: name.into(),
            text: text.into(),
            user_id: "U1".into(),
            user_name: "alice".into(),
            channel_id: "C1".into(),
        }
    }

    #[tokio::test]
    async fn hello_greets_and_names_initializer() {
        let result = HelloCommand
            .handle(&command("/hello", "world"))
            .await
            .expect("hello");
        assert_eq!(result.text, "Hello world");
        assert!(result
            .fields
            .contains(&AttachmentField::new("Initializer", "alice")));
        assert!(result.fields.iter().any(|f| f.title == "Date"));
    }

    #[tokio::test]
    async fn survey_offers_yes_and_no() {
        let result = ArticleFeedbackCommand
            .handle(&command("/was-this-article-useful", ""))
            .await
            .expect("survey");
        assert_eq!(result.text, "Rate the tutorial");
        let Block::Section {
            accessory: Some(BlockElement::Checkboxes { options, .. }),
            ..
        } = &result.blocks[0]
        else {
            panic!("expected checkbox section");
        };
        let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["yes", "no"]);
    }
}
