use async_trait::async_trait;
use relay_core::{CommandResult, MentionEvent, MentionHandler, RelayResult};

/// Reply for mentions that match no keyword.
pub struct GreetingHandler {
    bot_name: String,
}

impl GreetingHandler {
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
        }
    }
}

#[async_trait]
impl MentionHandler for GreetingHandler {
    fn keyword(&self) -> &str {
        ""
    }

    async fn handle(&self, event: &MentionEvent) -> RelayResult<CommandResult> {
        let text = format!(
            "Hi {}\nPlease use this command to get more information!\n@{} help",
            event.sender, self.bot_name
        );
        Ok(CommandResult::info(text).with_pretext("Only commands below are supported!"))
    }
}
