use async_trait::async_trait;
use relay_core::{CommandResult, MentionEvent, MentionHandler, RelayResult};

pub struct HelpHandler {
    bot_name: String,
}

impl HelpHandler {
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
        }
    }

    pub fn usage(&self) -> String {
        let bot = &self.bot_name;
        format!(
            "EX:\n\
             \t@{bot} img cute cats\n\
             \t@{bot} restart_gm\n\
             \t@{bot} shell uptime\n\
             \t@{bot} shell /home/ops/test.sh"
        )
    }
}

#[async_trait]
impl MentionHandler for HelpHandler {
    fn keyword(&self) -> &str {
        "help"
    }

    async fn handle(&self, _event: &MentionEvent) -> RelayResult<CommandResult> {
        Ok(CommandResult::success(self.usage()))
    }
}
