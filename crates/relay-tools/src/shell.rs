use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{
    ColorTag, CommandResult, MentionEvent, MentionHandler, ProcessOutput, ProcessRunner,
    RelayResult, RestartTarget, RunError,
};
use tracing::{info, warn};

const EXEC_PRETEXT: &str = "Use bash Command";

/// Turn a runner outcome into the reply shown to the requester.
pub fn exec_result(outcome: Result<ProcessOutput, RunError>) -> CommandResult {
    match outcome {
        Ok(out) => CommandResult::success(out.text()).with_pretext(EXEC_PRETEXT),
        Err(err) if err.is_timeout() => {
            CommandResult::new(String::from_utf8_lossy(&err.output()), ColorTag::Timeout)
                .with_pretext("Timeout!")
        }
        Err(err) => {
            warn!("command did not run: {}", err);
            CommandResult::info(String::from_utf8_lossy(&err.output())).with_pretext(EXEC_PRETEXT)
        }
    }
}

/// `shell <command line>`: runs the remainder through `bash -c`.
pub struct ShellHandler {
    runner: Arc<dyn ProcessRunner>,
}

impl ShellHandler {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl MentionHandler for ShellHandler {
    fn keyword(&self) -> &str {
        "shell"
    }

    fn privileged(&self) -> bool {
        true
    }

    async fn handle(&self, event: &MentionEvent) -> RelayResult<CommandResult> {
        let command_line = event.remainder(" ");
        info!(sender = %event.sender, command = %command_line, "running shell command");
        let args = vec!["-c".to_string(), command_line];
        Ok(exec_result(self.runner.run("bash", &args).await))
    }
}

/// `restart_gm`: triggers the configured remote restart job.
pub struct RestartHandler {
    runner: Arc<dyn ProcessRunner>,
    target: Option<RestartTarget>,
}

impl RestartHandler {
    pub fn new(runner: Arc<dyn ProcessRunner>, target: Option<RestartTarget>) -> Self {
        Self { runner, target }
    }

    fn curl_args(target: &RestartTarget) -> Vec<String> {
        vec![
            "-sS".to_string(),
            "-X".to_string(),
            "POST".to_string(),
            target.url.clone(),
            "-u".to_string(),
            format!("{}:{}", target.user, target.token),
        ]
    }
}

#[async_trait]
impl MentionHandler for RestartHandler {
    fn keyword(&self) -> &str {
        "restart_gm"
    }

    fn privileged(&self) -> bool {
        true
    }

    async fn handle(&self, event: &MentionEvent) -> RelayResult<CommandResult> {
        let Some(target) = self.target.as_ref() else {
            return Ok(CommandResult::info("Restart target is not configured")
                .with_pretext(EXEC_PRETEXT));
        };
        info!(sender = %event.sender, url = %target.url, "triggering restart job");
        Ok(exec_result(
            self.runner.run("curl", &Self::curl_args(target)).await,
        ))
    }
}
