//! Command handlers and the local collaborators they drive.

use std::sync::Arc;

use relay_core::{
    ImageSearch, MentionHandler, ProcessRunner, RelayConfig, RelayResult, SlashHandler,
};

mod greeting;
mod help;
mod image;
mod image_search;
mod runner;
mod shell;
mod slash;

pub use greeting::GreetingHandler;
pub use help::HelpHandler;
pub use image::{pick_candidate, ImageHandler, NO_RESULTS};
pub use image_search::{parse_image_candidates, WebImageSearch};
pub use runner::{resolve_executable, LocalProcessRunner};
pub use shell::{exec_result, RestartHandler, ShellHandler};
pub use slash::{ArticleFeedbackCommand, HelloCommand};

/// Collaborators shared by the handlers.
#[derive(Clone)]
pub struct HandlerDeps {
    pub runner: Arc<dyn ProcessRunner>,
    pub search: Arc<dyn ImageSearch>,
}

impl HandlerDeps {
    /// Real runner and web search built from configuration.
    pub fn from_config(config: &RelayConfig) -> RelayResult<Self> {
        Ok(Self {
            runner: Arc::new(LocalProcessRunner::new(config.exec_timeout)),
            search: Arc::new(WebImageSearch::new(&config.image_search_base)?),
        })
    }
}

/// Mention handlers in match order. Earlier keywords win when a message
/// contains several.
pub fn default_mention_handlers(
    config: &RelayConfig,
    deps: &HandlerDeps,
) -> Vec<Arc<dyn MentionHandler>> {
    vec![
        Arc::new(HelpHandler::new(config.bot_name.clone())),
        Arc::new(ImageHandler::new(Arc::clone(&deps.search))),
        Arc::new(RestartHandler::new(
            Arc::clone(&deps.runner),
            config.restart.clone(),
        )),
        Arc::new(ShellHandler::new(Arc::clone(&deps.runner))),
    ]
}

pub fn fallback_handler(config: &RelayConfig) -> Arc<dyn MentionHandler> {
    Arc::new(GreetingHandler::new(config.bot_name.clone()))
}

pub fn default_slash_handlers() -> Vec<Arc<dyn SlashHandler>> {
    vec![Arc::new(HelloCommand), Arc::new(ArticleFeedbackCommand)]
}
