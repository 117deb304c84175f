use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use relay_core::{CommandResult, ImageSearch, MentionEvent, MentionHandler, RelayResult};
use tracing::debug;

pub const NO_RESULTS: &str = "Please use other words to search";

pub struct ImageHandler {
    search: Arc<dyn ImageSearch>,
}

impl ImageHandler {
    pub fn new(search: Arc<dyn ImageSearch>) -> Self {
        Self { search }
    }
}

/// One candidate at random, or the fixed no-results notice.
pub fn pick_candidate(candidates: &[String]) -> String {
    candidates
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| NO_RESULTS.to_string())
}

#[async_trait]
impl MentionHandler for ImageHandler {
    fn keyword(&self) -> &str {
        "img"
    }

    async fn handle(&self, event: &MentionEvent) -> RelayResult<CommandResult> {
        let query = event.remainder(" ");
        debug!(%query, "image search requested");
        let candidates = self.search.candidates(&query).await?;
        Ok(CommandResult::success(pick_candidate(&candidates)).with_pretext("MEME image search"))
    }
}
