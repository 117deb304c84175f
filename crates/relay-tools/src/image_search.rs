use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use relay_core::{ImageSearch, RelayError, RelayResult};
use reqwest::Client;
use tracing::info;
use url::Url;

const BROWSER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/94.0.4606.81 Safari/537.36";
const FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// Scrapes the image results page of a search engine.
pub struct WebImageSearch {
    client: Client,
    base: Url,
}

impl WebImageSearch {
    pub fn new(base: &str) -> RelayResult<Self> {
        let base = Url::parse(base)
            .map_err(|e| RelayError::Config(format!("invalid image search base '{base}': {e}")))?;
        let client = Client::builder()
            .user_agent(BROWSER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| RelayError::Config(format!("http client error: {e}")))?;
        Ok(Self { client, base })
    }

    pub fn query_url(&self, query: &str) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("q", query);
        url
    }
}

#[async_trait]
impl ImageSearch for WebImageSearch {
    async fn candidates(&self, query: &str) -> RelayResult<Vec<String>> {
        let url = self.query_url(query);
        info!(target: "relay.search", %url, "fetching image results");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RelayError::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RelayError::Search(format!("http status {}", status.as_u16())));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| RelayError::Search(e.to_string()))?;

        let urls = parse_image_candidates(&body);
        info!(target: "relay.search", results = urls.len(), "image results parsed");
        Ok(urls)
    }
}

/// Thumbnail sources of the result grid: `<img>` tags marked `data-ils="4"`
/// carrying a `data-src` attribute.
pub fn parse_image_candidates(html: &str) -> Vec<String> {
    let (Ok(tag_re), Ok(src_re)) = (
        Regex::new(r"<img\b[^>]*>"),
        Regex::new(r#"\bdata-src\s*=\s*"([^"]+)""#),
    ) else {
        return Vec::new();
    };

    tag_re
        .find_iter(html)
        .map(|tag| tag.as_str())
        .filter(|tag| tag.contains(r#"data-ils="4""#))
        .filter_map(|tag| src_re.captures(tag))
        .filter_map(|caps| caps.get(1).map(|m| html_unescape(m.as_str())))
        .collect()
}

fn html_unescape(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_marked_thumbnails_only() {
        let html = r#"
            <div>
              <img class="a" data-ils="4" data-src="https://img.example/1.jpg?a=1&amp;b=2">
              <img data-src="https://img.example/ignored.jpg">
              <img data-ils="4" src="inline.gif">
              <img data-ils="4" alt="x" data-src="https://img.example/2.png" />
            </div>"#;
        assert_eq!(
            parse_image_candidates(html),
            vec![
                "https://img.example/1.jpg?a=1&b=2".to_string(),
                "https://img.example/2.png".to_string(),
            ]
        );
    }

    #[test]
    fn page_without_results_is_empty() {
        assert!(parse_image_candidates("<html><body>nothing</body></html>").is_empty());
    }

    #[test]
    fn query_is_percent_encoded() {
        let search = WebImageSearch::new("http://www.google.com/images").expect("client");
        assert_eq!(
            search.query_url("funny cats & dogs").as_str(),
            "http://www.google.com/images?q=funny+cats+%26+dogs"
        );
    }

    #[test]
    fn invalid_base_is_a_config_error() {
        let err = WebImageSearch::new("not a url").err().expect("should fail");
        assert!(err.is_fatal());
    }
}
