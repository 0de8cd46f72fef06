//! Static extraction tier — plain HTTP download plus readability parsing.
//!
//! No JavaScript is executed. Pages whose article body only appears after
//! client-side rendering come back with empty text, which is the signal
//! for the rendered tier to take over.

use std::time::Duration;

use async_trait::async_trait;
use dom_smoothie::{Config, Readability};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use tracing::debug;

use crate::error::ExtractError;

/// Browser-like User-Agent; several news sites refuse obvious bots.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_REDIRECTS: usize = 5;

/// Upper bound on DOM elements readability will walk.
const MAX_ELEMENTS_TO_PARSE: usize = 9000;

/// Article body as found by the static tier. `text` is trimmed and may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticArticle {
    pub title: Option<String>,
    pub text: String,
}

/// Static (non-rendering) article extraction.
#[async_trait]
pub trait StaticExtractor: Send + Sync {
    /// Download and parse `url`. Transport faults and non-2xx statuses are
    /// errors; a page without a recognisable article body is `Ok` with empty text.
    async fn fetch_article(&self, url: &str) -> Result<StaticArticle, ExtractError>;
}

/// `reqwest` + readability implementation of the static tier.
pub struct ReadableFetcher {
    client: reqwest::Client,
}

impl ReadableFetcher {
    pub fn new() -> Result<Self, ExtractError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| ExtractError::Fetch {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }

    async fn fetch_html(&self, url: &str) -> Result<String, ExtractError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ExtractError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| ExtractError::Fetch {
            url: url.to_string(),
            reason: format!("failed to read response body: {e}"),
        })
    }
}

#[async_trait]
impl StaticExtractor for ReadableFetcher {
    async fn fetch_article(&self, url: &str) -> Result<StaticArticle, ExtractError> {
        let html = self.fetch_html(url).await?;
        Ok(parse_article(&html, url))
    }
}

/// Run readability over a downloaded page.
pub fn parse_article(html: &str, url: &str) -> StaticArticle {
    let cfg = Config {
        max_elements_to_parse: MAX_ELEMENTS_TO_PARSE,
        ..Default::default()
    };

    let parsed = Readability::new(html, Some(url), Some(cfg)).and_then(|mut r| r.parse());

    let (title, text) = match parsed {
        Ok(article) => (
            non_empty(article.title.to_string()),
            article.text_content.to_string().trim().to_string(),
        ),
        Err(e) => {
            debug!(url = %url, error = %e, "Readability found no article body");
            (None, String::new())
        }
    };

    StaticArticle {
        title: title.or_else(|| document_title(html)),
        text,
    }
}

/// `<title>` of the document, if any.
fn document_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| non_empty(el.text().collect::<String>()))
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
