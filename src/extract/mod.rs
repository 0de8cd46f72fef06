//! Article extraction with a static-first, rendered-second strategy.
//!
//! 1. `readable` — download the HTML and run readability over it
//! 2. `render` — only when step 1 finds no text: headless browser
//! 3. `language` — identify the language of whichever text came back
//!
//! Extraction failure is an ordinary outcome: `extract` never returns `Err`,
//! faults become `ExtractionResult::Failed`.

pub mod language;
pub mod readable;
pub mod render;

pub use language::{LanguageIdentifier, WhatlangIdentifier};
pub use readable::{ReadableFetcher, StaticArticle, StaticExtractor};
pub use render::{ChromiumRenderer, RenderSettings, Renderer};

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ExtractError;

/// Which tier produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Static,
    Rendered,
}

/// Successfully extracted article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedArticle {
    /// Only the static tier recovers a title.
    pub title: Option<String>,
    pub text: String,
    pub language: Option<String>,
    pub method: ExtractionMethod,
}

/// Outcome of extracting one URL. Either text or an error, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExtractionResult {
    Article(ExtractedArticle),
    Failed { error: String },
}

impl ExtractionResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Article(article) => Some(&article.text),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Article(_) => None,
            Self::Failed { error } => Some(error),
        }
    }

    pub fn article(&self) -> Option<&ExtractedArticle> {
        match self {
            Self::Article(article) => Some(article),
            Self::Failed { .. } => None,
        }
    }
}

/// Anything that can turn a URL into an `ExtractionResult`.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn extract(&self, url: &str) -> ExtractionResult;
}

/// Two-tier extractor: static parse first, browser rendering as fallback.
pub struct ArticleExtractor {
    static_tier: Arc<dyn StaticExtractor>,
    renderer: Arc<dyn Renderer>,
    language: Arc<dyn LanguageIdentifier>,
}

impl ArticleExtractor {
    pub fn new(
        static_tier: Arc<dyn StaticExtractor>,
        renderer: Arc<dyn Renderer>,
        language: Arc<dyn LanguageIdentifier>,
    ) -> Self {
        Self {
            static_tier,
            renderer,
            language,
        }
    }

    async fn try_extract(&self, url: &str) -> Result<Option<ExtractedArticle>, ExtractError> {
        let StaticArticle { title, text } = self.static_tier.fetch_article(url).await?;
        let text = text.trim().to_string();
        if !text.is_empty() {
            return Ok(Some(ExtractedArticle {
                title,
                language: self.language.identify(&text),
                text,
                method: ExtractionMethod::Static,
            }));
        }

        info!(url = %url, "Static extraction found no text, trying rendered extraction");
        let text = self.renderer.render_text(url).await?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        Ok(Some(ExtractedArticle {
            title: None,
            language: self.language.identify(text),
            text: text.to_string(),
            method: ExtractionMethod::Rendered,
        }))
    }
}

#[async_trait]
impl ArticleSource for ArticleExtractor {
    async fn extract(&self, url: &str) -> ExtractionResult {
        match self.try_extract(url).await {
            Ok(Some(article)) => {
                debug!(
                    url = %url,
                    method = ?article.method,
                    language = article.language.as_deref().unwrap_or("unknown"),
                    chars = article.text.chars().count(),
                    "Article extracted"
                );
                ExtractionResult::Article(article)
            }
            Ok(None) => ExtractionResult::failed("No text found"),
            Err(e) => ExtractionResult::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedStatic(Result<StaticArticle, String>);

    #[async_trait]
    impl StaticExtractor for FixedStatic {
        async fn fetch_article(&self, url: &str) -> Result<StaticArticle, ExtractError> {
            self.0.clone().map_err(|reason| ExtractError::Fetch {
                url: url.to_string(),
                reason,
            })
        }
    }

    struct CountingRenderer {
        text: Result<String, String>,
        calls: AtomicUsize,
    }

    impl CountingRenderer {
        fn new(text: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                text: text.map(String::from).map_err(String::from),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Renderer for CountingRenderer {
        async fn render_text(&self, url: &str) -> Result<String, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.text.clone().map_err(|reason| ExtractError::Render {
                url: url.to_string(),
                reason,
            })
        }
    }

    struct FixedLanguage(&'static str);

    impl LanguageIdentifier for FixedLanguage {
        fn identify(&self, _text: &str) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn extractor(
        static_result: Result<StaticArticle, String>,
        renderer: Arc<CountingRenderer>,
    ) -> ArticleExtractor {
        ArticleExtractor::new(
            Arc::new(FixedStatic(static_result)),
            renderer,
            Arc::new(FixedLanguage("en")),
        )
    }

    fn static_text(title: Option<&str>, text: &str) -> Result<StaticArticle, String> {
        Ok(StaticArticle {
            title: title.map(String::from),
            text: text.to_string(),
        })
    }

    #[tokio::test]
    async fn static_success_skips_renderer() {
        let renderer = CountingRenderer::new(Ok("rendered"));
        let result = extractor(static_text(Some("Title"), "Hello world"), renderer.clone())
            .extract("https://example.com/a")
            .await;

        assert_eq!(
            result,
            ExtractionResult::Article(ExtractedArticle {
                title: Some("Title".into()),
                text: "Hello world".into(),
                language: Some("en".into()),
                method: ExtractionMethod::Static,
            })
        );
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_static_falls_back_to_rendered() {
        let renderer = CountingRenderer::new(Ok("  Rendered body \n"));
        let result = extractor(static_text(Some("Shell"), ""), renderer.clone())
            .extract("https://example.com/js")
            .await;

        let article = result.article().expect("rendered article");
        assert_eq!(article.method, ExtractionMethod::Rendered);
        assert_eq!(article.text, "Rendered body");
        assert!(article.title.is_none());
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn both_tiers_empty_is_failure() {
        let renderer = CountingRenderer::new(Ok("   "));
        let result = extractor(static_text(None, ""), renderer)
            .extract("https://example.com/empty")
            .await;

        assert_eq!(result.error(), Some("No text found"));
        assert!(result.text().is_none());
    }

    #[tokio::test]
    async fn static_fault_is_failure_without_rendering() {
        let renderer = CountingRenderer::new(Ok("rendered"));
        let result = extractor(Err("connection refused".into()), renderer.clone())
            .extract("https://example.com/down")
            .await;

        assert!(result.error().unwrap().contains("connection refused"));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn renderer_fault_is_failure() {
        let renderer = CountingRenderer::new(Err("selector timed out"));
        let result = extractor(static_text(None, ""), renderer)
            .extract("https://example.com/slow")
            .await;

        assert!(result.error().unwrap().contains("selector timed out"));
    }

    #[test]
    fn result_has_exactly_one_of_text_or_error() {
        let ok = ExtractionResult::Article(ExtractedArticle {
            title: None,
            text: "t".into(),
            language: None,
            method: ExtractionMethod::Rendered,
        });
        let failed = ExtractionResult::failed("boom");
        for result in [ok, failed] {
            assert!(result.text().is_some() ^ result.error().is_some());
        }
    }

    #[test]
    fn result_serializes_untagged() {
        let failed = serde_json::to_value(ExtractionResult::failed("No text found")).unwrap();
        assert_eq!(failed, serde_json::json!({"error": "No text found"}));

        let ok = serde_json::to_value(ExtractionResult::Article(ExtractedArticle {
            title: Some("T".into()),
            text: "body".into(),
            language: Some("en".into()),
            method: ExtractionMethod::Static,
        }))
        .unwrap();
        assert_eq!(ok["method"], "static");
        assert_eq!(ok["text"], "body");
        assert!(ok.get("error").is_none());
    }
}
