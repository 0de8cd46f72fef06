//! Rendered extraction tier — headless Chromium via the DevTools protocol.
//!
//! Every call launches its own browser with a private profile directory and
//! tears it down again. `RenderSession` owns the process: `close()` shuts it
//! down gracefully, and dropping an unclosed session stops the protocol
//! handler and removes the profile directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::LoaderId;
use chromiumoxide::cdp::browser_protocol::page::{EventLifecycleEvent, NavigateParams};
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ExtractError;

/// Selector holding the article body on the sites we render.
pub const DEFAULT_CONTENT_SELECTOR: &str = ".item-body";

/// Grace period after the network goes idle, for late-loading content.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(2000);

/// How long a page may keep the network busy before rendering gives up.
pub const DEFAULT_NETWORK_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle event Chromium emits once no requests have been in flight for 500 ms.
const NETWORK_IDLE_EVENT: &str = "networkIdle";

/// Settings for the rendered tier.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// CSS selector whose inner text is the article body.
    pub content_selector: String,
    pub settle_delay: Duration,
    pub network_idle_timeout: Duration,
    /// Chrome binary; `None` lets chromiumoxide find one.
    pub chrome_executable: Option<PathBuf>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            content_selector: DEFAULT_CONTENT_SELECTOR.to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            network_idle_timeout: DEFAULT_NETWORK_IDLE_TIMEOUT,
            chrome_executable: None,
        }
    }
}

/// Script-executing article extraction.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `url` and return the trimmed text of the content container.
    async fn render_text(&self, url: &str) -> Result<String, ExtractError>;
}

/// `Renderer` that launches a fresh headless Chromium per call.
pub struct ChromiumRenderer {
    settings: RenderSettings,
}

impl ChromiumRenderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    async fn read_content(&self, browser: &Browser, url: &str) -> Result<String, ExtractError> {
        let render_err = |e: chromiumoxide::error::CdpError| ExtractError::Render {
            url: url.to_string(),
            reason: e.to_string(),
        };

        // Listen before navigating so the idle event cannot be missed.
        let page = browser.new_page("about:blank").await.map_err(render_err)?;
        let lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(render_err)?;

        let navigation = page
            .execute(NavigateParams::new(url))
            .await
            .map_err(render_err)?;
        if let Some(reason) = navigation.result.error_text.clone() {
            return Err(ExtractError::Render {
                url: url.to_string(),
                reason,
            });
        }

        wait_for_network_idle(
            lifecycle,
            navigation.result.loader_id.as_ref(),
            self.settings.network_idle_timeout,
        )
        .await
        .map_err(|reason| ExtractError::Render {
            url: url.to_string(),
            reason,
        })?;
        tokio::time::sleep(self.settings.settle_delay).await;

        let element = page
            .find_element(self.settings.content_selector.as_str())
            .await
            .map_err(|_| ExtractError::SelectorNotFound {
                url: url.to_string(),
                selector: self.settings.content_selector.clone(),
            })?;

        let text = element.inner_text().await.map_err(render_err)?;
        Ok(text.unwrap_or_default().trim().to_string())
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render_text(&self, url: &str) -> Result<String, ExtractError> {
        let session = RenderSession::launch(&self.settings).await?;
        let result = self.read_content(&session.browser, url).await;
        session.close().await;
        result
    }
}

/// Wait for the `networkIdle` lifecycle event of the navigation `loader_id`.
/// Events from other loaders (the initial blank page) are skipped.
async fn wait_for_network_idle<S>(
    events: S,
    loader_id: Option<&LoaderId>,
    limit: Duration,
) -> Result<(), String>
where
    S: Stream<Item = Arc<EventLifecycleEvent>>,
{
    let mut events = std::pin::pin!(events);
    let idle = async {
        while let Some(event) = events.next().await {
            if event.name == NETWORK_IDLE_EVENT
                && loader_id.is_none_or(|id| *id == event.loader_id)
            {
                return true;
            }
        }
        false
    };

    match tokio::time::timeout(limit, idle).await {
        Ok(true) => Ok(()),
        Ok(false) => Err("page closed before the network went idle".to_string()),
        Err(_) => Err(format!("network not idle after {}s", limit.as_secs())),
    }
}

/// Throwaway browser profile, deleted on drop.
struct ProfileDir(PathBuf);

impl ProfileDir {
    fn new() -> Self {
        Self(std::env::temp_dir().join(format!("news-watch-{}", Uuid::new_v4())))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// One isolated browser process and its protocol handler task.
struct RenderSession {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: ProfileDir,
}

impl RenderSession {
    async fn launch(settings: &RenderSettings) -> Result<Self, ExtractError> {
        let profile_dir = ProfileDir::new();

        let mut builder = BrowserConfig::builder().user_data_dir(profile_dir.path());
        if let Some(ref exe) = settings.chrome_executable {
            builder = builder.chrome_executable(exe);
        }
        let config = builder.build().map_err(ExtractError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ExtractError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        debug!(profile = %profile_dir.path().display(), "Browser session launched");
        Ok(Self {
            browser,
            handler,
            profile_dir,
        })
    }

    /// Close the browser, reap the child and remove the profile directory.
    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Browser close failed, killing process");
            if let Err(e) = self.browser.kill().await.transpose() {
                warn!(error = %e, "Browser kill failed");
            }
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Failed to reap browser process");
        }
        self.handler.abort();
        if let Err(e) = tokio::fs::remove_dir_all(self.profile_dir.path()).await {
            debug!(error = %e, "Profile directory not removed");
        }
        debug!("Browser session closed");
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        // No-op after close(); covers cancellation mid-render. The profile
        // directory goes with `ProfileDir`'s own drop.
        self.handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings() {
        let settings = RenderSettings::default();
        assert_eq!(settings.content_selector, ".item-body");
        assert_eq!(settings.settle_delay, Duration::from_secs(2));
        assert_eq!(settings.network_idle_timeout, Duration::from_secs(30));
        assert!(settings.chrome_executable.is_none());
    }

    #[tokio::test]
    async fn launch_failure_is_reported() {
        let renderer = ChromiumRenderer::new(RenderSettings {
            chrome_executable: Some(PathBuf::from("/nonexistent/chrome")),
            settle_delay: Duration::from_millis(0),
            ..Default::default()
        });
        let err = renderer
            .render_text("https://example.com/")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::BrowserLaunch(_)));
    }

    fn lifecycle(name: &str, loader: &str) -> Arc<EventLifecycleEvent> {
        Arc::new(EventLifecycleEvent {
            frame_id: chromiumoxide::cdp::browser_protocol::page::FrameId::new("frame"),
            loader_id: LoaderId::new(loader),
            name: name.to_string(),
            timestamp: chromiumoxide::cdp::browser_protocol::network::MonotonicTime::new(0.0),
        })
    }

    #[tokio::test]
    async fn idle_wait_skips_other_loaders_and_earlier_events() {
        let events = futures::stream::iter(vec![
            lifecycle("networkIdle", "blank"),
            lifecycle("load", "article"),
            lifecycle("networkIdle", "article"),
        ]);
        let loader = LoaderId::new("article");
        let result = wait_for_network_idle(events, Some(&loader), Duration::from_secs(1)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn idle_wait_fails_when_stream_ends_first() {
        let events = futures::stream::iter(vec![
            lifecycle("load", "article"),
            lifecycle("networkIdle", "blank"),
        ]);
        let loader = LoaderId::new("article");
        let err = wait_for_network_idle(events, Some(&loader), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.contains("closed"));
    }

    #[tokio::test]
    async fn idle_wait_times_out_on_busy_page() {
        let events = futures::stream::pending::<Arc<EventLifecycleEvent>>();
        let err = wait_for_network_idle(events, None, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.contains("not idle"));
    }

    #[test]
    fn profile_dir_removed_on_drop() {
        let profile = ProfileDir::new();
        let path = profile.path().to_path_buf();
        std::fs::create_dir_all(path.join("Default")).unwrap();
        std::fs::write(path.join("Default").join("Preferences"), "{}").unwrap();

        drop(profile);
        assert!(!path.exists());
    }

    #[test]
    fn profile_dir_drop_tolerates_missing_dir() {
        let profile = ProfileDir::new();
        let path = profile.path().to_path_buf();
        drop(profile);
        assert!(!path.exists());
    }
}
