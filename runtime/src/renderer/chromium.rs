//! Chromium-based renderer using chromiumoxide.
//!
//! Every `render` launches its own headless browser with a throwaway profile,
//! so no cookies or storage survive from one cycle to the next. The profile
//! directory is removed when the session drops, on every exit path.

use super::script::{decode_records, query_script, STEALTH_INIT_SCRIPT};
use super::{RenderOptions, RenderedDocument, Renderer};
use crate::error::RenderFailure;
use crate::model::{ExtractedItem, ExtractionQuery};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Launch flags that keep the browser quiet and hide automation hints.
const LAUNCH_ARGS: &[&str] = &[
    "--headless=new",
    "--disable-blink-features=AutomationControlled",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--disable-gpu",
];

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. MAKERWATCH_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("MAKERWATCH_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    executable: PathBuf,
}

impl ChromiumRenderer {
    /// Locate Chromium on this machine.
    pub fn new() -> Result<Self, RenderFailure> {
        let executable = find_chromium().ok_or_else(|| {
            RenderFailure::Launch(
                "Chromium not found. Install Chrome or set MAKERWATCH_CHROMIUM_PATH.".into(),
            )
        })?;
        Ok(Self::with_executable(executable))
    }

    pub fn with_executable(executable: PathBuf) -> Self {
        Self { executable }
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render(
        &self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<Box<dyn RenderedDocument>, RenderFailure> {
        let session = BrowserSession::launch(&self.executable, options).await?;

        match session.load(url, options).await {
            Ok(page) => Ok(Box::new(ChromiumDocument { session, page })),
            Err(e) => {
                if let Err(close_err) = session.shutdown().await {
                    warn!("browser teardown after failed load: {close_err}");
                }
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

/// One browser process plus the task driving its DevTools connection.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    profile: TempDir,
}

impl BrowserSession {
    async fn launch(executable: &Path, options: &RenderOptions) -> Result<Self, RenderFailure> {
        let profile = tempfile::Builder::new()
            .prefix("makerwatch-")
            .tempdir()
            .map_err(|e| RenderFailure::Launch(format!("failed to create profile dir: {e}")))?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(profile.path())
            .incognito()
            .window_size(options.viewport.width, options.viewport.height)
            .viewport(Viewport {
                width: options.viewport.width,
                height: options.viewport.height,
                ..Default::default()
            })
            .arg(format!("--user-agent={}", options.user_agent));
        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        let config = builder
            .build()
            .map_err(|e| RenderFailure::Launch(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderFailure::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        debug!(profile = %profile.path().display(), "browser session launched");
        Ok(Self {
            browser,
            handler,
            profile,
        })
    }

    async fn load(&self, url: &str, options: &RenderOptions) -> Result<Page, RenderFailure> {
        let nav_err = |reason: String| RenderFailure::Navigation {
            url: url.to_string(),
            reason,
        };

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| nav_err(format!("failed to open page: {e}")))?;

        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
            STEALTH_INIT_SCRIPT,
        ))
        .await
        .map_err(|e| nav_err(format!("failed to install init script: {e}")))?;

        let start = Instant::now();
        match tokio::time::timeout(options.nav_timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(nav_err(e.to_string())),
            Err(_) => {
                return Err(RenderFailure::Timeout {
                    url: url.to_string(),
                    timeout_ms: options.nav_timeout.as_millis() as u64,
                })
            }
        }
        info!(
            "page loaded in {}ms, settling for {}ms",
            start.elapsed().as_millis(),
            options.settle.as_millis()
        );

        tokio::time::sleep(options.settle).await;
        Ok(page)
    }

    async fn shutdown(mut self) -> Result<(), RenderFailure> {
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler.abort();
        let path = self.profile.path().to_path_buf();
        if let Err(e) = self.profile.close() {
            warn!(profile = %path.display(), "failed to remove browser profile: {e}");
        }
        closed
            .map(|_| ())
            .map_err(|e| RenderFailure::Teardown(e.to_string()))
    }
}

/// A settled Chromium page.
struct ChromiumDocument {
    session: BrowserSession,
    page: Page,
}

#[async_trait]
impl RenderedDocument for ChromiumDocument {
    async fn evaluate(&self, query: &ExtractionQuery) -> Result<Vec<ExtractedItem>, RenderFailure> {
        let eval_err = |reason: String| RenderFailure::Evaluation {
            query: query.name.clone(),
            reason,
        };

        let value: serde_json::Value = self
            .page
            .evaluate(query_script(query))
            .await
            .map_err(|e| eval_err(e.to_string()))?
            .into_value()
            .map_err(|e| eval_err(format!("failed to convert JS result: {e:?}")))?;

        decode_records(query, value).map_err(eval_err)
    }

    async fn close(self: Box<Self>) -> Result<(), RenderFailure> {
        let _ = self.page.close().await;
        self.session.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn profile_dirs() -> usize {
        std::fs::read_dir(std::env::temp_dir())
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.file_name().to_string_lossy().starts_with("makerwatch-"))
                    .count()
            })
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_failed_launch_leaves_no_profile_behind() {
        let before = profile_dirs();
        let renderer =
            ChromiumRenderer::with_executable(PathBuf::from("/nonexistent/makerwatch-chrome"));

        let err = renderer
            .render("about:blank", &RenderOptions::default())
            .await
            .err()
            .expect("launch should fail");
        assert!(matches!(err, RenderFailure::Launch(_)));
        assert_eq!(profile_dirs(), before);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_render_and_query() {
        let renderer = ChromiumRenderer::new().expect("chromium not found");
        let options = RenderOptions {
            settle: Duration::from_millis(100),
            ..RenderOptions::default()
        };

        let doc = renderer
            .render(
                "data:text/html,<a href='/en/models/1-a' title='A'>a</a><a href='/en/models/'>x</a>",
                &options,
            )
            .await
            .expect("render failed");

        let items = doc
            .evaluate(&ExtractionQuery::model_listing("/en/models/", 5))
            .await
            .expect("evaluate failed");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get("title"), Some("A"));

        doc.close().await.expect("close failed");
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_navigation_timeout() {
        let renderer = ChromiumRenderer::new().expect("chromium not found");
        let options = RenderOptions {
            nav_timeout: Duration::from_millis(1),
            settle: Duration::ZERO,
            ..RenderOptions::default()
        };

        let err = renderer
            .render("http://10.255.255.1/", &options)
            .await
            .err()
            .expect("navigation should fail");
        assert!(matches!(
            err,
            RenderFailure::Timeout { .. } | RenderFailure::Navigation { .. }
        ));
    }
}
