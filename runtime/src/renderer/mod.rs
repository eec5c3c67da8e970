//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderedDocument` traits that abstract over
//! the browser engine (Chromium via chromiumoxide, or a static HTML snapshot).

pub mod chromium;
pub mod script;
pub mod snapshot;

use crate::error::RenderFailure;
use crate::model::{ExtractedItem, ExtractionQuery};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Desktop Chrome identity presented to the target site.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Browser viewport in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// How a page is loaded before queries run against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub viewport: Viewport,
    pub user_agent: String,
    /// Upper bound for navigation only.
    pub nav_timeout: Duration,
    /// Fixed wait after load so client-side rendering can populate the DOM.
    pub settle: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            nav_timeout: Duration::from_millis(60_000),
            settle: Duration::from_millis(5_000),
        }
    }
}

/// A browser engine that loads a URL into a fresh, isolated session.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Load `url` and wait for it to settle.
    ///
    /// On failure no session is left open.
    async fn render(
        &self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<Box<dyn RenderedDocument>, RenderFailure>;

    /// Short engine name for logs.
    fn name(&self) -> &'static str;
}

/// A loaded page. Owned by exactly one cycle.
#[async_trait]
pub trait RenderedDocument: Send + Sync {
    /// Run `query` against the current DOM. No navigation or waiting.
    async fn evaluate(&self, query: &ExtractionQuery) -> Result<Vec<ExtractedItem>, RenderFailure>;

    /// Tear the session down.
    async fn close(self: Box<Self>) -> Result<(), RenderFailure>;
}
