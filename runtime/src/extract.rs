//! The extractor: one render per cycle, every query against that page.

use crate::error::RenderFailure;
use crate::model::{ExtractionQuery, ExtractionResult, ItemList};
use crate::renderer::{RenderOptions, RenderedDocument, Renderer};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Path prefix shared by every model page on the target site.
pub const MODEL_PATH_PREFIX: &str = "/en/models/";
/// Class fragment carried by listing cover images.
pub const PREVIEW_CLASS_MARKER: &str = "cover";
/// Items kept per list.
pub const DEFAULT_CAP: usize = 5;

/// The query set used in production.
pub fn default_queries(include_previews: bool) -> Vec<ExtractionQuery> {
    let mut queries = vec![ExtractionQuery::model_listing(MODEL_PATH_PREFIX, DEFAULT_CAP)];
    if include_previews {
        queries.push(ExtractionQuery::preview_images(
            PREVIEW_CLASS_MARKER,
            DEFAULT_CAP,
        ));
    }
    queries
}

/// Drives a [`Renderer`] and normalizes what it returns.
pub struct Extractor {
    renderer: Arc<dyn Renderer>,
    target_url: String,
    options: RenderOptions,
    queries: Vec<ExtractionQuery>,
}

impl Extractor {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        target_url: impl Into<String>,
        options: RenderOptions,
        queries: Vec<ExtractionQuery>,
    ) -> Self {
        Self {
            renderer,
            target_url: target_url.into(),
            options,
            queries,
        }
    }

    pub fn queries(&self) -> &[ExtractionQuery] {
        &self.queries
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Render the target once and run every query against it.
    ///
    /// The document is closed before returning, whether or not evaluation
    /// succeeded. Render failures are passed through untouched.
    pub async fn extract(&self) -> Result<ExtractionResult, RenderFailure> {
        info!(
            "navigating to {} via {}",
            self.target_url,
            self.renderer.name()
        );
        let doc = self.renderer.render(&self.target_url, &self.options).await?;

        let evaluated = self.evaluate_all(doc.as_ref()).await;
        if let Err(e) = doc.close().await {
            warn!("render session did not close cleanly: {e}");
        }
        let lists = evaluated?;

        let result = ExtractionResult::new(lists, Utc::now());
        for list in result.lists() {
            info!("found {} {}", list.items.len(), list.name);
        }
        Ok(result)
    }

    async fn evaluate_all(&self, doc: &dyn RenderedDocument) -> Result<Vec<ItemList>, RenderFailure> {
        let mut lists = Vec::with_capacity(self.queries.len());
        for query in &self.queries {
            let mut items = doc.evaluate(query).await?;
            items.truncate(query.cap);
            lists.push(ItemList {
                name: query.name.clone(),
                items,
            });
        }
        Ok(lists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_queries() {
        let q = default_queries(false);
        assert_eq!(q.len(), 1);
        assert_eq!(q[0].name, "models");
        assert_eq!(q[0].cap, 5);

        let q = default_queries(true);
        assert_eq!(q.len(), 2);
        assert_eq!(q[1].selector, "img[class*=\"cover\"]");
    }
}
