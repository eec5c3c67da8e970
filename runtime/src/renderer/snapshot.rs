//! Static HTML renderer.
//!
//! Evaluates queries with `scraper` against markup fetched over plain HTTP
//! (no JavaScript runs) or supplied directly. Used when no browser is
//! available and as a deterministic document source.

use super::{RenderOptions, RenderedDocument, Renderer};
use crate::error::RenderFailure;
use crate::model::{ExtractedItem, ExtractionQuery, Field};
use async_trait::async_trait;
use scraper::{Html, Selector};

/// Where the snapshot markup comes from.
enum Source {
    Http(reqwest::Client),
    Fixed(String),
}

/// Renderer that never executes page scripts.
pub struct SnapshotRenderer {
    source: Source,
}

impl SnapshotRenderer {
    /// Fetch pages over HTTP.
    pub fn http() -> Self {
        Self {
            source: Source::Http(reqwest::Client::new()),
        }
    }

    /// Serve the same markup for every URL.
    pub fn fixed(html: impl Into<String>) -> Self {
        Self {
            source: Source::Fixed(html.into()),
        }
    }

    async fn fetch(
        client: &reqwest::Client,
        url: &str,
        options: &RenderOptions,
    ) -> Result<String, RenderFailure> {
        let nav_err = |reason: String| RenderFailure::Navigation {
            url: url.to_string(),
            reason,
        };

        let resp = client
            .get(url)
            .header(reqwest::header::USER_AGENT, &options.user_agent)
            .timeout(options.nav_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RenderFailure::Timeout {
                        url: url.to_string(),
                        timeout_ms: options.nav_timeout.as_millis() as u64,
                    }
                } else {
                    nav_err(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(nav_err(format!("HTTP {status}")));
        }
        resp.text().await.map_err(|e| nav_err(e.to_string()))
    }
}

#[async_trait]
impl Renderer for SnapshotRenderer {
    async fn render(
        &self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<Box<dyn RenderedDocument>, RenderFailure> {
        let html = match &self.source {
            Source::Http(client) => Self::fetch(client, url, options).await?,
            Source::Fixed(html) => html.clone(),
        };
        Ok(Box::new(HtmlSnapshot { html }))
    }

    fn name(&self) -> &'static str {
        "snapshot"
    }
}

/// Markup captured once per render.
///
/// Parsed per query because `scraper::Html` cannot cross await points.
pub struct HtmlSnapshot {
    html: String,
}

impl HtmlSnapshot {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    /// Apply `query` synchronously, with the same semantics as the
    /// in-browser script.
    pub fn select(&self, query: &ExtractionQuery) -> Result<Vec<ExtractedItem>, RenderFailure> {
        let selector = Selector::parse(&query.selector).map_err(|e| RenderFailure::Evaluation {
            query: query.name.clone(),
            reason: format!("invalid selector: {e:?}"),
        })?;
        let doc = Html::parse_document(&self.html);

        let items = doc
            .select(&selector)
            .filter(|el| query.accepts(|name: &str| el.value().attr(name)))
            .take(query.cap)
            .map(|el| {
                let mut item = ExtractedItem::new();
                for field in &query.fields {
                    match field {
                        Field::Attr(name) => {
                            if let Some(v) = el.value().attr(name) {
                                item.insert(field.key(), v);
                            }
                        }
                        Field::InnerHtml => item.insert(field.key(), el.inner_html()),
                    }
                }
                item
            })
            .collect();
        Ok(items)
    }
}

#[async_trait]
impl RenderedDocument for HtmlSnapshot {
    async fn evaluate(&self, query: &ExtractionQuery) -> Result<Vec<ExtractedItem>, RenderFailure> {
        self.select(query)
    }

    async fn close(self: Box<Self>) -> Result<(), RenderFailure> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_projects_fields() {
        let snap = HtmlSnapshot::new(
            r#"<body>
                <a href="/en/models/7-frog" title="Frog"><span>frog</span></a>
                <img class="card cover-img" src="https://cdn/x.png">
                <img class="avatar" src="https://cdn/me.png">
            </body>"#,
        );

        let models = snap
            .select(&ExtractionQuery::model_listing("/en/models/", 5))
            .unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].get("href"), Some("/en/models/7-frog"));
        assert_eq!(models[0].get("inner_html"), Some("<span>frog</span>"));

        let previews = snap
            .select(&ExtractionQuery::preview_images("cover", 5))
            .unwrap();
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].get("src"), Some("https://cdn/x.png"));
        assert_eq!(previews[0].get("title"), None);
    }

    #[test]
    fn test_invalid_selector_is_evaluation_failure() {
        let snap = HtmlSnapshot::new("<p></p>");
        let err = snap.select(&ExtractionQuery::new("bad", "a[[", 1)).unwrap_err();
        assert!(matches!(err, RenderFailure::Evaluation { .. }));
    }
}
