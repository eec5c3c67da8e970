//! Shared fakes for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use makerwatch::error::{DeliveryFailure, RenderFailure};
use makerwatch::model::{ExtractedItem, ExtractionQuery};
use makerwatch::renderer::snapshot::HtmlSnapshot;
use makerwatch::renderer::{RenderOptions, RenderedDocument, Renderer};
use makerwatch::transport::{ChatId, MessageHandle, SendOptions, Transport};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const BASE_URL: &str = "https://makerworld.com";
pub const TARGET_URL: &str = "https://makerworld.com/en/3d-models";
pub const CHAT: &str = "-100200300";

/// Listing page with `n` qualifying anchors plus some noise that must be
/// filtered out.
pub fn listing_html(n: usize) -> String {
    let mut html = String::from(
        r#"<html><body>
        <a href="/en/models/" title="All models">index</a>
        <a href="/en/models/999-untitled">no title</a>
        <a href="/en/collections/1" title="Collection">other</a>"#,
    );
    for i in 1..=n {
        html.push_str(&format!(
            r#"<div class="card"><img class="model-cover" src="https://cdn.example/{i}.png"><a href="/en/models/{i}-model" title="Model {i}"><span>{i}</span></a></div>"#
        ));
    }
    html.push_str("</body></html>");
    html
}

/// Holds a render open until released.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// Serves fixed markup, counting renders and session teardowns.
pub struct FakeRenderer {
    html: String,
    fail: bool,
    gate: Option<Arc<Gate>>,
    pub renders: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
}

impl FakeRenderer {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            fail: false,
            gate: None,
            renders: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    pub fn gated(html: impl Into<String>, gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(html)
        }
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(
        &self,
        url: &str,
        _options: &RenderOptions,
    ) -> Result<Box<dyn RenderedDocument>, RenderFailure> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.fail {
            return Err(RenderFailure::Timeout {
                url: url.to_string(),
                timeout_ms: 60_000,
            });
        }
        Ok(Box::new(CountingDocument {
            inner: HtmlSnapshot::new(self.html.clone()),
            closes: Arc::clone(&self.closes),
        }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct CountingDocument {
    inner: HtmlSnapshot,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderedDocument for CountingDocument {
    async fn evaluate(&self, query: &ExtractionQuery) -> Result<Vec<ExtractedItem>, RenderFailure> {
        self.inner.select(query)
    }

    async fn close(self: Box<Self>) -> Result<(), RenderFailure> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A message the fake transport was asked to send.
#[derive(Debug, Clone)]
pub struct Sent {
    pub chat: ChatId,
    pub text: String,
    pub options: SendOptions,
    pub delivered: bool,
}

/// Records traffic; fails the sends whose 1-based index is in `fail_on`.
#[derive(Default)]
pub struct RecordingTransport {
    fail_on: HashSet<usize>,
    pub sent: Mutex<Vec<Sent>>,
    pub deleted: Mutex<Vec<(ChatId, i64)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(indices: &[usize]) -> Self {
        Self {
            fail_on: indices.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<(ChatId, i64)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(
        &self,
        chat: &ChatId,
        text: &str,
        options: &SendOptions,
    ) -> Result<MessageHandle, DeliveryFailure> {
        let mut sent = self.sent.lock().unwrap();
        let index = sent.len() + 1;
        let delivered = !self.fail_on.contains(&index);
        sent.push(Sent {
            chat: chat.clone(),
            text: text.to_string(),
            options: options.clone(),
            delivered,
        });
        if delivered {
            Ok(MessageHandle {
                chat: chat.clone(),
                message_id: 1000 + index as i64,
            })
        } else {
            Err(DeliveryFailure::Rejected {
                code: 429,
                description: "Too Many Requests: retry after 1".into(),
            })
        }
    }

    async fn delete_message(&self, chat: &ChatId, message_id: i64) -> Result<(), DeliveryFailure> {
        self.deleted
            .lock()
            .unwrap()
            .push((chat.clone(), message_id));
        Ok(())
    }
}
