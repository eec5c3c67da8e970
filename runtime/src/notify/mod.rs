//! Turns an extraction result into chat messages and delivers them.

pub mod format;
pub mod throttle;

use crate::error::DeliveryFailure;
use crate::model::ExtractionResult;
use crate::transport::{ChatId, SendOptions, Transport};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use throttle::Throttle;
use tracing::{error, info};

/// Presentation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NotifyMode {
    /// One message per item of the primary list, throttled, failures
    /// tolerated per message.
    #[default]
    PerItem,
    /// One summary message; its failure fails the cycle.
    Digest,
}

impl FromStr for NotifyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-item" | "per_item" | "item" => Ok(Self::PerItem),
            "digest" => Ok(Self::Digest),
            other => Err(format!("unknown notify mode `{other}` (per-item, digest)")),
        }
    }
}

/// Who receives a cycle's messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The configured chat.
    Default,
    /// The chat a command came from, with every message threaded under it.
    Requester { chat: ChatId, reply_to: i64 },
}

/// A rendered message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub text: String,
    pub chat: ChatId,
    pub reply_to: Option<i64>,
}

/// Outcome counts for one `notify` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Formats and delivers notifications through a [`Transport`].
pub struct Notifier {
    transport: Arc<dyn Transport>,
    throttle: Arc<dyn Throttle>,
    default_chat: ChatId,
    base_url: String,
}

impl Notifier {
    pub fn new(
        transport: Arc<dyn Transport>,
        throttle: Arc<dyn Throttle>,
        default_chat: ChatId,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            throttle,
            default_chat,
            base_url: base_url.into(),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn default_chat(&self) -> &ChatId {
        &self.default_chat
    }

    /// Build the messages `mode` produces for `result`, without sending.
    pub fn compose(
        &self,
        result: &ExtractionResult,
        target: &Target,
        mode: NotifyMode,
    ) -> Vec<NotificationMessage> {
        let (chat, reply_to) = match target {
            Target::Default => (self.default_chat.clone(), None),
            Target::Requester { chat, reply_to } => (chat.clone(), Some(*reply_to)),
        };
        let message = |text: String| NotificationMessage {
            text,
            chat: chat.clone(),
            reply_to,
        };

        match mode {
            NotifyMode::PerItem => {
                let timestamp = result.timestamp();
                result
                    .primary()
                    .map(|list| list.items.as_slice())
                    .unwrap_or_default()
                    .iter()
                    .map(|item| message(format::item_message(item, &self.base_url, &timestamp)))
                    .collect()
            }
            NotifyMode::Digest => vec![message(format::digest_message(result, &self.base_url))],
        }
    }

    /// Deliver `result` to `target`.
    ///
    /// Per-item mode never fails: each message is attempted in turn and
    /// failures only show up in the report. Digest mode returns the single
    /// delivery error.
    pub async fn notify(
        &self,
        result: &ExtractionResult,
        target: &Target,
        mode: NotifyMode,
    ) -> Result<DeliveryReport, DeliveryFailure> {
        let messages = self.compose(result, target, mode);
        match mode {
            NotifyMode::PerItem => Ok(self.send_each(&messages).await),
            NotifyMode::Digest => {
                let mut report = DeliveryReport::default();
                for msg in &messages {
                    report.attempted += 1;
                    self.send(msg).await.inspect_err(|e| {
                        error!("digest delivery failed: {e}");
                    })?;
                    report.succeeded += 1;
                }
                if let Some(msg) = messages.first() {
                    info!("digest sent to {}", msg.chat);
                }
                Ok(report)
            }
        }
    }

    async fn send(&self, msg: &NotificationMessage) -> Result<(), DeliveryFailure> {
        let options = SendOptions::markdown().reply_to(msg.reply_to);
        self.transport
            .send_message(&msg.chat, &msg.text, &options)
            .await
            .map(|_| ())
    }

    async fn send_each(&self, messages: &[NotificationMessage]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for (i, msg) in messages.iter().enumerate() {
            let n = i + 1;
            report.attempted += 1;
            info!("sending message {n}/{} to {}", messages.len(), msg.chat);
            match self.send(msg).await {
                Ok(()) => {
                    report.succeeded += 1;
                    info!("message {n} sent");
                }
                Err(e) => {
                    report.failed += 1;
                    error!("delivery of message {n} failed: {e}");
                }
            }
            self.throttle.pause().await;
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_mode_from_str() {
        assert_eq!("digest".parse::<NotifyMode>().unwrap(), NotifyMode::Digest);
        assert_eq!("Per-Item".parse::<NotifyMode>().unwrap(), NotifyMode::PerItem);
        assert!("weekly".parse::<NotifyMode>().is_err());
    }
}
