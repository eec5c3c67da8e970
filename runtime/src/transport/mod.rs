//! Messaging transport abstraction.
//!
//! Outbound: [`Transport`] sends and deletes messages. Inbound: a poller
//! turns chat updates into [`CommandReceived`] events on a channel.

pub mod command;
pub mod stdout;
pub mod telegram;

use crate::error::DeliveryFailure;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use command::{Command, CommandReceived};

/// Chat identity as the transport reports it (numeric id or `@channel`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-message delivery options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Interpret the text as Markdown.
    pub markdown: bool,
    /// Thread the message under this one.
    pub reply_to: Option<i64>,
}

impl SendOptions {
    pub fn markdown() -> Self {
        Self {
            markdown: true,
            reply_to: None,
        }
    }

    pub fn reply_to(mut self, message_id: Option<i64>) -> Self {
        self.reply_to = message_id;
        self
    }
}

/// A delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub chat: ChatId,
    pub message_id: i64,
}

/// Outbound side of the chat transport.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(
        &self,
        chat: &ChatId,
        text: &str,
        options: &SendOptions,
    ) -> Result<MessageHandle, DeliveryFailure>;

    async fn delete_message(&self, chat: &ChatId, message_id: i64) -> Result<(), DeliveryFailure>;
}
