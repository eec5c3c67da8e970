//! Dry-run transport that prints messages instead of sending them.

use super::{ChatId, MessageHandle, SendOptions, Transport};
use crate::error::DeliveryFailure;
use async_trait::async_trait;
use std::io::Write;
use std::sync::atomic::{AtomicI64, Ordering};

/// Writes every message to stdout with a small header.
pub struct StdoutTransport {
    next_id: AtomicI64,
}

impl StdoutTransport {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl Transport for StdoutTransport {
    async fn send_message(
        &self,
        chat: &ChatId,
        text: &str,
        options: &SendOptions,
    ) -> Result<MessageHandle, DeliveryFailure> {
        let message_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut out = std::io::stdout().lock();
        writeln!(out, "── message #{message_id} → {chat} ──")?;
        if let Some(reply_to) = options.reply_to {
            writeln!(out, "(reply to #{reply_to})")?;
        }
        writeln!(out, "{text}\n")?;
        Ok(MessageHandle {
            chat: chat.clone(),
            message_id,
        })
    }

    async fn delete_message(&self, chat: &ChatId, message_id: i64) -> Result<(), DeliveryFailure> {
        println!("── delete #{message_id} in {chat} ──\n");
        Ok(())
    }
}
