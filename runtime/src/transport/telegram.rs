//! Telegram Bot API transport over reqwest.
//!
//! Outbound calls use `sendMessage` / `deleteMessage`; inbound commands are
//! read with `getUpdates` long polling.

use super::command::{Command, CommandReceived};
use super::{ChatId, MessageHandle, SendOptions, Transport};
use crate::error::DeliveryFailure;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

/// Public Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Seconds the server may hold a `getUpdates` request open.
const LONG_POLL_SECS: u64 = 30;
/// Pause after a failed poll before trying again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Envelope every Bot API method returns.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct DeleteMessageRequest<'a> {
    chat_id: &'a str,
    message_id: i64,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
}

/// Bot API client bound to one bot token.
#[derive(Clone)]
pub struct TelegramTransport {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl TelegramTransport {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Point the client at another Bot API server (self-hosted or a test
    /// double).
    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(LONG_POLL_SECS + 15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, DeliveryFailure>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/bot{}/{method}", self.api_base, self.token);
        let resp = self.client.post(url).json(body).send().await?;
        let envelope: ApiResponse<T> = resp.json().await?;

        if !envelope.ok {
            return Err(DeliveryFailure::Rejected {
                code: envelope.error_code.unwrap_or_default(),
                description: envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }
        envelope
            .result
            .ok_or_else(|| DeliveryFailure::Malformed(format!("{method}: missing result")))
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, DeliveryFailure> {
        self.call(
            "getUpdates",
            &GetUpdatesRequest {
                offset,
                timeout: LONG_POLL_SECS,
                allowed_updates: ["message"],
            },
        )
        .await
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(
        &self,
        chat: &ChatId,
        text: &str,
        options: &SendOptions,
    ) -> Result<MessageHandle, DeliveryFailure> {
        let sent: Message = self
            .call(
                "sendMessage",
                &SendMessageRequest {
                    chat_id: chat.as_str(),
                    text,
                    parse_mode: options.markdown.then_some("Markdown"),
                    reply_to_message_id: options.reply_to,
                },
            )
            .await?;
        Ok(MessageHandle {
            chat: ChatId::from(sent.chat.id),
            message_id: sent.message_id,
        })
    }

    async fn delete_message(&self, chat: &ChatId, message_id: i64) -> Result<(), DeliveryFailure> {
        let _: bool = self
            .call(
                "deleteMessage",
                &DeleteMessageRequest {
                    chat_id: chat.as_str(),
                    message_id,
                },
            )
            .await?;
        Ok(())
    }
}

/// Long-polls for updates and forwards recognized commands.
pub struct CommandPoller {
    transport: TelegramTransport,
    offset: i64,
}

impl CommandPoller {
    pub fn new(transport: TelegramTransport) -> Self {
        Self {
            transport,
            offset: 0,
        }
    }

    /// Fetch one batch of updates and return the commands found in it.
    /// Advances the offset so the batch is acknowledged on the next call.
    pub async fn poll_once(&mut self) -> Result<Vec<CommandReceived>, DeliveryFailure> {
        let updates = self.transport.get_updates(self.offset).await?;
        let mut commands = Vec::new();
        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            let Some(command) = message.text.as_deref().and_then(Command::parse) else {
                continue;
            };
            commands.push(CommandReceived {
                command,
                chat: ChatId::from(message.chat.id),
                user_id: message.from.map(|u| u.id),
                message_id: message.message_id,
            });
        }
        Ok(commands)
    }

    /// Poll until `shutdown` fires or the receiver goes away.
    pub fn spawn(
        mut self,
        events: mpsc::Sender<CommandReceived>,
        shutdown: Arc<Notify>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("command poller started");
            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        info!("command poller stopping");
                        break;
                    }
                    polled = self.poll_once() => match polled {
                        Ok(commands) => {
                            for event in commands {
                                debug!(command = event.command.as_str(), chat = %event.chat, "command received");
                                if events.send(event).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            warn!("getUpdates failed: {e}");
                            tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        })
    }
}
