//! Trigger coordinator: owns the cycle-in-flight state and reacts to timer
//! ticks and chat commands.
//!
//! ```text
//!   timer tick ──┐
//!                ├─► try_start ─► Extractor ─► Notifier ─► guard drop (Idle)
//!   /repeat ─────┘      │
//!                       └─ already Running: timer drops, command gets "busy"
//! ```

use crate::error::{CycleError, CycleResult};
use crate::extract::Extractor;
use crate::notify::format::{ACK_TEXT, BUSY_TEXT, FETCH_ERROR_TEXT, HELP_TEXT, UNAUTHORIZED_TEXT};
use crate::notify::{DeliveryReport, Notifier, NotifyMode, Target};
use crate::transport::{ChatId, Command, CommandReceived, MessageHandle, SendOptions};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};

/// Whether a cycle is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
}

/// Process-wide cycle flag. Only [`CycleState::try_start`] sets it and only
/// dropping the returned guard clears it.
#[derive(Debug, Default)]
pub struct CycleState {
    running: AtomicBool,
    idle: Notify,
}

impl CycleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `Idle -> Running`, or `None` if a cycle is already in flight.
    pub fn try_start(&self) -> Option<CycleGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard { state: self })
    }

    pub fn phase(&self) -> Phase {
        if self.running.load(Ordering::Acquire) {
            Phase::Running
        } else {
            Phase::Idle
        }
    }

    /// Resolve once no cycle is in flight.
    pub async fn wait_idle(&self) {
        loop {
            // Registered before the check so a release in between is seen.
            let released = self.idle.notified();
            if self.phase() == Phase::Idle {
                return;
            }
            released.await;
        }
    }
}

/// Holds `Running` for as long as it lives; returns to `Idle` on drop,
/// including during unwinding.
#[must_use = "the cycle ends as soon as the guard is dropped"]
pub struct CycleGuard<'a> {
    state: &'a CycleState,
}

impl CycleGuard<'_> {
    /// End the cycle explicitly.
    pub fn finish(self) {}
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::Release);
        self.state.idle.notify_waiters();
    }
}

/// What started a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Schedule,
    /// A one-off run from the command line.
    Manual,
    Command { chat: ChatId, message_id: i64 },
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Startup => f.write_str("startup"),
            Self::Schedule => f.write_str("schedule"),
            Self::Manual => f.write_str("manual"),
            Self::Command { .. } => f.write_str("command"),
        }
    }
}

/// Result of a timer or startup trigger.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(DeliveryReport),
    /// Another cycle was running; this trigger was dropped.
    Skipped,
    Failed(CycleError),
}

/// Result of handling one inbound command.
#[derive(Debug)]
pub enum CommandOutcome {
    /// Sent from a chat other than the configured one.
    Rejected,
    /// A cycle was already running; the requester was asked to retry.
    Busy,
    Completed(DeliveryReport),
    Failed(CycleError),
    HelpSent,
    /// Nothing to do (e.g. `/help` from a foreign chat).
    Ignored,
}

/// Serializes extraction-and-notify cycles across all triggers.
pub struct Coordinator {
    extractor: Extractor,
    notifier: Notifier,
    mode: NotifyMode,
    authorized_chat: ChatId,
    state: CycleState,
}

impl Coordinator {
    /// The notifier's default chat is also the only chat allowed to issue
    /// commands.
    pub fn new(extractor: Extractor, notifier: Notifier, mode: NotifyMode) -> Self {
        let authorized_chat = notifier.default_chat().clone();
        Self {
            extractor,
            notifier,
            mode,
            authorized_chat,
            state: CycleState::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Wait for an in-flight cycle to run to completion.
    pub async fn wait_idle(&self) {
        self.state.wait_idle().await
    }

    pub fn is_authorized(&self, chat: &ChatId) -> bool {
        chat == &self.authorized_chat
    }

    /// Run one cycle for a non-command trigger in the configured mode,
    /// unless one is already running.
    pub async fn run_cycle(&self, trigger: Trigger) -> CycleOutcome {
        let Some(guard) = self.state.try_start() else {
            info!("{trigger} trigger dropped: a cycle is already running");
            return CycleOutcome::Skipped;
        };

        let span = info_span!("cycle", id = %uuid::Uuid::new_v4(), trigger = %trigger);
        let outcome = async {
            info!("{}", "=".repeat(60));
            let outcome = match self.cycle(&Target::Default, self.mode).await {
                Ok(report) => {
                    info!(
                        attempted = report.attempted,
                        succeeded = report.succeeded,
                        failed = report.failed,
                        "✅ cycle completed"
                    );
                    CycleOutcome::Completed(report)
                }
                Err(e) => {
                    error!("❌ cycle failed: {e}");
                    CycleOutcome::Failed(e)
                }
            };
            info!("{}", "=".repeat(60));
            outcome
        }
        .instrument(span)
        .await;

        guard.finish();
        outcome
    }

    async fn cycle(&self, target: &Target, mode: NotifyMode) -> CycleResult<DeliveryReport> {
        let result = self.extractor.extract().await?;
        let report = self.notifier.notify(&result, target, mode).await?;
        if report.failed > 0 {
            warn!(
                "{} of {} messages were not delivered",
                report.failed, report.attempted
            );
        }
        Ok(report)
    }

    /// React to one inbound command.
    pub async fn handle_command(&self, event: &CommandReceived) -> CommandOutcome {
        match event.command {
            Command::Repeat => self.handle_repeat(event).await,
            Command::Help => self.handle_help(event).await,
        }
    }

    async fn handle_repeat(&self, event: &CommandReceived) -> CommandOutcome {
        if !self.is_authorized(&event.chat) {
            warn!(chat = %event.chat, "unauthorized /repeat rejected");
            self.reply(event, UNAUTHORIZED_TEXT, false).await;
            return CommandOutcome::Rejected;
        }

        let Some(guard) = self.state.try_start() else {
            info!(chat = %event.chat, "/repeat while a cycle is running");
            self.reply(event, BUSY_TEXT, false).await;
            return CommandOutcome::Busy;
        };

        let trigger = Trigger::Command {
            chat: event.chat.clone(),
            message_id: event.message_id,
        };
        let span = info_span!("cycle", id = %uuid::Uuid::new_v4(), trigger = %trigger);
        let outcome = async {
            info!(
                "🔄 /repeat received from user {} in chat {}",
                event.user_id.map(|id| id.to_string()).unwrap_or_else(|| "?".into()),
                event.chat
            );
            let ack = self.reply(event, ACK_TEXT, false).await;

            let target = Target::Requester {
                chat: event.chat.clone(),
                reply_to: event.message_id,
            };
            let outcome = self.cycle(&target, NotifyMode::PerItem).await;

            if let Some(ack) = ack {
                if let Err(e) = self
                    .notifier
                    .transport()
                    .delete_message(&ack.chat, ack.message_id)
                    .await
                {
                    warn!("could not remove acknowledgment message: {e}");
                }
            }

            match outcome {
                Ok(report) => {
                    info!("✅ sent {} models to chat {}", report.succeeded, event.chat);
                    CommandOutcome::Completed(report)
                }
                Err(e) => {
                    error!("error processing /repeat: {e}");
                    self.reply(event, FETCH_ERROR_TEXT, false).await;
                    CommandOutcome::Failed(e)
                }
            }
        }
        .instrument(span)
        .await;

        guard.finish();
        outcome
    }

    async fn handle_help(&self, event: &CommandReceived) -> CommandOutcome {
        if !self.is_authorized(&event.chat) {
            info!(chat = %event.chat, "ignoring /help from foreign chat");
            return CommandOutcome::Ignored;
        }
        match self.reply(event, HELP_TEXT, true).await {
            Some(_) => CommandOutcome::HelpSent,
            None => CommandOutcome::Ignored,
        }
    }

    /// Reply in the command's chat, threaded under it. Failures are logged.
    async fn reply(
        &self,
        event: &CommandReceived,
        text: &str,
        markdown: bool,
    ) -> Option<MessageHandle> {
        let options = SendOptions {
            markdown,
            reply_to: Some(event.message_id),
        };
        match self
            .notifier
            .transport()
            .send_message(&event.chat, text, &options)
            .await
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(chat = %event.chat, "reply failed: {e}");
                None
            }
        }
    }

    /// Handle commands until the sender side closes. Each command runs on
    /// its own task so a long cycle never blocks a "busy" reply. Handlers
    /// still running when the stream closes are awaited, not cancelled.
    pub async fn run_commands(self: Arc<Self>, mut events: mpsc::Receiver<CommandReceived>) {
        let mut handlers = JoinSet::new();
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        let this = Arc::clone(&self);
                        handlers.spawn(async move {
                            this.handle_command(&event).await;
                        });
                    }
                    None => break,
                },
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    log_handler_exit(joined);
                }
            }
        }

        if !handlers.is_empty() {
            info!("command stream closed, waiting for {} handler(s)", handlers.len());
        }
        while let Some(joined) = handlers.join_next().await {
            log_handler_exit(joined);
        }
        info!("command stream closed");
    }
}

fn log_handler_exit(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!("command handler aborted: {e}");
    }
}
