//! Process wiring: build the components from configuration and run them.

use crate::config::{TelegramConfig, WatchConfig};
use crate::coordinator::{Coordinator, CycleOutcome, Phase, Trigger};
use crate::error::RenderFailure;
use crate::extract::{default_queries, Extractor};
use crate::notify::throttle::{FixedDelay, NoThrottle, Throttle};
use crate::notify::{Notifier, NotifyMode};
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::snapshot::SnapshotRenderer;
use crate::renderer::Renderer;
use crate::scheduler::start_scheduler;
use crate::transport::stdout::StdoutTransport;
use crate::transport::telegram::{CommandPoller, TelegramTransport};
use crate::transport::{ChatId, Transport};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

/// Buffered inbound commands before the poller waits.
const COMMAND_QUEUE: usize = 32;

/// Which engine renders the target page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RendererKind {
    /// Headless Chromium; runs page scripts.
    #[default]
    Chromium,
    /// Plain HTTP fetch; no scripts run.
    Http,
}

pub fn build_renderer(kind: RendererKind) -> Result<Arc<dyn Renderer>, RenderFailure> {
    Ok(match kind {
        RendererKind::Chromium => Arc::new(ChromiumRenderer::new()?),
        RendererKind::Http => Arc::new(SnapshotRenderer::http()),
    })
}

pub fn build_coordinator(
    watch: &WatchConfig,
    renderer: Arc<dyn Renderer>,
    transport: Arc<dyn Transport>,
    throttle: Arc<dyn Throttle>,
    chat: ChatId,
    mode: NotifyMode,
) -> Coordinator {
    let extractor = Extractor::new(
        renderer,
        watch.target_url.clone(),
        watch.render_options(),
        default_queries(watch.include_previews),
    );
    let notifier = Notifier::new(transport, throttle, chat, watch.base_url.clone());
    Coordinator::new(extractor, notifier, mode)
}

/// Run the watcher: one eager cycle, then the hourly schedule and the chat
/// command loop until Ctrl-C.
pub async fn run(renderer: RendererKind) -> Result<()> {
    let telegram = TelegramConfig::from_env()?;
    let watch = WatchConfig::from_env()?;

    info!("MakerWorld watcher v{} starting", env!("CARGO_PKG_VERSION"));
    info!("bot token: {}", telegram.token_hint());
    info!("chat id: {}", telegram.chat_id);

    let renderer = build_renderer(renderer)?;
    let transport = TelegramTransport::with_api_base(&telegram.bot_token, &telegram.api_base);
    let coordinator = Arc::new(build_coordinator(
        &watch,
        renderer,
        Arc::new(transport.clone()),
        Arc::new(FixedDelay(watch.throttle)),
        telegram.chat_id.clone(),
        watch.mode,
    ));

    info!("🚀 running initial cycle");
    coordinator.run_cycle(Trigger::Startup).await;

    let mut scheduler = start_scheduler(Arc::clone(&coordinator), &watch.schedule)
        .await
        .context("failed to start scheduler")?;

    let shutdown = Arc::new(Notify::new());
    let (events_tx, events_rx) = mpsc::channel(COMMAND_QUEUE);
    let poller = CommandPoller::new(transport).spawn(events_tx, Arc::clone(&shutdown));
    let commands = tokio::spawn(Arc::clone(&coordinator).run_commands(events_rx));

    info!("✅ scheduler and bot commands active (/repeat, /help)");
    info!("press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("shutting down");

    shutdown.notify_one();
    if let Err(e) = scheduler.shutdown().await {
        warn!("scheduler shutdown: {e}");
    }
    if let Err(e) = poller.await {
        warn!("command poller exited abnormally: {e}");
    }
    // The poller owned the sender; the command loop drains its handlers
    // once the stream closes.
    if let Err(e) = commands.await {
        warn!("command loop exited abnormally: {e}");
    }
    if coordinator.phase() == Phase::Running {
        info!("waiting for the running cycle to finish");
    }
    coordinator.wait_idle().await;
    info!("stopped");
    Ok(())
}

/// Run a single cycle and exit. `dry_run` prints messages instead of
/// sending them and needs no Telegram credentials.
pub async fn once(renderer: RendererKind, digest: bool, dry_run: bool) -> Result<()> {
    let watch = WatchConfig::from_env()?;
    let mode = if digest { NotifyMode::Digest } else { watch.mode };

    let transport: Arc<dyn Transport>;
    let throttle: Arc<dyn Throttle>;
    let chat: ChatId;
    if dry_run {
        transport = Arc::new(StdoutTransport::new());
        throttle = Arc::new(NoThrottle);
        chat = TelegramConfig::from_env()
            .map(|t| t.chat_id)
            .unwrap_or_else(|_| ChatId::new("stdout"));
    } else {
        let telegram = TelegramConfig::from_env()?;
        transport = Arc::new(TelegramTransport::with_api_base(
            &telegram.bot_token,
            &telegram.api_base,
        ));
        throttle = Arc::new(FixedDelay(watch.throttle));
        chat = telegram.chat_id;
    }

    let renderer = build_renderer(renderer)?;
    let coordinator = build_coordinator(&watch, renderer, transport, throttle, chat, mode);

    match coordinator.run_cycle(Trigger::Manual).await {
        CycleOutcome::Completed(report) if report.failed > 0 => {
            bail!("{} of {} messages failed", report.failed, report.attempted)
        }
        CycleOutcome::Completed(_) => Ok(()),
        CycleOutcome::Failed(e) => Err(e.into()),
        CycleOutcome::Skipped => bail!("cycle skipped"),
    }
}
