// Copyright 2026 Makerwatch Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Parser, Subcommand};
use makerwatch::daemon::{self, RendererKind};
use makerwatch::logging;

#[derive(Parser)]
#[command(
    name = "makerwatch",
    about = "Makerwatch: MakerWorld top models, delivered to Telegram",
    version,
    after_help = "Configuration is read from the environment (and .env).\nTG_BOT_TOKEN and TG_CHAT_ID are required."
)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Engine used to render the target page
    #[arg(long, global = true, value_enum, default_value_t = RendererKind::Chromium)]
    renderer: RendererKind,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the watcher: one cycle now, then hourly and on /repeat
    Run,
    /// Run a single cycle and exit
    Once {
        /// Send one summary message instead of one per model
        #[arg(long)]
        digest: bool,
        /// Print messages to stdout instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let json = cli.json
        || std::env::var("MAKERWATCH_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");
    logging::init(json, cli.verbose);

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => daemon::run(cli.renderer).await,
        Commands::Once { digest, dry_run } => daemon::once(cli.renderer, digest, dry_run).await,
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}
