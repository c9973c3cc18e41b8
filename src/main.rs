use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use console::Emoji;
use tokio::sync::Semaphore;
use tracing::Level;

use page_mirror::cli::{CloneArgs, Command, MirrorCommand};
use page_mirror::{build_http_client, fix_asset_paths, MirrorOutcome, MirrorSession};

static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "");
static CROSS: Emoji<'_, '_> = Emoji("❌ ", "x ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");

#[tokio::main]
async fn main() -> Result<()> {
    let args = MirrorCommand::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Clone(clone) => run_clone(clone).await,
        Command::Fix { directory } => {
            let report = fix_asset_paths(&directory)
                .await
                .with_context(|| format!("Failed to clean up {}", directory.display()))?;
            println!("{}{}", CHECK, report.message().green());
            Ok(())
        }
    }
}

async fn run_clone(args: CloneArgs) -> Result<()> {
    let config = args.mirror_config();
    let client = build_http_client(&config)?;
    let limiter = Arc::new(Semaphore::new(config.max_concurrent));

    if !args.json {
        println!("{}Mirroring {}", ROCKET, args.url.blue());
        println!("⚡ Max concurrent downloads: {}", config.max_concurrent);
    }

    let mut session = MirrorSession::new(client, limiter, config);
    let summary = session.mirror(&args.url).await;

    if !args.json {
        if let Ok(summary) = &summary {
            for failure in &summary.failures {
                println!("{}{} ({})", WARN, failure.url.yellow(), failure.reason);
            }
        }
    }

    let outcome = MirrorOutcome::from(summary);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        match &outcome {
            MirrorOutcome::Success { message, .. } => println!("{}{}", CHECK, message.green()),
            MirrorOutcome::Failure { error } => println!("{}{}", CROSS, error.red()),
        }
    }

    if !outcome.is_success() {
        bail!("mirror of {} failed", args.url);
    }
    Ok(())
}
