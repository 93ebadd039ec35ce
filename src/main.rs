use std::sync::Arc;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};

use hornbot::bot::store::CursorStore;
use hornbot::bot::{poll, BotSettings};
use hornbot::config::Config;
use hornbot::mastodon::client::MastodonClient;

/// Hornbot: a Mastodon bot that sounds the horn for your followers.
///
/// Watches the account's notifications; greets new followers, and when
/// someone tells it to toot the horn, announces the meeting link to every
/// follower in rate-safe batches.
#[derive(Parser)]
#[command(name = "hornbot", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the notification poll loop
    Run,

    /// Show the persisted bot state (cursor, last horn, reset period)
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hornbot=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            let config = Config::load()?;
            config.require_mastodon()?;
            config.require_link()?;

            let store = CursorStore::new(&config.storage_dir);
            let cursor = store.load();
            let client = MastodonClient::new(
                &config.mastodon_instance,
                &config.mastodon_token,
                cursor.api_reset_period,
            )?;
            let settings = BotSettings::from_config(&config);

            poll::run(Arc::new(client), store, settings).await
        }

        Commands::Status => {
            let config = Config::load()?;
            let store = CursorStore::new(&config.storage_dir);
            let cursor = store.load();

            println!("State file: {}", store.path().display());
            if cursor.last_note_id.is_empty() {
                println!("Last notification: none processed yet");
            } else {
                println!("Last notification: {}", cursor.last_note_id);
            }
            match Utc.timestamp_opt(cursor.last_horn_time, 0).single() {
                Some(when) if cursor.last_horn_time > 0 => {
                    println!("Last horn: {}", when.to_rfc3339());
                }
                _ => println!("Last horn: never"),
            }
            println!("Observed reset period: {} sec", cursor.api_reset_period);
            Ok(())
        }
    }
}
