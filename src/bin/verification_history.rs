// src/bin/verification_history.rs
//
// Lists the completed verification runs recorded for an identity, newest
// first, with their counts and download links.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use verify_lib::services::{ApiClient, HistoryService};
use verify_lib::utils::env::load_env;
use verify_lib::utils::verification_config::VerificationConfig;

#[derive(Parser)]
#[command(author, version, about = "List past verification runs", long_about = None)]
struct HistoryArgs {
    /// Identity whose history to list
    #[arg(long, env = "VERIFY_USER_ID")]
    user_id: Option<String>,

    /// Show at most this many entries
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    env_logger::init();

    let args = HistoryArgs::parse();
    let mut config = VerificationConfig::from_env();
    if let Some(user_id) = args.user_id {
        config.user_id = Some(user_id);
    }
    let identity = config.require_identity()?.to_string();

    let client = ApiClient::new(&config).context("Failed to set up API client")?;
    let mut entries = client
        .user_history(&identity)
        .await
        .context("Failed to fetch verification history")?;
    info!("Fetched {} history entries for {}", entries.len(), identity);

    // Entries without a timestamp sort last.
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    if entries.is_empty() {
        println!("No verification runs recorded for {}", identity);
        return Ok(());
    }

    println!(
        "{:<20} {:>9} {:>8} {:>9}  {}",
        "created", "uploaded", "unique", "verified", "download"
    );
    for entry in entries.iter().take(args.limit) {
        let created = entry
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:>9} {:>8} {:>9}  {}",
            created,
            entry.total_uploaded,
            entry.unique_count,
            entry.verified_count,
            entry.download_ref.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
