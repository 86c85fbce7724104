// src/bin/retry_finalize.rs
//
// Issues the download link for a run whose verification finished but whose
// results upload or finalize call failed. Nothing is re-verified.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::sync::Arc;
use std::time::Instant;
use verify_lib::pipeline::{RunServices, VerificationPipeline};
use verify_lib::services::ApiClient;
use verify_lib::utils::env::load_env;
use verify_lib::utils::pipeline_state::FileRunStateStore;
use verify_lib::utils::progress_bars::progress_config::ProgressConfig;
use verify_lib::utils::verification_config::VerificationConfig;

#[derive(Parser)]
#[command(author, version, about = "Retry finalize for a verified run", long_about = None)]
struct RetryArgs {
    /// Identity the run was recorded under
    #[arg(long, env = "VERIFY_USER_ID")]
    user_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    env_logger::init();

    let args = RetryArgs::parse();
    let mut config = VerificationConfig::from_env();
    if let Some(user_id) = args.user_id {
        config.user_id = Some(user_id);
    }

    let start = Instant::now();
    let client = Arc::new(ApiClient::new(&config).context("Failed to set up API client")?);
    let store = Arc::new(FileRunStateStore::new(config.state_dir.clone()));
    let pipeline = VerificationPipeline::new(
        config,
        ProgressConfig::from_env(),
        RunServices {
            verifier: client.clone(),
            storage: client.clone(),
            history: client,
            store,
        },
    );

    let report = pipeline.retry_finalize().await?;
    info!(
        "Finalized run {} in {:.2?}: {} of {} unique numbers verified",
        report.run_id,
        start.elapsed(),
        report.verified_count,
        report.unique_count
    );
    println!("{}", report.download_ref);
    Ok(())
}
