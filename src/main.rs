use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{error, info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use verify_lib::models::run_models::Region;
use verify_lib::models::upload::RawUpload;
use verify_lib::pipeline::{RunOptions, RunServices, VerificationPipeline};
use verify_lib::services::ApiClient;
use verify_lib::tracking::RunHandle;
use verify_lib::utils::env::load_env;
use verify_lib::utils::format_duration_ms;
use verify_lib::utils::pipeline_state::{clear_run_state, save_run_state, FileRunStateStore};
use verify_lib::utils::progress_bars::progress_callback::create_simple_callback;
use verify_lib::utils::progress_bars::progress_config::ProgressConfig;
use verify_lib::utils::verification_config::VerificationConfig;

#[derive(Parser)]
#[command(author, version, about = "Verify a bulk list of phone numbers", long_about = None)]
struct VerifyArgs {
    /// CSV, TXT or spreadsheet file with one number per row
    #[arg(short, long)]
    file: PathBuf,

    /// Target region: USA, UK, Australia, India (or its dialing prefix)
    #[arg(short, long, default_value = "USA")]
    region: Region,

    /// Identity the run is recorded under
    #[arg(long, env = "VERIFY_USER_ID")]
    user_id: Option<String>,

    /// Continue the saved run for this identity instead of starting over
    #[arg(long)]
    resume: bool,

    /// Discard any saved run for this identity before starting
    #[arg(long, conflicts_with = "resume")]
    reset: bool,
}

enum Control {
    Pause,
    Resume,
}

/// Reads `p` / `r` lines from stdin on a plain thread; tokio's stdin would
/// hold the runtime open on exit.
fn spawn_stdin_controls() -> mpsc::Receiver<Control> {
    let (tx, rx) = mpsc::channel(8);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let control = match line.trim().to_ascii_lowercase().as_str() {
                "p" | "pause" => Control::Pause,
                "r" | "resume" => Control::Resume,
                _ => continue,
            };
            if tx.blocking_send(control).is_err() {
                break;
            }
        }
    });
    rx
}

async fn apply_controls(mut rx: mpsc::Receiver<Control>, handle: RunHandle) {
    while let Some(control) = rx.recv().await {
        match control {
            Control::Pause => handle.pause().await,
            Control::Resume => handle.resume().await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    load_env();
    env_logger::init();
    info!("Starting bulk phone number verification");

    let args = VerifyArgs::parse();

    let mut config = VerificationConfig::from_env();
    if let Some(user_id) = args.user_id.filter(|u| !u.trim().is_empty()) {
        config.user_id = Some(user_id);
    }
    config.log_config();

    let progress_config = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, refresh={}ms",
        progress_config.enabled, progress_config.refresh_rate_ms
    );
    let multi_progress = progress_config.create_multi_progress();

    let client = Arc::new(ApiClient::new(&config).context("Failed to set up API client")?);
    let store = Arc::new(FileRunStateStore::new(config.state_dir.clone()));

    if args.reset {
        let identity = config.require_identity()?;
        clear_run_state(store.as_ref(), identity)?;
        info!("Discarded saved run for {}", identity);
    }

    let pipeline = Arc::new(
        VerificationPipeline::new(
            config.clone(),
            progress_config,
            RunServices {
                verifier: client.clone(),
                storage: client.clone(),
                history: client,
                store: store.clone(),
            },
        )
        .with_progress_callback(create_simple_callback("VERIFY")),
    );

    // Phase 1: ingestion
    let phase1_start = Instant::now();
    info!("Phase 1: Reading {}", args.file.display());
    let upload = RawUpload::from_path(&args.file).await?;
    let prepared = pipeline.prepare(
        upload,
        RunOptions {
            region: args.region,
            resume: args.resume,
        },
    )?;
    info!(
        "Phase 1 completed in {:.2?}: {} numbers, {} unique, {} duplicates, estimated {}",
        phase1_start.elapsed(),
        prepared.candidates.total_count(),
        prepared.candidates.unique_count(),
        prepared.candidates.duplicate_count(),
        format_duration_ms(prepared.candidates.estimated_total_ms())
    );
    if prepared.resumed {
        let state = prepared.handle.snapshot().await;
        info!(
            "Resuming run {} at {}/{} numbers",
            state.run_id, state.processed_numbers, state.total_numbers
        );
    }
    info!("Type 'p' + Enter to pause, 'r' + Enter to resume, Ctrl-C to stop and keep progress");

    let handle = prepared.handle.clone();
    let controls = tokio::spawn(apply_controls(spawn_stdin_controls(), handle.clone()));

    // Phase 2: stage, verify, finalize
    let phase2_start = Instant::now();
    let outcome = tokio::select! {
        result = pipeline.execute(prepared, multi_progress.as_ref()) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    controls.abort();

    match outcome {
        None => {
            let state = handle.snapshot().await;
            if let Err(e) = save_run_state(store.as_ref(), &state, Utc::now()) {
                warn!("Failed to save run before exiting: {:#}", e);
            }
            info!(
                "Interrupted at {}/{} numbers; rerun with --resume within {} to continue",
                state.processed_numbers,
                state.total_numbers,
                format_duration_ms(config.snapshot_ttl_secs.max(0) as u64 * 1000)
            );
            Ok(())
        }
        Some(Ok(report)) => {
            info!("Phase 2 completed in {:.2?}", phase2_start.elapsed());
            info!(
                "Verified {} of {} unique numbers ({} uploaded)",
                report.verified_count, report.unique_count, report.total_uploaded
            );
            if !report.abandoned_chunks.is_empty() {
                warn!(
                    "{} batches could not be verified and are missing from the results",
                    report.abandoned_chunks.len()
                );
            }
            println!("{}", report.download_ref);
            Ok(())
        }
        Some(Err(e)) => {
            if e.is_finalize_retryable() {
                error!("Verified data was kept; run `retry_finalize` to issue the download link");
            }
            Err(e.into())
        }
    }
}
