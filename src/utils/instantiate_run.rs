use crate::models::run_models::{Region, RunPhase, RunState};
use crate::utils::constants::BATCH_SIZE;
use chrono::{DateTime, Utc};
use log::info;
use uuid::Uuid;

#[allow(clippy::too_many_arguments)]
pub fn create_initial_run_state(
    identity: &str,
    file_name: &str,
    file_digest: &str,
    region: Region,
    total_uploaded: usize,
    candidates: Vec<String>,
    avg_latency_ms: f64,
    start_timestamp: DateTime<Utc>,
) -> RunState {
    let run_id = Uuid::new_v4();
    let total_numbers = candidates.len();
    let estimated_total_ms = (total_numbers as f64 * avg_latency_ms).round() as u64;

    info!(
        "Created run {} for {}: {} unique of {} uploaded numbers from '{}'",
        run_id, identity, total_numbers, total_uploaded, file_name
    );

    RunState {
        run_id,
        identity: identity.to_string(),
        file_name: file_name.to_string(),
        file_digest: file_digest.to_string(),
        region,
        total_uploaded,
        total_numbers,
        processed_numbers: 0,
        projected_processed: 0,
        displayed_progress: 0.0,
        confirmed_progress: None,
        progress_percent: 0.0,
        estimated_total_ms,
        projected_remaining_ms: estimated_total_ms,
        live_remaining_ms: None,
        time_remaining_ms: estimated_total_ms,
        start_timestamp,
        accumulated_pause_ms: 0,
        pause_started_at: None,
        is_uploading: true,
        is_paused: false,
        phase: RunPhase::Idle,
        candidates,
        batch_size: BATCH_SIZE,
        next_chunk: 0,
        failed_chunks: Vec::new(),
        retry_rounds_done: 0,
        abandoned_chunks: Vec::new(),
        result_rows: Vec::new(),
        staged_original: None,
        staged_results: None,
        download_ref: None,
    }
}
