// src/utils/progress_bars/logging.rs - Logging helpers for verification runs
use log::{debug, info, warn};
use std::time::Instant;
use uuid::Uuid;

use crate::models::run_models::RunState;
use crate::utils::format_duration_ms;

#[derive(Clone)]
pub struct RunLogger {
    run_id: Uuid,
    start_time: Instant,
}

impl RunLogger {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, state: &RunState, resumed: bool) {
        info!(
            "[VERIFY] 🚀 {} run {} for '{}' ({} unique numbers, region {})",
            if resumed { "Resuming" } else { "Starting" },
            self.run_id,
            state.file_name,
            state.total_numbers,
            state.region
        );
        info!(
            "[VERIFY] ⚙️  {} chunks of up to {}, estimated {}",
            state.chunk_count(),
            state.batch_size,
            format_duration_ms(state.estimated_total_ms)
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        match details {
            Some(details) => info!(
                "[VERIFY] 🔄 Phase: {} - {} [+{:.1}s]",
                phase,
                details,
                elapsed.as_secs_f32()
            ),
            None => info!(
                "[VERIFY] 🔄 Phase: {} [+{:.1}s]",
                phase,
                elapsed.as_secs_f32()
            ),
        }
    }

    pub fn log_chunk_verified(&self, chunk: usize, of: usize, submitted: usize, returned: usize) {
        if returned < submitted {
            warn!(
                "[VERIFY] ⚠️ Batch {}/{} returned {} of {} rows",
                chunk, of, returned, submitted
            );
        } else {
            debug!(
                "[VERIFY] ✅ Batch {}/{} verified {} rows",
                chunk, of, returned
            );
        }
    }

    pub fn log_chunk_failed(&self, chunk: usize, of: usize, reason: &str, will_retry: bool) {
        warn!(
            "[VERIFY] ❌ Batch {}/{} failed: {}{}",
            chunk,
            of,
            reason,
            if will_retry { " (queued for retry)" } else { " (left unverified)" }
        );
    }

    pub fn log_staged(&self, what: &str, public_url: &str) {
        info!("[VERIFY] 📦 Staged {} at {}", what, public_url);
    }

    pub fn log_summary(&self, state: &RunState) {
        let elapsed = self.start_time.elapsed();
        info!("=== Verification Summary ===");
        info!("Run ID: {}", self.run_id);
        info!("File: {} (sha256 {})", state.file_name, short_digest(&state.file_digest));
        info!("Total uploaded: {}", state.total_uploaded);
        info!("Unique numbers: {}", state.total_numbers);
        info!("Verified rows: {}", state.verified_count());
        if !state.abandoned_chunks.is_empty() {
            let chunks: Vec<String> = state
                .abandoned_chunks
                .iter()
                .map(|c| (c + 1).to_string())
                .collect();
            warn!("Unverified batches: {}", chunks.join(", "));
        }
        if let Some(download) = &state.download_ref {
            info!("Download: {}", download);
        }
        info!("Total execution time: {:.2?}", elapsed);
    }
}

fn short_digest(digest: &str) -> &str {
    &digest[..digest.len().min(12)]
}
