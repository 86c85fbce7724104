// src/tracking/tracker.rs
//
// Time-based display estimate. Chunk completions arrive every ~50 items, too
// coarse to animate, so between them the tracker extrapolates from elapsed
// active time. It never claims 100% on its own.

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::models::run_models::RunState;
use crate::tracking::RunHandle;
use crate::utils::constants::DISPLAY_PROGRESS_CAP;
use crate::utils::pipeline_state::RunStateStore;
use crate::utils::progress_bars::progress_config::ProgressConfig;

/// Recomputes the projected fields of `state` at `now` and republishes.
/// A paused, finished or idle run keeps its last projection.
pub fn tick(state: &mut RunState, now: DateTime<Utc>, avg_latency_ms: f64) {
    if state.is_paused || !state.is_uploading || state.is_complete() {
        return;
    }

    let total = state.total_numbers;
    let elapsed = state.active_elapsed_ms(now) as f64;
    let projected = if avg_latency_ms > 0.0 {
        ((elapsed / avg_latency_ms).floor() as usize).min(total)
    } else {
        total
    };

    state.projected_processed = projected;
    state.displayed_progress = if total == 0 {
        0.0
    } else {
        (projected as f64 / total as f64 * 100.0).min(DISPLAY_PROGRESS_CAP)
    };
    state.projected_remaining_ms = ((total - projected) as f64 * avg_latency_ms).max(0.0).round() as u64;
    state.publish();
}

/// Settings for the background ticking task.
#[derive(Clone)]
pub struct TrackerSettings {
    pub avg_latency_ms: f64,
    pub interval: Duration,
    pub progress: ProgressConfig,
    pub bar: Option<ProgressBar>,
}

/// Background task ticking the estimate and persisting the snapshot.
pub struct ProgressTracker {
    stop_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl ProgressTracker {
    pub fn start(handle: RunHandle, store: Arc<dyn RunStateStore>, settings: TrackerSettings) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(settings.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        {
                            let mut state = handle.state().lock().await;
                            tick(&mut state, Utc::now(), settings.avg_latency_ms);
                        }
                        let snapshot = match handle.persist(&store).await {
                            Ok(snapshot) => snapshot,
                            Err(e) => {
                                warn!("[VERIFY] Failed to persist progress snapshot: {:#}", e);
                                handle.snapshot().await
                            }
                        };
                        if let Some(pb) = &settings.bar {
                            settings.progress.render(pb, &snapshot);
                        }
                    }
                }
            }
            debug!("[VERIFY] Progress tracker stopped");
        });

        Self {
            stop_tx: Some(stop_tx),
            join,
        }
    }

    /// Stops ticking. Later writes by the dispatcher are final.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.join.await {
            warn!("[VERIFY] Progress tracker task ended abnormally: {}", e);
        }
    }
}
