// src/dispatch/batch.rs
//
// Sequential chunk dispatch. One chunk is in flight at a time, so
// `processed_numbers` only ever moves forward and every settled chunk is
// persisted before the next one is submitted.

use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;

use crate::errors::PipelineError;
use crate::models::run_models::{RunPhase, RunState};
use crate::models::verification::VerifiedRow;
use crate::services::VerificationService;
use crate::tracking::RunHandle;
use crate::update_detailed_progress;
use crate::utils::constants::DISPLAY_PROGRESS_CAP;
use crate::utils::pipeline_state::RunStateStore;
use crate::utils::progress_bars::logging::RunLogger;
use crate::utils::progress_bars::progress_callback::{ProgressCallback, StatusBoard};

/// Outcome of one full dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub chunks: usize,
    pub verified_rows: usize,
    pub abandoned_chunks: Vec<usize>,
}

pub struct BatchDispatcher {
    verifier: Arc<dyn VerificationService>,
    store: Arc<dyn RunStateStore>,
    logger: RunLogger,
    status: StatusBoard,
    progress_callback: Option<ProgressCallback>,
    chunk_retry_limit: usize,
}

/// Result of submitting one chunk, applied to the run under the lock.
enum ChunkOutcome {
    Verified(Vec<VerifiedRow>),
    Failed(String),
}

impl BatchDispatcher {
    pub fn new(
        verifier: Arc<dyn VerificationService>,
        store: Arc<dyn RunStateStore>,
        logger: RunLogger,
        status: StatusBoard,
        chunk_retry_limit: usize,
    ) -> Self {
        Self {
            verifier,
            store,
            logger,
            status,
            progress_callback: None,
            chunk_retry_limit,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Runs the initial pass from `next_chunk`, then the retry passes, then
    /// forces the run to its completed counts.
    pub async fn dispatch(&self, handle: &RunHandle) -> DispatchSummary {
        let start = Instant::now();

        // Initial pass, in order.
        loop {
            let (index, of) = {
                let state = handle.state().lock().await;
                (state.next_chunk, state.chunk_count())
            };
            if index >= of {
                break;
            }
            let outcome = self.submit(handle, index, of).await;
            self.settle(handle, index, of, outcome, true).await;
        }

        // Retry passes over whatever failed, still in original order.
        loop {
            let (round, queued, of) = {
                let state = handle.state().lock().await;
                (
                    state.retry_rounds_done,
                    state.failed_chunks.clone(),
                    state.chunk_count(),
                )
            };
            if queued.is_empty() || round >= self.chunk_retry_limit {
                break;
            }
            info!(
                "[VERIFY] 🔁 Retry pass {}/{} over {} failed batches",
                round + 1,
                self.chunk_retry_limit,
                queued.len()
            );
            for index in queued {
                let outcome = self.submit(handle, index, of).await;
                let last_attempt = round + 1 >= self.chunk_retry_limit;
                self.settle(handle, index, of, outcome, !last_attempt).await;
            }
            let mut state = handle.state().lock().await;
            state.retry_rounds_done += 1;
        }

        let summary = {
            let mut state = handle.state().lock().await;
            self.abandon_remaining(&mut state);
            force_complete(&mut state);
            DispatchSummary {
                chunks: state.chunk_count(),
                verified_rows: state.verified_count(),
                abandoned_chunks: state.abandoned_chunks.clone(),
            }
        };
        self.persist(handle).await;

        info!(
            "[VERIFY] ✅ Dispatch finished: {} rows from {} batches in {:.2?}",
            summary.verified_rows,
            summary.chunks,
            start.elapsed()
        );
        summary
    }

    async fn submit(&self, handle: &RunHandle, index: usize, of: usize) -> ChunkOutcome {
        handle.gate().wait_until_running().await;

        let (identity, numbers, region_code) = {
            let mut state = handle.state().lock().await;
            state.phase = RunPhase::Verifying {
                batch: index + 1,
                of,
            };
            (
                state.identity.clone(),
                state.chunk(index).to_vec(),
                state.region.dialing_prefix(),
            )
        };
        self.status.set_phase(
            RunPhase::Verifying {
                batch: index + 1,
                of,
            },
            None,
        );

        match self
            .verifier
            .verify_batch(&identity, &numbers, region_code)
            .await
        {
            Ok(rows) => {
                self.logger
                    .log_chunk_verified(index + 1, of, numbers.len(), rows.len());
                ChunkOutcome::Verified(rows)
            }
            Err(e) => ChunkOutcome::Failed(format!("{:#}", e)),
        }
    }

    async fn settle(
        &self,
        handle: &RunHandle,
        index: usize,
        of: usize,
        outcome: ChunkOutcome,
        may_retry: bool,
    ) {
        let mut state = handle.state().lock().await;
        let first_pass = index == state.next_chunk;

        match outcome {
            ChunkOutcome::Verified(rows) => {
                state.result_rows.extend(rows);
                state.failed_chunks.retain(|&c| c != index);
                let size = state.chunk(index).len();
                advance_processed(&mut state, size);
            }
            ChunkOutcome::Failed(reason) => {
                let will_retry = may_retry && self.chunk_retry_limit > 0;
                self.logger
                    .log_chunk_failed(index + 1, of, &reason, will_retry);
                self.status
                    .report_error(&PipelineError::ChunkVerificationFailed {
                        chunk: index + 1,
                        of,
                        reason,
                    });
                if will_retry {
                    if !state.failed_chunks.contains(&index) {
                        state.failed_chunks.push(index);
                    }
                } else {
                    state.failed_chunks.retain(|&c| c != index);
                    state.abandoned_chunks.push(index);
                    let size = state.chunk(index).len();
                    advance_processed(&mut state, size);
                }
            }
        }

        if first_pass {
            state.next_chunk = index + 1;
        }
        update_detailed_progress!(
            self.progress_callback,
            "Verifying",
            state.processed_numbers,
            state.total_numbers
        );
        drop(state);
        self.persist(handle).await;
    }

    fn abandon_remaining(&self, state: &mut RunState) {
        let leftover = std::mem::take(&mut state.failed_chunks);
        for index in leftover {
            warn!(
                "[VERIFY] Batch {}/{} left unverified after {} retries",
                index + 1,
                state.chunk_count(),
                state.retry_rounds_done
            );
            let size = state.chunk(index).len();
            state.abandoned_chunks.push(index);
            advance_processed(state, size);
        }
        state.abandoned_chunks.sort_unstable();
    }

    async fn persist(&self, handle: &RunHandle) {
        if let Err(e) = handle.persist(&self.store).await {
            warn!("[VERIFY] Failed to persist run snapshot: {:#}", e);
        }
    }
}

/// Moves the authoritative count forward by a settled chunk and refreshes
/// the confirmed clock and the live rate.
fn advance_processed(state: &mut RunState, settled: usize) {
    state.processed_numbers = (state.processed_numbers + settled).min(state.total_numbers);

    let total = state.total_numbers;
    let processed = state.processed_numbers;
    if total > 0 {
        state.confirmed_progress =
            Some((processed as f64 / total as f64 * 100.0).min(DISPLAY_PROGRESS_CAP));
    }
    if processed > 0 {
        let elapsed = state.active_elapsed_ms(Utc::now()) as f64;
        let per_item = elapsed / processed as f64;
        state.live_remaining_ms = Some(((total - processed) as f64 * per_item).round() as u64);
    }
    state.publish();
}

/// Completion overrides whatever the display clock last projected.
fn force_complete(state: &mut RunState) {
    state.processed_numbers = state.total_numbers;
    state.projected_processed = state.total_numbers;
    state.confirmed_progress = Some(100.0);
    state.live_remaining_ms = Some(0);
    state.projected_remaining_ms = 0;
    state.publish();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::run_models::Region;
    use crate::services::testing::FakeVerifier;
    use crate::utils::instantiate_run::create_initial_run_state;
    use crate::utils::pipeline_state::{load_any_run, InMemoryRunStateStore};
    use uuid::Uuid;

    fn numbers(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("55500{:05}", i)).collect()
    }

    fn run_of(n: usize) -> RunState {
        create_initial_run_state(
            "u1",
            "list.csv",
            "d",
            Region::Uk,
            n,
            numbers(n),
            77.8,
            Utc::now(),
        )
    }

    fn dispatcher(
        verifier: Arc<FakeVerifier>,
        store: Arc<InMemoryRunStateStore>,
        retries: usize,
    ) -> BatchDispatcher {
        BatchDispatcher::new(
            verifier,
            store,
            RunLogger::new(Uuid::new_v4()),
            StatusBoard::new(),
            retries,
        )
    }

    #[tokio::test]
    async fn test_three_chunks_complete_at_exactly_100() {
        let verifier = Arc::new(FakeVerifier::new());
        let store = Arc::new(InMemoryRunStateStore::new());
        let mut state = run_of(120);
        // A display estimate far ahead of reality must not survive completion.
        state.displayed_progress = 98.0;
        state.publish();
        let handle = RunHandle::new(state);

        let summary = dispatcher(verifier.clone(), store.clone(), 1)
            .dispatch(&handle)
            .await;

        assert_eq!(verifier.call_sizes(), vec![50, 50, 20]);
        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.verified_rows, 120);
        let state = handle.snapshot().await;
        assert_eq!(state.processed_numbers, 120);
        assert_eq!(state.progress_percent, 100.0);
        assert_eq!(state.time_remaining_ms, 0);
        assert_eq!(state.result_rows[0].e164, "+445550000000");

        let saved = load_any_run(store.as_ref(), "u1").unwrap().unwrap();
        assert_eq!(saved.progress_percent, 100.0);
    }

    #[tokio::test]
    async fn test_failed_middle_chunk_is_skipped_after_retry() {
        let all = numbers(120);
        let verifier = Arc::new(FakeVerifier::new().failing_always(&all[50]));
        let store = Arc::new(InMemoryRunStateStore::new());
        let handle = RunHandle::new(run_of(120));

        let summary = dispatcher(verifier.clone(), store, 1)
            .dispatch(&handle)
            .await;

        // Initial pass plus one retry of the middle chunk.
        assert_eq!(verifier.call_sizes(), vec![50, 50, 20, 50]);
        assert_eq!(summary.abandoned_chunks, vec![1]);
        let state = handle.snapshot().await;
        assert_eq!(state.result_rows.len(), 70);
        assert!(state.result_rows.iter().all(|r| r.number != all[50]));
        assert_eq!(state.result_rows[50].number, all[100]);
        assert_eq!(state.processed_numbers, 120);
        assert_eq!(state.progress_percent, 100.0);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_on_retry() {
        let all = numbers(120);
        let verifier = Arc::new(FakeVerifier::new().failing_once(&all[0]));
        let store = Arc::new(InMemoryRunStateStore::new());
        let handle = RunHandle::new(run_of(120));

        let summary = dispatcher(verifier.clone(), store, 1)
            .dispatch(&handle)
            .await;

        assert_eq!(verifier.call_sizes(), vec![50, 50, 20, 50]);
        assert!(summary.abandoned_chunks.is_empty());
        assert_eq!(summary.verified_rows, 120);
    }

    #[tokio::test]
    async fn test_no_retries_when_limit_is_zero() {
        let all = numbers(120);
        let verifier = Arc::new(FakeVerifier::new().failing_once(&all[50]));
        let store = Arc::new(InMemoryRunStateStore::new());
        let handle = RunHandle::new(run_of(120));

        let summary = dispatcher(verifier.clone(), store, 0)
            .dispatch(&handle)
            .await;

        assert_eq!(verifier.call_sizes(), vec![50, 50, 20]);
        assert_eq!(summary.abandoned_chunks, vec![1]);
        assert_eq!(summary.verified_rows, 70);
    }

    #[tokio::test]
    async fn test_short_response_keeps_rows_without_retry() {
        let all = numbers(120);
        let verifier = Arc::new(FakeVerifier::new().short_response(&all[100]));
        let store = Arc::new(InMemoryRunStateStore::new());
        let handle = RunHandle::new(run_of(120));

        let summary = dispatcher(verifier.clone(), store, 1)
            .dispatch(&handle)
            .await;

        assert_eq!(verifier.call_sizes(), vec![50, 50, 20]);
        assert_eq!(summary.verified_rows, 119);
        assert_eq!(handle.snapshot().await.processed_numbers, 120);
    }

    #[tokio::test]
    async fn test_processed_is_monotonic_and_bounded() {
        let all = numbers(230);
        let verifier = Arc::new(
            FakeVerifier::new()
                .failing_always(&all[100])
                .failing_once(&all[200]),
        );
        let store = Arc::new(InMemoryRunStateStore::new());
        let handle = RunHandle::new(run_of(230));
        let d = dispatcher(verifier, store, 1);

        // Drive chunk by chunk to observe every intermediate count.
        let mut seen = vec![0usize];
        let of = handle.snapshot().await.chunk_count();
        for index in 0..of {
            let outcome = d.submit(&handle, index, of).await;
            d.settle(&handle, index, of, outcome, true).await;
            seen.push(handle.snapshot().await.processed_numbers);
        }
        d.dispatch(&handle).await;
        seen.push(handle.snapshot().await.processed_numbers);

        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
        assert!(seen.iter().all(|&p| p <= 230));
        assert_eq!(seen.last(), Some(&230));
    }

    #[tokio::test]
    async fn test_paused_gate_blocks_dispatch() {
        let verifier = Arc::new(FakeVerifier::new());
        let store = Arc::new(InMemoryRunStateStore::new());
        let handle = RunHandle::new(run_of(60));
        handle.pause().await;

        let task = {
            let handle = handle.clone();
            let d = dispatcher(verifier.clone(), store, 1);
            tokio::spawn(async move { d.dispatch(&handle).await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(verifier.calls().is_empty());

        handle.resume().await;
        let summary = task.await.unwrap();
        assert_eq!(summary.verified_rows, 60);
        assert_eq!(verifier.call_sizes(), vec![50, 10]);
    }

    #[tokio::test]
    async fn test_resumed_run_continues_from_next_chunk() {
        let verifier = Arc::new(FakeVerifier::new());
        let store = Arc::new(InMemoryRunStateStore::new());
        let all = numbers(120);

        let mut state = run_of(120);
        state.next_chunk = 2;
        state.processed_numbers = 100;
        state.result_rows = all[..100]
            .iter()
            .map(|n| VerifiedRow {
                number: n.clone(),
                e164: format!("+44{}", n),
                line_type: Default::default(),
                carrier: None,
            })
            .collect();
        let handle = RunHandle::new(state);

        dispatcher(verifier.clone(), store, 1)
            .dispatch(&handle)
            .await;

        let calls = verifier.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], all[100..].to_vec());
        let state = handle.snapshot().await;
        assert_eq!(state.result_rows.len(), 120);
        assert_eq!(state.processed_numbers, 120);
    }
}
