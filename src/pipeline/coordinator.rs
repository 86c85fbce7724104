// src/pipeline/coordinator.rs
//
// Whole-run orchestration: ingest, stage the original, dispatch under the
// tracker, stage results, finalize. A run is only complete once finalize
// has recorded it; until then its snapshot stays in the identity's slot.

use anyhow::Context;
use bytes::Bytes;
use chrono::Utc;
use indicatif::MultiProgress;
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::dispatch::BatchDispatcher;
use crate::errors::{PipelineError, StagedKind};
use crate::ingestion::{analyze_candidates, normalize_upload};
use crate::models::run_models::{Region, RunPhase, RunState, StagedObject};
use crate::models::upload::{RawUpload, UniqueCandidateSet};
use crate::models::verification::{FinalizeRequest, VerifiedRow};
use crate::services::{HistoryService, ObjectStorage, VerificationService};
use crate::tracking::tracker::{ProgressTracker, TrackerSettings};
use crate::tracking::RunHandle;
use crate::update_progress;
use crate::utils::instantiate_run::create_initial_run_state;
use crate::utils::pipeline_state::{
    clear_run_state, load_any_run, load_resumable_run, save_run_state, RunStateStore,
};
use crate::utils::progress_bars::logging::RunLogger;
use crate::utils::progress_bars::progress_callback::{ProgressCallback, StatusBoard};
use crate::utils::progress_bars::progress_config::ProgressConfig;
use crate::utils::verification_config::VerificationConfig;

/// External collaborators and the snapshot store for one pipeline.
#[derive(Clone)]
pub struct RunServices {
    pub verifier: Arc<dyn VerificationService>,
    pub storage: Arc<dyn ObjectStorage>,
    pub history: Arc<dyn HistoryService>,
    pub store: Arc<dyn RunStateStore>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub region: Region,
    /// Adopt the identity's fresh snapshot instead of starting over.
    pub resume: bool,
}

/// A run that passed ingestion and is ready to execute.
pub struct PreparedRun {
    pub handle: RunHandle,
    pub upload: RawUpload,
    pub candidates: UniqueCandidateSet,
    pub resumed: bool,
    logger: RunLogger,
}

/// What the operator is told when a run finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub total_uploaded: usize,
    pub unique_count: usize,
    pub verified_count: usize,
    pub abandoned_chunks: Vec<usize>,
    pub download_ref: String,
}

impl RunReport {
    fn from_state(state: &RunState, download_ref: String) -> Self {
        Self {
            run_id: state.run_id,
            total_uploaded: state.total_uploaded,
            unique_count: state.total_numbers,
            verified_count: state.verified_count(),
            abandoned_chunks: state.abandoned_chunks.clone(),
            download_ref,
        }
    }
}

pub struct VerificationPipeline {
    config: VerificationConfig,
    progress: ProgressConfig,
    services: RunServices,
    status: StatusBoard,
    progress_callback: Option<ProgressCallback>,
}

impl VerificationPipeline {
    pub fn new(config: VerificationConfig, progress: ProgressConfig, services: RunServices) -> Self {
        Self {
            config,
            progress,
            services,
            status: StatusBoard::new(),
            progress_callback: None,
        }
    }

    /// Receives phase changes and chunk counts in place of the status board.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    /// Ingestion and run setup. Nothing touches the network here.
    pub fn prepare(&self, upload: RawUpload, options: RunOptions) -> Result<PreparedRun, PipelineError> {
        let result = self.prepare_inner(upload, options);
        if let Err(e) = &result {
            self.status.report_error(e);
        }
        result
    }

    fn prepare_inner(&self, upload: RawUpload, options: RunOptions) -> Result<PreparedRun, PipelineError> {
        let identity = self.config.require_identity()?.to_string();

        let candidate_list = normalize_upload(&upload)?;
        let candidates = analyze_candidates(&candidate_list, self.config.avg_latency_ms);
        let digest = upload.digest();
        let now = Utc::now();

        let adopted = if options.resume {
            let Some(mut saved) = load_resumable_run(
                self.services.store.as_ref(),
                &identity,
                now,
                self.config.snapshot_ttl_secs,
            )?
            else {
                return Err(PipelineError::NoResumableRun);
            };
            if saved.file_digest != digest {
                return Err(PipelineError::ResumeMismatch);
            }
            // Keep the recorded clock; only close an open pause interval.
            saved.resume(now);
            Some(saved)
        } else {
            None
        };

        let resumed = adopted.is_some();
        let state = match adopted {
            Some(state) => state,
            None => {
                let mut state = create_initial_run_state(
                    &identity,
                    &upload.file_name,
                    &digest,
                    options.region,
                    candidates.total_count(),
                    candidates.unique().to_vec(),
                    self.config.avg_latency_ms,
                    now,
                );
                state.batch_size = self.config.batch_size;
                state
            }
        };

        // Last writer wins: a new run replaces whatever the slot held.
        save_run_state(self.services.store.as_ref(), &state, now)?;

        let logger = RunLogger::new(state.run_id);
        Ok(PreparedRun {
            handle: RunHandle::new(state),
            upload,
            candidates,
            resumed,
            logger,
        })
    }

    /// Convenience for callers that do not need the handle while running.
    pub async fn run(
        &self,
        upload: RawUpload,
        options: RunOptions,
        multi: Option<&MultiProgress>,
    ) -> Result<RunReport, PipelineError> {
        let prepared = self.prepare(upload, options)?;
        self.execute(prepared, multi).await
    }

    pub async fn execute(
        &self,
        prepared: PreparedRun,
        multi: Option<&MultiProgress>,
    ) -> Result<RunReport, PipelineError> {
        let result = self.execute_inner(&prepared, multi).await;
        if let Err(e) = &result {
            self.status.report_error(e);
            let mut state = prepared.handle.state().lock().await;
            if e.is_fatal() {
                state.phase = RunPhase::Failed;
            }
        }
        result
    }

    async fn execute_inner(
        &self,
        prepared: &PreparedRun,
        multi: Option<&MultiProgress>,
    ) -> Result<RunReport, PipelineError> {
        let PreparedRun {
            handle,
            upload,
            resumed,
            logger,
            ..
        } = prepared;

        logger.log_start(&handle.snapshot().await, *resumed);

        // Phase 1: stage the original upload for audit.
        let already_staged = handle.state().lock().await.staged_original.is_some();
        if already_staged {
            logger.log_phase("Stage original", Some("already staged, skipping"));
        } else {
            self.enter_phase(handle, logger, RunPhase::UploadingOriginal).await;
            let staged = match self
                .stage(&upload.file_name, upload.bytes.clone(), upload.content_type())
                .await
            {
                Ok(staged) => staged,
                Err(e) => {
                    // Nothing was verified; there is nothing worth resuming.
                    let identity = handle.state().lock().await.identity.clone();
                    if let Err(clear_err) = clear_run_state(self.services.store.as_ref(), &identity) {
                        warn!("[VERIFY] {:#}", clear_err);
                    }
                    return Err(PipelineError::StagingFailed {
                        object: StagedKind::Original,
                        reason: format!("{:#}", e),
                    });
                }
            };
            logger.log_staged("original upload", &staged.public_url);
            let mut state = handle.state().lock().await;
            state.staged_original = Some(staged);
            self.persist(&state);
        }

        // Phase 2: dispatch with the display clock running alongside.
        let bar = self.progress.create_run_bar(multi);
        let tracker = ProgressTracker::start(
            handle.clone(),
            self.services.store.clone(),
            TrackerSettings {
                avg_latency_ms: self.config.avg_latency_ms,
                interval: self.config.tick_interval(),
                progress: self.progress.clone(),
                bar: bar.clone(),
            },
        );
        let dispatcher = BatchDispatcher::new(
            self.services.verifier.clone(),
            self.services.store.clone(),
            logger.clone(),
            self.status.clone(),
            self.config.chunk_retry_limit,
        )
        .with_progress_callback(
            self.progress_callback
                .clone()
                .unwrap_or_else(|| self.status.callback()),
        );
        let summary = dispatcher.dispatch(handle).await;
        tracker.stop().await;

        if let Some(pb) = &bar {
            let state = handle.snapshot().await;
            self.progress.render(pb, &state);
            pb.finish_with_message(format!(
                "{} rows verified from {} batches",
                summary.verified_rows, summary.chunks
            ));
        }

        // Phases 3 and 4.
        self.finish(handle, logger).await
    }

    /// Re-runs results staging and finalize for a run that finished
    /// verifying but was never recorded. Freshness does not apply.
    pub async fn retry_finalize(&self) -> Result<RunReport, PipelineError> {
        let identity = self.config.require_identity()?.to_string();
        let state = load_any_run(self.services.store.as_ref(), &identity)?
            .ok_or(PipelineError::NoResumableRun)?;

        if let Some(download_ref) = state.download_ref.clone() {
            info!("[VERIFY] Run {} was already finalized", state.run_id);
            if let Err(e) = clear_run_state(self.services.store.as_ref(), &identity) {
                warn!("[VERIFY] Failed to clear finalized run {}: {:#}", state.run_id, e);
            }
            return Ok(RunReport::from_state(&state, download_ref));
        }

        if !state.dispatch_finished() || state.processed_numbers < state.total_numbers {
            return Err(anyhow::anyhow!(
                "run {} stopped at {}/{} numbers; resume it with --resume instead",
                state.run_id,
                state.processed_numbers,
                state.total_numbers
            )
            .into());
        }
        if state.staged_original.is_none() {
            return Err(anyhow::anyhow!("run {} has no staged original upload", state.run_id).into());
        }

        info!(
            "[VERIFY] 🔁 Retrying finalize for run {} ({} verified rows)",
            state.run_id,
            state.verified_count()
        );
        let logger = RunLogger::new(state.run_id);
        let handle = RunHandle::new(state);
        let result = self.finish(&handle, &logger).await;
        if let Err(e) = &result {
            self.status.report_error(e);
        }
        result
    }

    async fn finish(&self, handle: &RunHandle, logger: &RunLogger) -> Result<RunReport, PipelineError> {
        // Stage results, unless an earlier attempt already did.
        let staged_results = handle.state().lock().await.staged_results.clone();
        let staged_results = match staged_results {
            Some(staged) => {
                logger.log_phase("Stage results", Some("already staged, skipping"));
                staged
            }
            None => {
                self.enter_phase(handle, logger, RunPhase::UploadingResults).await;
                let rows = handle.state().lock().await.result_rows.clone();
                let body = rows_to_csv(&rows)?;
                let file_name = results_file_name();
                let staged = self
                    .stage(&file_name, Bytes::from(body), "text/csv")
                    .await
                    .map_err(|e| PipelineError::StagingFailed {
                        object: StagedKind::Results,
                        reason: format!("{:#}", e),
                    })?;
                logger.log_staged("verified results", &staged.public_url);
                let mut state = handle.state().lock().await;
                state.staged_results = Some(staged.clone());
                self.persist(&state);
                staged
            }
        };

        self.enter_phase(handle, logger, RunPhase::Finalizing).await;
        let request = {
            let state = handle.state().lock().await;
            let original = state
                .staged_original
                .as_ref()
                .map(|s| s.public_url.clone())
                .unwrap_or_default();
            FinalizeRequest {
                user_id: state.identity.clone(),
                unverified_file_path: original,
                verified_file_path: staged_results.public_url.clone(),
                verified_count: state.verified_count(),
                total_uploaded: state.total_uploaded,
                unique_count: state.total_numbers,
            }
        };
        if request.verified_count < request.unique_count {
            warn!(
                "[VERIFY] ⚠️ Finalizing with {} of {} unique numbers verified",
                request.verified_count, request.unique_count
            );
        }

        let response = self
            .services
            .history
            .finalize(&request)
            .await
            .map_err(|e| PipelineError::FinalizeFailed {
                reason: format!("{:#}", e),
            })?;
        let download_ref = response
            .download_ref
            .unwrap_or_else(|| staged_results.public_url.clone());

        let report = {
            let mut state = handle.state().lock().await;
            state.download_ref = Some(download_ref.clone());
            state.phase = RunPhase::Complete;
            state.is_uploading = false;
            if let Err(e) = clear_run_state(self.services.store.as_ref(), &state.identity) {
                warn!("[VERIFY] Run {} is recorded but its snapshot remains: {:#}", state.run_id, e);
                // Keeps the download reference so a finalize retry does not record it twice.
                self.persist(&state);
            }
            logger.log_summary(&state);
            RunReport::from_state(&state, download_ref)
        };
        self.status.set_phase(RunPhase::Complete, Some(report.download_ref.clone()));
        self.status.clear_error();
        Ok(report)
    }

    async fn enter_phase(&self, handle: &RunHandle, logger: &RunLogger, phase: RunPhase) {
        logger.log_phase(&phase.to_string(), None);
        update_progress!(self.progress_callback, phase);
        self.status.set_phase(phase.clone(), None);
        let mut state = handle.state().lock().await;
        state.phase = phase;
        self.persist(&state);
    }

    async fn stage(&self, file_name: &str, body: Bytes, content_type: &str) -> anyhow::Result<StagedObject> {
        let target = self
            .services
            .storage
            .get_upload_url(file_name)
            .await
            .with_context(|| format!("Failed to get upload URL for {}", file_name))?;
        self.services
            .storage
            .put_object(&target.upload_url, body, content_type)
            .await
            .with_context(|| format!("Failed to upload {}", file_name))?;
        Ok(StagedObject {
            file_name: file_name.to_string(),
            public_url: target.public_url,
        })
    }

    fn persist(&self, state: &RunState) {
        if let Err(e) = save_run_state(self.services.store.as_ref(), state, Utc::now()) {
            warn!("[VERIFY] Failed to persist run snapshot: {:#}", e);
        }
    }
}

/// Serializes verified rows as CSV with a header line.
pub fn rows_to_csv(rows: &[VerifiedRow]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(["number", "e164", "type", "carrier"])
        .context("Failed to write CSV header")?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row for {}", row.number))?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e))
}

fn results_file_name() -> String {
    format!("verified-{}.csv", Utc::now().format("%Y%m%d-%H%M%S%3f"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{FakeHistory, FakeStorage, FakeVerifier};
    use crate::utils::pipeline_state::{InMemoryRunStateStore, PersistedRun};
    use std::time::Duration;

    struct Fixture {
        verifier: Arc<FakeVerifier>,
        storage: Arc<FakeStorage>,
        history: Arc<FakeHistory>,
        store: Arc<InMemoryRunStateStore>,
    }

    impl Fixture {
        fn new(verifier: FakeVerifier, storage: FakeStorage, history: FakeHistory) -> Self {
            Self {
                verifier: Arc::new(verifier),
                storage: Arc::new(storage),
                history: Arc::new(history),
                store: Arc::new(InMemoryRunStateStore::new()),
            }
        }

        fn pipeline(&self) -> VerificationPipeline {
            self.pipeline_with_store(self.store.clone())
        }

        fn pipeline_with_store(&self, store: Arc<dyn RunStateStore>) -> VerificationPipeline {
            let config = VerificationConfig {
                user_id: Some("u1".to_string()),
                tick_interval_ms: 5,
                ..VerificationConfig::default()
            };
            let progress = ProgressConfig {
                enabled: false,
                ..ProgressConfig::default()
            };
            VerificationPipeline::new(
                config,
                progress,
                RunServices {
                    verifier: self.verifier.clone(),
                    storage: self.storage.clone(),
                    history: self.history.clone(),
                    store,
                },
            )
        }
    }

    /// Snapshot store whose slot can never be cleared.
    #[derive(Default)]
    struct StickyStore {
        inner: InMemoryRunStateStore,
    }

    impl RunStateStore for StickyStore {
        fn get(&self, identity: &str) -> anyhow::Result<Option<PersistedRun>> {
            self.inner.get(identity)
        }

        fn set(&self, identity: &str, snapshot: &PersistedRun) -> anyhow::Result<()> {
            self.inner.set(identity, snapshot)
        }

        fn clear(&self, _identity: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("permission denied"))
        }
    }

    fn numbers(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("55500{:05}", i)).collect()
    }

    /// 120 unique numbers plus 5 repeats under a header line.
    fn upload_of(n: usize) -> RawUpload {
        let all = numbers(n);
        let mut text = String::from("Phone Number\n");
        for number in &all {
            text.push_str(number);
            text.push('\n');
        }
        for number in all.iter().take(5) {
            text.push_str(number);
            text.push('\n');
        }
        RawUpload::new("leads.csv", text.into_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_full_run_stages_verifies_and_finalizes() {
        let fx = Fixture::new(FakeVerifier::new(), FakeStorage::new(), FakeHistory::new());
        let pipeline = fx.pipeline();

        let report = pipeline
            .run(upload_of(120), RunOptions::default(), None)
            .await
            .unwrap();

        assert_eq!(report.total_uploaded, 125);
        assert_eq!(report.unique_count, 120);
        assert_eq!(report.verified_count, 120);
        assert!(report.download_ref.starts_with("https://files.test/verified-"));
        assert_eq!(fx.verifier.call_sizes(), vec![50, 50, 20]);

        let puts = fx.storage.puts();
        assert_eq!(puts.len(), 2);
        assert!(puts[0].upload_url.starts_with("https://upload.test/leads.csv"));
        assert_eq!(puts[0].content_type, "text/csv");
        let csv_text = String::from_utf8(puts[1].body.to_vec()).unwrap();
        assert!(csv_text.starts_with("number,e164,type,carrier\n"));
        assert_eq!(csv_text.lines().count(), 121);

        let finalized = fx.history.finalized();
        assert_eq!(finalized.len(), 1);
        assert_eq!(finalized[0].unverified_file_path, "https://files.test/leads.csv");
        assert_eq!(finalized[0].total_uploaded, 125);

        // Completed runs leave no snapshot behind.
        assert!(load_any_run(fx.store.as_ref(), "u1").unwrap().is_none());
        assert_eq!(pipeline.status().snapshot().phase, RunPhase::Complete);
    }

    #[tokio::test]
    async fn test_uncleared_snapshot_does_not_finalize_twice() {
        let fx = Fixture::new(FakeVerifier::new(), FakeStorage::new(), FakeHistory::new());
        let store = Arc::new(StickyStore::default());
        let pipeline = fx.pipeline_with_store(store.clone());

        let report = pipeline
            .run(upload_of(60), RunOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(fx.history.finalized().len(), 1);

        let saved = load_any_run(store.as_ref(), "u1").unwrap().unwrap();
        assert_eq!(saved.download_ref.as_deref(), Some(report.download_ref.as_str()));
        assert!(!saved.is_uploading);

        let retried = pipeline.retry_finalize().await.unwrap();
        assert_eq!(retried.download_ref, report.download_ref);
        assert_eq!(retried.verified_count, 60);
        assert_eq!(fx.history.finalized().len(), 1);
        assert_eq!(fx.storage.puts().len(), 2);
    }

    #[tokio::test]
    async fn test_original_staging_failure_aborts_before_verification() {
        let fx = Fixture::new(
            FakeVerifier::new(),
            FakeStorage::new().failing_for("leads"),
            FakeHistory::new(),
        );
        let pipeline = fx.pipeline();

        let err = pipeline
            .run(upload_of(10), RunOptions::default(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::StagingFailed {
                object: StagedKind::Original,
                ..
            }
        ));
        assert!(fx.verifier.calls().is_empty());
        assert!(fx.history.finalized().is_empty());
        assert!(pipeline.status().snapshot().error_banner.is_some());
    }

    #[tokio::test]
    async fn test_partial_failure_still_finalizes() {
        let all = numbers(120);
        let fx = Fixture::new(
            FakeVerifier::new().failing_always(&all[50]),
            FakeStorage::new(),
            FakeHistory::new(),
        );

        let report = fx
            .pipeline()
            .run(upload_of(120), RunOptions::default(), None)
            .await
            .unwrap();

        assert_eq!(report.verified_count, 70);
        assert_eq!(report.abandoned_chunks, vec![1]);
        let finalized = fx.history.finalized();
        assert_eq!(finalized[0].verified_count, 70);
        assert!(finalized[0].verified_count < finalized[0].total_uploaded);
    }

    #[tokio::test]
    async fn test_finalize_failure_keeps_rows_for_retry() {
        let fx = Fixture::new(
            FakeVerifier::new(),
            FakeStorage::new(),
            FakeHistory::new().failing_times(1),
        );
        let pipeline = fx.pipeline();

        let err = pipeline
            .run(upload_of(60), RunOptions::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::FinalizeFailed { .. }));
        assert!(err.is_finalize_retryable());

        let saved = load_any_run(fx.store.as_ref(), "u1").unwrap().unwrap();
        assert_eq!(saved.result_rows.len(), 60);
        assert!(saved.staged_results.is_some());

        let report = pipeline.retry_finalize().await.unwrap();
        assert_eq!(report.verified_count, 60);
        // Results were staged once; the retry only re-ran finalize.
        assert_eq!(fx.storage.puts().len(), 2);
        assert_eq!(fx.verifier.calls().len(), 2);
        assert!(load_any_run(fx.store.as_ref(), "u1").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_identity_never_starts() {
        let fx = Fixture::new(FakeVerifier::new(), FakeStorage::new(), FakeHistory::new());
        let pipeline = VerificationPipeline::new(
            VerificationConfig::default(),
            ProgressConfig::default(),
            RunServices {
                verifier: fx.verifier.clone(),
                storage: fx.storage.clone(),
                history: fx.history.clone(),
                store: fx.store.clone(),
            },
        );
        let err = pipeline
            .run(upload_of(10), RunOptions::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotAuthenticated));
        assert!(fx.storage.puts().is_empty());
    }

    #[tokio::test]
    async fn test_header_only_upload_has_no_candidates() {
        let fx = Fixture::new(FakeVerifier::new(), FakeStorage::new(), FakeHistory::new());
        let upload = RawUpload::new("empty.csv", &b"Phone Number\n"[..]).unwrap();
        let err = fx
            .pipeline()
            .run(upload, RunOptions::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoCandidatesFound));
        assert!(fx.storage.puts().is_empty());
    }

    #[tokio::test]
    async fn test_resume_continues_interrupted_run() {
        let fx = Fixture::new(FakeVerifier::new(), FakeStorage::new(), FakeHistory::new());
        let pipeline = fx.pipeline();

        // Simulate a run that staged its original and settled one chunk.
        let prepared = pipeline.prepare(upload_of(120), RunOptions::default()).unwrap();
        {
            let mut state = prepared.handle.state().lock().await;
            state.staged_original = Some(StagedObject {
                file_name: "leads.csv".to_string(),
                public_url: "https://files.test/leads.csv".to_string(),
            });
            state.next_chunk = 1;
            state.processed_numbers = 50;
            save_run_state(fx.store.as_ref(), &state, Utc::now()).unwrap();
        }
        let first_id = prepared.handle.snapshot().await.run_id;
        drop(prepared);

        let options = RunOptions {
            resume: true,
            ..RunOptions::default()
        };
        let resumed = pipeline.prepare(upload_of(120), options).unwrap();
        assert!(resumed.resumed);
        assert_eq!(resumed.handle.snapshot().await.run_id, first_id);

        let report = pipeline.execute(resumed, None).await.unwrap();
        assert_eq!(fx.verifier.call_sizes(), vec![50, 20]);
        // Only the results file was uploaded on the resumed pass.
        assert_eq!(fx.storage.puts().len(), 1);
        assert_eq!(report.run_id, first_id);
    }

    #[tokio::test]
    async fn test_resume_refuses_different_file() {
        let fx = Fixture::new(FakeVerifier::new(), FakeStorage::new(), FakeHistory::new());
        let pipeline = fx.pipeline();
        pipeline.prepare(upload_of(120), RunOptions::default()).unwrap();

        let options = RunOptions {
            resume: true,
            ..RunOptions::default()
        };
        let err = pipeline.prepare(upload_of(121), options).err().unwrap();
        assert!(matches!(err, PipelineError::ResumeMismatch));
    }

    #[tokio::test]
    async fn test_pause_during_run_holds_dispatch() {
        let fx = Fixture::new(FakeVerifier::new(), FakeStorage::new(), FakeHistory::new());
        let pipeline = Arc::new(fx.pipeline());

        let prepared = pipeline.prepare(upload_of(120), RunOptions::default()).unwrap();
        let handle = prepared.handle.clone();
        handle.pause().await;

        let task = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.execute(prepared, None).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(fx.verifier.calls().is_empty());
        assert!(handle.snapshot().await.is_paused);

        handle.resume().await;
        let report = task.await.unwrap().unwrap();
        assert_eq!(report.verified_count, 120);
        assert!(handle.snapshot().await.accumulated_pause_ms >= 25);
    }

    #[test]
    fn test_rows_to_csv_without_rows_has_header() {
        let body = rows_to_csv(&[]).unwrap();
        assert_eq!(String::from_utf8(body).unwrap(), "number,e164,type,carrier\n");
    }
}
