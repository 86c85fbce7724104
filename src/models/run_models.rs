// src/models/run_models.rs
use crate::models::verification::VerifiedRow;
use crate::utils::constants::DISPLAY_PROGRESS_CAP;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Target region; its dialing prefix accompanies every verify-batch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Region {
    #[default]
    Usa,
    Uk,
    Australia,
    India,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Usa, Region::Uk, Region::Australia, Region::India];

    pub fn label(&self) -> &'static str {
        match self {
            Region::Usa => "USA",
            Region::Uk => "UK",
            Region::Australia => "Australia",
            Region::India => "India",
        }
    }

    pub fn dialing_prefix(&self) -> &'static str {
        match self {
            Region::Usa => "+1",
            Region::Uk => "+44",
            Region::Australia => "+61",
            Region::India => "+91",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.dialing_prefix())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Region::ALL
            .iter()
            .find(|r| r.label().eq_ignore_ascii_case(wanted) || r.dialing_prefix() == wanted)
            .copied()
            .ok_or_else(|| {
                let known: Vec<&str> = Region::ALL.iter().map(|r| r.label()).collect();
                format!("unknown region '{}', expected one of {}", wanted, known.join(", "))
            })
    }
}

/// The single status line shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    UploadingOriginal,
    Verifying { batch: usize, of: usize },
    UploadingResults,
    Finalizing,
    Complete,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "ready"),
            RunPhase::UploadingOriginal => write!(f, "uploading original…"),
            RunPhase::Verifying { batch, of } => write!(f, "verifying batch {} of {}…", batch, of),
            RunPhase::UploadingResults => write!(f, "uploading results…"),
            RunPhase::Finalizing => write!(f, "finalizing…"),
            RunPhase::Complete => write!(f, "complete"),
            RunPhase::Failed => write!(f, "failed"),
        }
    }
}

/// A file written to object storage ahead of finalize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedObject {
    pub file_name: String,
    pub public_url: String,
}

/// Mutable, persistable record of one verification run.
///
/// Two clocks feed the published progress: the tracker's time-based
/// projection (`displayed_progress`, `projected_*`) and the dispatcher's
/// chunk-settled counts (`confirmed_progress`, `processed_numbers`,
/// `live_remaining_ms`). [`RunState::publish`] reconciles them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub identity: String,
    pub file_name: String,
    pub file_digest: String,
    pub region: Region,

    pub total_uploaded: usize,
    pub total_numbers: usize,
    pub processed_numbers: usize,
    pub projected_processed: usize,

    pub displayed_progress: f64,
    pub confirmed_progress: Option<f64>,
    pub progress_percent: f64,

    pub estimated_total_ms: u64,
    pub projected_remaining_ms: u64,
    pub live_remaining_ms: Option<u64>,
    pub time_remaining_ms: u64,

    pub start_timestamp: DateTime<Utc>,
    pub accumulated_pause_ms: i64,
    pub pause_started_at: Option<DateTime<Utc>>,

    pub is_uploading: bool,
    pub is_paused: bool,
    pub phase: RunPhase,

    /// Unique candidates in dispatch order.
    pub candidates: Vec<String>,
    pub batch_size: usize,
    /// First chunk of the initial pass that has not been submitted yet.
    pub next_chunk: usize,
    /// Chunks that failed and are waiting for a retry pass.
    pub failed_chunks: Vec<usize>,
    /// Retry passes over `failed_chunks` already completed.
    #[serde(default)]
    pub retry_rounds_done: usize,
    /// Chunks given up on after their last attempt.
    pub abandoned_chunks: Vec<usize>,
    pub result_rows: Vec<VerifiedRow>,

    pub staged_original: Option<StagedObject>,
    pub staged_results: Option<StagedObject>,
    pub download_ref: Option<String>,
}

impl RunState {
    pub fn chunk_count(&self) -> usize {
        if self.batch_size == 0 {
            return 0;
        }
        self.candidates.len().div_ceil(self.batch_size)
    }

    /// Candidates belonging to chunk `index` (0-based).
    pub fn chunk(&self, index: usize) -> &[String] {
        let start = (index * self.batch_size).min(self.candidates.len());
        let end = (start + self.batch_size).min(self.candidates.len());
        &self.candidates[start..end]
    }

    pub fn verified_count(&self) -> usize {
        self.result_rows.len()
    }

    pub fn is_complete(&self) -> bool {
        self.phase == RunPhase::Complete
    }

    /// True once every chunk has been settled.
    pub fn dispatch_finished(&self) -> bool {
        self.next_chunk >= self.chunk_count() && self.failed_chunks.is_empty()
    }

    /// Wall-clock time spent running since start, excluding paused intervals.
    pub fn active_elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        let mut paused = self.accumulated_pause_ms;
        if let Some(pause_start) = self.pause_started_at {
            paused += (now - pause_start).num_milliseconds().max(0);
        }
        ((now - self.start_timestamp).num_milliseconds() - paused).max(0)
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.is_paused {
            return;
        }
        self.is_paused = true;
        self.pause_started_at = Some(now);
    }

    pub fn resume(&mut self, now: DateTime<Utc>) {
        if !self.is_paused {
            return;
        }
        if let Some(pause_start) = self.pause_started_at.take() {
            self.accumulated_pause_ms += (now - pause_start).num_milliseconds().max(0);
        }
        self.is_paused = false;
    }

    /// Recomputes the published fields. Once a chunk has settled the
    /// confirmed clock wins; the display estimate only fills the gap up to
    /// the next chunk boundary.
    pub fn publish(&mut self) {
        match self.confirmed_progress {
            Some(confirmed) => {
                let ceiling = self.next_boundary_percent().max(confirmed);
                self.progress_percent = self.displayed_progress.clamp(confirmed, ceiling);
                self.time_remaining_ms = self
                    .live_remaining_ms
                    .unwrap_or(self.projected_remaining_ms);
            }
            None => {
                self.progress_percent = self.displayed_progress;
                self.time_remaining_ms = self.projected_remaining_ms;
            }
        }
    }

    /// Percentage reached once the chunk after `processed_numbers` settles.
    fn next_boundary_percent(&self) -> f64 {
        if self.total_numbers == 0 {
            return 0.0;
        }
        let next = (self.processed_numbers + self.batch_size).min(self.total_numbers);
        (next as f64 / self.total_numbers as f64 * 100.0).min(DISPLAY_PROGRESS_CAP)
    }
}
