// src/utils/constants.rs

/// Number of unique candidates submitted to the verification service per call.
pub const BATCH_SIZE: usize = 50;

/// Expected per-item latency of the verification service, in milliseconds.
/// Drives both the up-front time estimate and the display projection.
pub const AVG_LATENCY_MS: f64 = 77.8;

/// How often the progress tracker recomputes and persists the run snapshot.
pub const TRACKER_TICK_INTERVAL_MS: u64 = 500;

/// Snapshots older than this are treated as expired on load.
pub const SNAPSHOT_TTL_SECS: i64 = 60 * 60;

/// The display estimate never reaches 100% on its own.
pub const DISPLAY_PROGRESS_CAP: f64 = 98.0;

/// Minimum length of a retained candidate token.
pub const MIN_CANDIDATE_LEN: usize = 8;

/// Extra attempts granted to a failed chunk after the first pass.
pub const DEFAULT_CHUNK_RETRY_LIMIT: usize = 1;

/// Storage key prefix for per-identity run snapshots.
pub const SNAPSHOT_KEY_PREFIX: &str = "upload_progress_";
