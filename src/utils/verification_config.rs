// src/utils/verification_config.rs

use crate::errors::PipelineError;
use crate::utils::constants::{
    AVG_LATENCY_MS, BATCH_SIZE, DEFAULT_CHUNK_RETRY_LIMIT, SNAPSHOT_TTL_SECS,
    TRACKER_TICK_INTERVAL_MS,
};
use log::{debug, info};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for a verification run
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// Base URL shared by the verification, storage and history services
    pub api_base_url: String,
    /// Identity the run belongs to; `None` means nobody is signed in
    pub user_id: Option<String>,
    /// Candidates per verify-batch call
    pub batch_size: usize,
    /// Expected per-item service latency in milliseconds
    pub avg_latency_ms: f64,
    /// Progress tracker tick interval in milliseconds
    pub tick_interval_ms: u64,
    /// Freshness window for persisted snapshots, in seconds
    pub snapshot_ttl_secs: i64,
    /// Extra attempts for a failed chunk after the first pass
    pub chunk_retry_limit: usize,
    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,
    /// Directory holding per-identity snapshot files
    pub state_dir: PathBuf,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            user_id: None,
            batch_size: BATCH_SIZE,
            avg_latency_ms: AVG_LATENCY_MS,
            tick_interval_ms: TRACKER_TICK_INTERVAL_MS,
            snapshot_ttl_secs: SNAPSHOT_TTL_SECS,
            chunk_retry_limit: DEFAULT_CHUNK_RETRY_LIMIT,
            request_timeout_secs: 60,
            state_dir: PathBuf::from(".verification_state"),
        }
    }
}

impl VerificationConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            api_base_url: env::var("VERIFY_API_URL").unwrap_or(defaults.api_base_url),
            user_id: env::var("VERIFY_USER_ID")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            batch_size: env::var("VERIFY_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.batch_size),
            avg_latency_ms: env::var("VERIFY_AVG_LATENCY_MS")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| *v > 0.0)
                .unwrap_or(defaults.avg_latency_ms),
            tick_interval_ms: env::var("VERIFY_TICK_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.tick_interval_ms),
            snapshot_ttl_secs: env::var("VERIFY_SNAPSHOT_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.snapshot_ttl_secs),
            chunk_retry_limit: env::var("VERIFY_CHUNK_RETRY_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.chunk_retry_limit),
            request_timeout_secs: env::var("VERIFY_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
            state_dir: env::var("VERIFY_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
        };
        debug!("Verification config loaded: {:?}", config);
        config
    }

    /// Returns the signed-in identity or fails the run before it starts.
    pub fn require_identity(&self) -> Result<&str, PipelineError> {
        self.user_id.as_deref().ok_or(PipelineError::NotAuthenticated)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn log_config(&self) {
        info!("🔧 Verification service: {}", self.api_base_url);
        info!(
            "   Batch size: {}, avg latency: {:.1}ms, chunk retries: {}",
            self.batch_size, self.avg_latency_ms, self.chunk_retry_limit
        );
        info!(
            "   Snapshot dir: {} (expires after {}s)",
            self.state_dir.display(),
            self.snapshot_ttl_secs
        );
    }
}
