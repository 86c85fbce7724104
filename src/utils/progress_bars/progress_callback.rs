// src/utils/progress_bars/progress_callback.rs - Status reporting for verification runs

use log::{debug, error};
use std::sync::{Arc, Mutex};

use crate::errors::PipelineError;
use crate::models::run_models::RunPhase;

/// Type alias for progress callback functions
/// Takes phase text and optional detail information
pub type ProgressCallback = Arc<dyn Fn(String, Option<String>) + Send + Sync>;

/// What the operator sees: the latest phase line plus a separate error banner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub phase: RunPhase,
    pub detail: Option<String>,
    pub error_banner: Option<String>,
}

/// Shared single status area for one run.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_phase(&self, phase: RunPhase, detail: Option<String>) {
        if let Ok(mut status) = self.inner.lock() {
            status.phase = phase;
            status.detail = detail;
        } else {
            debug!("Status board lock poisoned, dropping phase update");
        }
    }

    /// Fatal errors raise the banner; chunk-level failures only leave a detail line.
    pub fn report_error(&self, err: &PipelineError) {
        if let Ok(mut status) = self.inner.lock() {
            if err.is_fatal() {
                error!("❌ {}", err);
                status.error_banner = Some(err.to_string());
                status.phase = RunPhase::Failed;
            } else {
                status.detail = Some(err.to_string());
            }
        }
    }

    pub fn clear_error(&self) {
        if let Ok(mut status) = self.inner.lock() {
            status.error_banner = None;
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner
            .lock()
            .map(|status| status.clone())
            .unwrap_or_default()
    }

    /// A callback that mirrors phase text into the log.
    pub fn callback(&self) -> ProgressCallback {
        let board = self.clone();
        Arc::new(move |phase: String, details: Option<String>| {
            let detail_str = details.as_deref().map(|d| format!(" - {}", d)).unwrap_or_default();
            debug!("[VERIFY] Status: {}{}", phase, detail_str);
            if let Ok(mut status) = board.inner.lock() {
                status.detail = details;
            }
        })
    }
}

/// Helper function to create a simple progress callback that only logs
pub fn create_simple_callback(run_label: &str) -> ProgressCallback {
    let run_label = run_label.to_string();
    Arc::new(move |phase: String, details: Option<String>| {
        let detail_str = details.map(|d| format!(" - {}", d)).unwrap_or_default();
        debug!("[{}] Progress: {}{}", run_label, phase, detail_str);
    })
}

/// Convenience macro for reporting a phase change through an optional callback
#[macro_export]
macro_rules! update_progress {
    ($callback:expr, $phase:expr) => {
        if let Some(ref cb) = $callback {
            cb($phase.to_string(), None);
        }
    };
    ($callback:expr, $phase:expr, $details:expr) => {
        if let Some(ref cb) = $callback {
            cb($phase.to_string(), Some($details.to_string()));
        }
    };
}

/// Convenience macro for reporting counted progress
#[macro_export]
macro_rules! update_detailed_progress {
    ($callback:expr, $phase:expr, $current:expr, $total:expr) => {
        if let Some(ref cb) = $callback {
            let details = format!("{}/{}", $current, $total);
            cb($phase.to_string(), Some(details));
        }
    };
    ($callback:expr, $phase:expr, $current:expr, $total:expr, $extra:expr) => {
        if let Some(ref cb) = $callback {
            let details = format!("{}/{} ({})", $current, $total, $extra);
            cb($phase.to_string(), Some(details));
        }
    };
}
