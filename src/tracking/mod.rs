pub mod pause;
pub mod tracker;

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::run_models::RunState;
use crate::utils::pipeline_state::{save_run_state, RunStateStore};
use pause::PauseGate;

/// Shared handle on the active run: the state both background tasks write to
/// and the gate the dispatcher parks on while paused.
#[derive(Debug, Clone)]
pub struct RunHandle {
    state: Arc<Mutex<RunState>>,
    gate: PauseGate,
    writer: Arc<Mutex<()>>,
}

impl RunHandle {
    pub fn new(state: RunState) -> Self {
        let gate = PauseGate::new(state.is_paused);
        Self {
            state: Arc::new(Mutex::new(state)),
            gate,
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn state(&self) -> &Arc<Mutex<RunState>> {
        &self.state
    }

    pub fn gate(&self) -> &PauseGate {
        &self.gate
    }

    pub async fn snapshot(&self) -> RunState {
        self.state.lock().await.clone()
    }

    /// Copies the state and writes it to `store` on the blocking pool.
    /// Writers queue on their own lock, so snapshots land in the order they
    /// were taken and the state lock is never held across file I/O.
    pub async fn persist(&self, store: &Arc<dyn RunStateStore>) -> Result<RunState> {
        let _writer = self.writer.lock().await;
        let snapshot = self.snapshot().await;
        let store = store.clone();
        let now = Utc::now();
        tokio::task::spawn_blocking(move || {
            save_run_state(store.as_ref(), &snapshot, now).map(|()| snapshot)
        })
        .await
        .context("Snapshot writer task failed")?
    }

    pub async fn pause(&self) {
        let mut state = self.state.lock().await;
        state.pause(Utc::now());
        self.gate.pause();
        info!("[VERIFY] ⏸ Run {} paused", state.run_id);
    }

    pub async fn resume(&self) {
        let mut state = self.state.lock().await;
        state.resume(Utc::now());
        self.gate.resume();
        info!(
            "[VERIFY] ▶️ Run {} resumed ({}ms paused in total)",
            state.run_id, state.accumulated_pause_ms
        );
    }
}
