// src/utils/pipeline_state.rs
//
// Per-identity run snapshots. One slot per identity; a new run overwrites the
// previous one (last writer wins). Freshness is checked when a snapshot is
// read, expired snapshots are cleared lazily at that point.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::models::run_models::RunState;
use crate::utils::constants::SNAPSHOT_KEY_PREFIX;

/// A run snapshot plus the wall-clock time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRun {
    pub saved_at: DateTime<Utc>,
    pub state: RunState,
}

/// Key-value slot store for run snapshots, keyed by identity.
pub trait RunStateStore: Send + Sync {
    fn get(&self, identity: &str) -> Result<Option<PersistedRun>>;
    fn set(&self, identity: &str, snapshot: &PersistedRun) -> Result<()>;
    fn clear(&self, identity: &str) -> Result<()>;
}

/// Storage key for an identity's snapshot slot.
pub fn snapshot_key(identity: &str) -> String {
    let safe: String = identity
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}{}", SNAPSHOT_KEY_PREFIX, safe)
}

/// Whether a snapshot may be adopted by a restarted run.
pub fn is_resumable(snapshot: &PersistedRun, now: DateTime<Utc>, ttl_secs: i64) -> bool {
    let fresh = now - snapshot.saved_at < Duration::seconds(ttl_secs);
    fresh && snapshot.state.is_uploading && snapshot.state.progress_percent < 100.0
}

pub fn save_run_state(store: &dyn RunStateStore, state: &RunState, now: DateTime<Utc>) -> Result<()> {
    let snapshot = PersistedRun {
        saved_at: now,
        state: state.clone(),
    };
    store
        .set(&state.identity, &snapshot)
        .with_context(|| format!("Failed to persist run {} snapshot", state.run_id))
}

/// Returns the identity's snapshot if it is fresh and still in progress.
/// Expired snapshots are cleared; completed ones are left for finalize retries.
pub fn load_resumable_run(
    store: &dyn RunStateStore,
    identity: &str,
    now: DateTime<Utc>,
    ttl_secs: i64,
) -> Result<Option<RunState>> {
    let Some(snapshot) = store.get(identity)? else {
        debug!("No saved run for {}", identity);
        return Ok(None);
    };

    let age = now - snapshot.saved_at;
    if age >= Duration::seconds(ttl_secs) {
        info!(
            "Saved run {} for {} expired ({}s old), discarding",
            snapshot.state.run_id,
            identity,
            age.num_seconds()
        );
        store.clear(identity)?;
        return Ok(None);
    }

    if !is_resumable(&snapshot, now, ttl_secs) {
        debug!(
            "Saved run {} is not resumable (uploading={}, progress={:.1}%)",
            snapshot.state.run_id, snapshot.state.is_uploading, snapshot.state.progress_percent
        );
        return Ok(None);
    }

    Ok(Some(snapshot.state))
}

/// Returns the identity's snapshot without applying the freshness rule.
pub fn load_any_run(store: &dyn RunStateStore, identity: &str) -> Result<Option<RunState>> {
    Ok(store.get(identity)?.map(|snapshot| snapshot.state))
}

pub fn clear_run_state(store: &dyn RunStateStore, identity: &str) -> Result<()> {
    store
        .clear(identity)
        .with_context(|| format!("Failed to clear saved run for {}", identity))
}

/// Snapshot store held in memory; used under test and for one-shot runs.
#[derive(Debug, Default)]
pub struct InMemoryRunStateStore {
    slots: RwLock<HashMap<String, PersistedRun>>,
}

impl InMemoryRunStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStateStore for InMemoryRunStateStore {
    fn get(&self, identity: &str) -> Result<Option<PersistedRun>> {
        let slots = self
            .slots
            .read()
            .map_err(|_| anyhow!("run state store lock poisoned"))?;
        Ok(slots.get(&snapshot_key(identity)).cloned())
    }

    fn set(&self, identity: &str, snapshot: &PersistedRun) -> Result<()> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| anyhow!("run state store lock poisoned"))?;
        slots.insert(snapshot_key(identity), snapshot.clone());
        Ok(())
    }

    fn clear(&self, identity: &str) -> Result<()> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| anyhow!("run state store lock poisoned"))?;
        slots.remove(&snapshot_key(identity));
        Ok(())
    }
}

/// Snapshot store writing one JSON file per identity.
#[derive(Debug, Clone)]
pub struct FileRunStateStore {
    dir: PathBuf,
}

impl FileRunStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("{}.json", snapshot_key(identity)))
    }
}

impl RunStateStore for FileRunStateStore {
    fn get(&self, identity: &str) -> Result<Option<PersistedRun>> {
        let path = self.path_for(identity);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                // An unreadable slot is as good as empty; the next run overwrites it.
                warn!("Ignoring corrupt snapshot {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    fn set(&self, identity: &str, snapshot: &PersistedRun) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.path_for(identity);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec(snapshot).context("Failed to serialize run snapshot")?;
        fs::write(&tmp, body).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move snapshot into {}", path.display()))?;
        Ok(())
    }

    fn clear(&self, identity: &str) -> Result<()> {
        let path = self.path_for(identity);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}
