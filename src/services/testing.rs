// In-memory collaborators for pipeline tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::models::verification::{
    FinalizeRequest, FinalizeResponse, HistoryEntry, LineType, UploadTarget, VerifiedRow,
};
use crate::services::{HistoryService, ObjectStorage, VerificationService};

/// Verifies every number as a mobile line, with scripted failures keyed by
/// the first number of a chunk.
#[derive(Default)]
pub(crate) struct FakeVerifier {
    calls: Mutex<Vec<Vec<String>>>,
    always_fail: HashSet<String>,
    fail_once: Mutex<HashSet<String>>,
    short: HashSet<String>,
}

impl FakeVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_always(mut self, first_number: &str) -> Self {
        self.always_fail.insert(first_number.to_string());
        self
    }

    pub fn failing_once(self, first_number: &str) -> Self {
        if let Ok(mut set) = self.fail_once.lock() {
            set.insert(first_number.to_string());
        }
        self
    }

    /// Drops the last row of the chunk starting with `first_number`.
    pub fn short_response(mut self, first_number: &str) -> Self {
        self.short.insert(first_number.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_sizes(&self) -> Vec<usize> {
        self.calls().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl VerificationService for FakeVerifier {
    async fn verify_batch(
        &self,
        _identity: &str,
        numbers: &[String],
        region_code: &str,
    ) -> Result<Vec<VerifiedRow>> {
        self.calls
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .push(numbers.to_vec());

        let first = numbers.first().cloned().unwrap_or_default();
        if self.always_fail.contains(&first) {
            return Err(anyhow!("API request failed with status 502 Bad Gateway"));
        }
        if self
            .fail_once
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .remove(&first)
        {
            return Err(anyhow!("API request failed with status 503 Service Unavailable"));
        }

        let mut rows: Vec<VerifiedRow> = numbers
            .iter()
            .map(|n| VerifiedRow {
                number: n.clone(),
                e164: format!("{}{}", region_code, n),
                line_type: LineType::Mobile,
                carrier: Some("Test Carrier".to_string()),
            })
            .collect();
        if self.short.contains(&first) {
            rows.pop();
        }
        Ok(rows)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PutRecord {
    pub upload_url: String,
    pub body: Bytes,
    pub content_type: String,
}

/// Object storage keeping every written object in memory.
#[derive(Default)]
pub(crate) struct FakeStorage {
    puts: Mutex<Vec<PutRecord>>,
    fail_prefix: Option<String>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects uploads whose file name starts with `prefix`.
    pub fn failing_for(mut self, prefix: &str) -> Self {
        self.fail_prefix = Some(prefix.to_string());
        self
    }

    pub fn puts(&self) -> Vec<PutRecord> {
        self.puts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn get_upload_url(&self, file_name: &str) -> Result<UploadTarget> {
        Ok(UploadTarget {
            upload_url: format!("https://upload.test/{}?sig=abc", file_name),
            public_url: format!("https://files.test/{}", file_name),
        })
    }

    async fn put_object(&self, upload_url: &str, body: Bytes, content_type: &str) -> Result<()> {
        if let Some(prefix) = &self.fail_prefix {
            if upload_url.starts_with(&format!("https://upload.test/{}", prefix)) {
                return Err(anyhow!("API request failed with status 403 Forbidden"));
            }
        }
        self.puts
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .push(PutRecord {
                upload_url: upload_url.to_string(),
                body,
                content_type: content_type.to_string(),
            });
        Ok(())
    }
}

/// History service that can fail its first `n` finalize calls.
#[derive(Default)]
pub(crate) struct FakeHistory {
    failures_left: Mutex<usize>,
    finalized: Mutex<Vec<FinalizeRequest>>,
}

impl FakeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_times(self, n: usize) -> Self {
        if let Ok(mut left) = self.failures_left.lock() {
            *left = n;
        }
        self
    }

    pub fn finalized(&self) -> Vec<FinalizeRequest> {
        self.finalized.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HistoryService for FakeHistory {
    async fn finalize(&self, request: &FinalizeRequest) -> Result<FinalizeResponse> {
        {
            let mut left = self.failures_left.lock().map_err(|_| anyhow!("poisoned"))?;
            if *left > 0 {
                *left -= 1;
                return Err(anyhow!("API request failed with status 500 Internal Server Error"));
            }
        }
        self.finalized
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .push(request.clone());
        Ok(FinalizeResponse {
            download_ref: Some(request.verified_file_path.clone()),
        })
    }

    async fn user_history(&self, identity: &str) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .finalized()
            .into_iter()
            .filter(|r| r.user_id == identity)
            .map(|r| HistoryEntry {
                id: None,
                created_at: None,
                total_uploaded: r.total_uploaded,
                unique_count: r.unique_count,
                verified_count: r.verified_count,
                download_ref: Some(r.verified_file_path),
                original_ref: Some(r.unverified_file_path),
            })
            .collect())
    }
}
