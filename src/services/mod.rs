// src/services/mod.rs
//
// Collaborator seams: the verification endpoint, object storage and the
// finalize/history service. The pipeline only ever talks to these traits.

pub mod client;
#[cfg(test)]
pub(crate) mod testing;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::models::verification::{
    FinalizeRequest, FinalizeResponse, HistoryEntry, UploadTarget, VerifiedRow,
};

pub use client::ApiClient;

#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Classifies one chunk. May return fewer rows than submitted.
    async fn verify_batch(
        &self,
        identity: &str,
        numbers: &[String],
        region_code: &str,
    ) -> Result<Vec<VerifiedRow>>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn get_upload_url(&self, file_name: &str) -> Result<UploadTarget>;

    async fn put_object(&self, upload_url: &str, body: Bytes, content_type: &str) -> Result<()>;
}

#[async_trait]
pub trait HistoryService: Send + Sync {
    async fn finalize(&self, request: &FinalizeRequest) -> Result<FinalizeResponse>;

    async fn user_history(&self, identity: &str) -> Result<Vec<HistoryEntry>>;
}
