// src/services/client.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::models::verification::{
    FinalizeRequest, FinalizeResponse, HistoryEntry, UploadTarget, UploadUrlRequest,
    VerifiedRow, VerifyBatchRequest, VerifyBatchResponse,
};
use crate::services::{HistoryService, ObjectStorage, VerificationService};
use crate::utils::verification_config::VerificationConfig;

/// HTTP client for the verification, storage and history endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &VerificationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        // Url::join drops the last path segment unless the base ends with '/'.
        let mut base = config.api_base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .with_context(|| format!("Invalid VERIFY_API_URL: {}", config.api_base_url))?;

        Ok(Self { client, base_url })
    }

    fn build_url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("Failed to build URL for {}", path))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.build_url(path)?;
        debug!("GET {}", url);
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await.context("Failed to send request")?;
        Self::parse(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.build_url(path)?;
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;
        Self::parse(response).await
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "API request failed with status {}: {}",
                status,
                error_text
            ));
        }
        Ok(response)
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .context("Failed to parse response as JSON")
    }
}

#[async_trait]
impl VerificationService for ApiClient {
    async fn verify_batch(
        &self,
        identity: &str,
        numbers: &[String],
        region_code: &str,
    ) -> Result<Vec<VerifiedRow>> {
        let body = VerifyBatchRequest {
            user_id: identity,
            numbers,
            country_code: region_code,
        };
        let response: VerifyBatchResponse = self.post_json("api/verify-batch", &body).await?;
        Ok(response.results)
    }
}

#[async_trait]
impl ObjectStorage for ApiClient {
    async fn get_upload_url(&self, file_name: &str) -> Result<UploadTarget> {
        self.post_json("api/get-upload-url", &UploadUrlRequest { file_name })
            .await
    }

    async fn put_object(&self, upload_url: &str, body: Bytes, content_type: &str) -> Result<()> {
        // Signed URLs point at the storage host directly, not at the API base.
        let response = self
            .client
            .put(upload_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .context("Failed to send upload")?;
        Self::check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryService for ApiClient {
    async fn finalize(&self, request: &FinalizeRequest) -> Result<FinalizeResponse> {
        self.post_json("api/finalize-verification", request).await
    }

    async fn user_history(&self, identity: &str) -> Result<Vec<HistoryEntry>> {
        self.get("user-history", &[("userId", identity)]).await
    }
}
