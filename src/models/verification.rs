// src/models/verification.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Line classification reported by the verification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    Mobile,
    Landline,
    #[default]
    #[serde(other)]
    Unknown,
}

/// One verified candidate. Produced by the service; the pipeline only aggregates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedRow {
    #[serde(alias = "input", alias = "original")]
    pub number: String,
    #[serde(default, alias = "normalized", alias = "e164Number")]
    pub e164: String,
    #[serde(default, rename = "type", alias = "lineType", alias = "line_type")]
    pub line_type: LineType,
    #[serde(default, alias = "carrierName")]
    pub carrier: Option<String>,
}

/// A completed run as recorded by the history service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "created_at", alias = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "total_uploaded")]
    pub total_uploaded: usize,
    #[serde(default, alias = "unique_count")]
    pub unique_count: usize,
    #[serde(default, alias = "verified_count")]
    pub verified_count: usize,
    #[serde(default, alias = "verifiedFilePath", alias = "verified_file_path", alias = "downloadUrl")]
    pub download_ref: Option<String>,
    #[serde(default, alias = "unverifiedFilePath", alias = "unverified_file_path")]
    pub original_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBatchRequest<'a> {
    pub user_id: &'a str,
    pub numbers: &'a [String],
    pub country_code: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyBatchResponse {
    #[serde(default)]
    pub results: Vec<VerifiedRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest<'a> {
    pub file_name: &'a str,
}

/// Short-lived write target plus the durable reference it becomes once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    pub upload_url: String,
    pub public_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub user_id: String,
    pub unverified_file_path: String,
    pub verified_file_path: String,
    pub verified_count: usize,
    pub total_uploaded: usize,
    pub unique_count: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    #[serde(default, alias = "downloadUrl", alias = "verifiedFilePath")]
    pub download_ref: Option<String>,
}
