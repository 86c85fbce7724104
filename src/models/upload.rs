// src/models/upload.rs
use crate::errors::PipelineError;
use anyhow::{Context, Result};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Declared shape of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    DelimitedText,
    Spreadsheet,
}

impl UploadFormat {
    /// Picks the format from a file name's extension.
    pub fn from_file_name(file_name: &str) -> Result<Self, PipelineError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "txt" | "csv" => Ok(UploadFormat::DelimitedText),
            "xlsx" | "xls" | "xlsm" | "ods" => Ok(UploadFormat::Spreadsheet),
            _ => Err(PipelineError::UnsupportedFormat { extension }),
        }
    }

    pub fn content_type(&self, file_name: &str) -> &'static str {
        match self {
            UploadFormat::DelimitedText if file_name.to_ascii_lowercase().ends_with(".csv") => {
                "text/csv"
            }
            UploadFormat::DelimitedText => "text/plain",
            UploadFormat::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

/// The operator's file as selected: bytes are kept verbatim for the audit upload.
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub file_name: String,
    pub format: UploadFormat,
    pub bytes: Bytes,
}

impl RawUpload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Result<Self, PipelineError> {
        let file_name = file_name.into();
        let format = UploadFormat::from_file_name(&file_name)?;
        Ok(Self {
            file_name,
            format,
            bytes: bytes.into(),
        })
    }

    pub async fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("Invalid upload path: {}", path.display()))?;
        // Reject the extension before reading a potentially large file.
        UploadFormat::from_file_name(&file_name)?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read upload: {}", path.display()))?;
        Self::new(file_name, bytes)
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type(&self.file_name)
    }

    /// Hex SHA-256 of the original bytes.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// Normalized candidates in upload order, duplicates included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList {
    candidates: Vec<String>,
}

impl CandidateList {
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// First-occurrence-ordered distinct candidates plus the counts shown before a run.
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueCandidateSet {
    pub(crate) unique: Vec<String>,
    pub(crate) total_count: usize,
    pub(crate) estimated_total_ms: u64,
}

impl UniqueCandidateSet {
    pub fn unique(&self) -> &[String] {
        &self.unique
    }

    pub fn unique_count(&self) -> usize {
        self.unique.len()
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn duplicate_count(&self) -> usize {
        self.total_count - self.unique.len()
    }

    pub fn estimated_total_ms(&self) -> u64 {
        self.estimated_total_ms
    }
}
