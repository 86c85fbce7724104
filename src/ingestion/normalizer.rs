// src/ingestion/normalizer.rs
//
// Turns an uploaded file into an ordered list of phone-number candidates.
// Delimited text contributes the first comma field of each line; spreadsheets
// contribute the first column of the first sheet. Both paths share the same
// header rule, scientific-notation collapse and token filter.

use anyhow::{Context, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;

use crate::errors::PipelineError;
use crate::models::upload::{CandidateList, RawUpload, UploadFormat};
use crate::utils::constants::MIN_CANDIDATE_LEN;

static PHONE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[\d\-()\s]+$").expect("phone token pattern is valid"));

static SCIENTIFIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)(?:\.(\d+))?[eE]\+?(\d{1,2})$").expect("scientific pattern is valid")
});

/// Parses `upload` into a [`CandidateList`], failing with
/// [`PipelineError::NoCandidatesFound`] when nothing usable remains.
pub fn normalize_upload(upload: &RawUpload) -> Result<CandidateList, PipelineError> {
    let raw_fields = match upload.format {
        UploadFormat::DelimitedText => extract_delimited(&String::from_utf8_lossy(&upload.bytes)),
        UploadFormat::Spreadsheet => extract_spreadsheet(&upload.bytes)?,
    };

    let total_fields = raw_fields.len();
    let candidates: Vec<String> = raw_fields
        .iter()
        .filter_map(|field| normalize_candidate(field))
        .collect();

    info!(
        "Normalized '{}': {} rows read, {} candidates kept, {} rejected",
        upload.file_name,
        total_fields,
        candidates.len(),
        total_fields - candidates.len()
    );

    if candidates.is_empty() {
        return Err(PipelineError::NoCandidatesFound);
    }
    Ok(CandidateList::new(candidates))
}

/// First comma-delimited field of every non-blank line, header dropped.
pub fn extract_delimited(text: &str) -> Vec<String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let fields: Vec<String> = text
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| strip_quotes(line.split(',').next().unwrap_or_default()))
        .collect();
    drop_header(fields)
}

/// First column of the first sheet as strings, header dropped.
pub fn extract_spreadsheet(bytes: &[u8]) -> Result<Vec<String>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .context("Failed to open spreadsheet")?;
    let range = workbook
        .worksheet_range_at(0)
        .context("Spreadsheet contains no sheets")?
        .context("Failed to read the first sheet")?;

    // Ranges start at the first used cell; if that is right of column A, column A is empty.
    if let Some((_, first_col)) = range.start() {
        if first_col > 0 {
            debug!("First sheet has no data in column A (starts at column {})", first_col);
            return Ok(Vec::new());
        }
    }

    let cells: Vec<String> = range
        .rows()
        .filter_map(|row| row.first())
        .filter_map(cell_to_text)
        .collect();
    Ok(drop_header(cells))
}

/// Literal text of a spreadsheet cell; numeric cells become digit strings.
pub fn cell_to_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e17 => {
            Some(format!("{:.0}", f))
        }
        Data::Float(f) if f.is_finite() => Some(f.to_string()),
        Data::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        _ => None,
    }
}

/// Applies scientific-notation collapse and the token filter to one field.
pub fn normalize_candidate(raw: &str) -> Option<String> {
    let value = strip_quotes(raw);
    let value = expand_scientific(&value).unwrap_or(value);

    let is_token = value.chars().count() >= MIN_CANDIDATE_LEN
        && PHONE_TOKEN.is_match(&value)
        && value.chars().any(|c| c.is_ascii_digit());
    if is_token {
        Some(value)
    } else {
        debug!("Rejected candidate '{}'", raw);
        None
    }
}

/// `8.41E+09` -> `8410000000`. Returns `None` for anything that is not an
/// integer written in scientific notation.
pub fn expand_scientific(value: &str) -> Option<String> {
    let caps = SCIENTIFIC.captures(value.trim())?;
    let int_part = caps.get(1)?.as_str();
    let frac_part = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let exponent: usize = caps.get(3)?.as_str().parse().ok()?;

    let frac_trimmed = frac_part.trim_end_matches('0');
    if frac_trimmed.len() > exponent {
        return None;
    }

    let mut digits = String::with_capacity(int_part.len() + exponent);
    digits.push_str(int_part);
    digits.push_str(frac_trimmed);
    digits.extend(std::iter::repeat('0').take(exponent - frac_trimmed.len()));

    let digits = digits.trim_start_matches('0');
    Some(if digits.is_empty() { "0".to_string() } else { digits.to_string() })
}

fn strip_quotes(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// A first row that is not itself a phone token is a header label. Short
/// numbers such as `555-1234` pass the token filter and stay as data.
fn drop_header(mut rows: Vec<String>) -> Vec<String> {
    let is_header = rows
        .first()
        .map(|first| normalize_candidate(first).is_none())
        .unwrap_or(false);
    if is_header {
        debug!("Dropping header row '{}'", rows[0]);
        rows.remove(0);
    }
    rows
}
