// src/ingestion/analyzer.rs
use log::info;
use std::collections::HashSet;

use crate::models::upload::{CandidateList, UniqueCandidateSet};

/// Deduplicates `candidates` (first occurrence wins, order preserved) and
/// projects the run duration from the per-item latency constant.
///
/// Pure and synchronous: the counts are shown before anything touches the network.
pub fn analyze_candidates(candidates: &CandidateList, avg_latency_ms: f64) -> UniqueCandidateSet {
    let mut seen: HashSet<&str> = HashSet::with_capacity(candidates.len());
    let unique: Vec<String> = candidates
        .as_slice()
        .iter()
        .filter(|c| seen.insert(c.as_str()))
        .cloned()
        .collect();

    let estimated_total_ms = (unique.len() as f64 * avg_latency_ms.max(0.0)).round() as u64;
    let set = UniqueCandidateSet {
        unique,
        total_count: candidates.len(),
        estimated_total_ms,
    };

    info!(
        "📊 {} unique numbers ready to verify ({} uploaded, {} duplicates, ~{} estimated)",
        set.unique_count(),
        set.total_count(),
        set.duplicate_count(),
        crate::utils::format_duration_ms(estimated_total_ms)
    );
    set
}
