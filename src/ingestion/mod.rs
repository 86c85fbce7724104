pub mod analyzer;
pub mod normalizer;

pub use analyzer::analyze_candidates;
pub use normalizer::normalize_upload;
