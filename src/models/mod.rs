pub mod run_models;
pub mod upload;
pub mod verification;

pub use run_models::{Region, RunPhase, RunState, StagedObject};
pub use upload::{CandidateList, RawUpload, UniqueCandidateSet, UploadFormat};
pub use verification::{HistoryEntry, LineType, VerifiedRow};
