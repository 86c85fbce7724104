pub mod coordinator;

pub use coordinator::{PreparedRun, RunOptions, RunReport, RunServices, VerificationPipeline};
