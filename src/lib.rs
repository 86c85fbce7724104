pub mod dispatch;
pub mod errors;
pub mod ingestion;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod tracking;
pub mod utils;

pub use errors::PipelineError;
