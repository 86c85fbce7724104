pub mod batch;

pub use batch::{BatchDispatcher, DispatchSummary};
