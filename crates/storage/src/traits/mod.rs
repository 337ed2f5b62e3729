//! Storage backend trait abstraction
//!
//! Async domain traits implemented by every backend. Services hold
//! `Arc<dyn ...>` or the `StorageBackend` enum and never see SQL.

pub mod analysis;
pub mod thread;
pub mod upload;

pub use analysis::AnalysisStore;
pub use thread::ThreadStore;
pub use upload::UploadStore;
