//! Service layer for the analysis console
//!
//! Business logic between HTTP handlers and storage/llm.

#![allow(missing_docs, reason = "Internal crate with self-explanatory API")]
#![allow(clippy::missing_errors_doc, reason = "Errors are self-explanatory from Result types")]
#![allow(missing_debug_implementations, reason = "Internal types")]
#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]

mod analysis_service;
mod error;
mod events;
mod thread_sync;
mod upload_service;

pub use analysis_service::{AnalysisService, FollowUpOutcome, SharedAnalysis};
pub use error::ServiceError;
pub use events::ConsoleEvent;
pub use thread_sync::{ReconcileReport, ThreadMessageView, ThreadSynchronizer, ThreadView};
pub use upload_service::{NewUpload, UploadService};
