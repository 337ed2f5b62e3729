//! Core types for the analysis console
//!
//! Domain types shared by the storage, llm, service and http crates.

mod analysis;
mod constants;
mod env_config;
mod error;
mod thread;
mod upload;

pub use analysis::*;
pub use constants::*;
pub use env_config::*;
pub use error::*;
pub use thread::*;
pub use upload::*;
