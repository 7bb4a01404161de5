//! Client-side persistence for cropwatch.
//!
//! This crate provides a trait-based history store with a JSON file
//! reference implementation and an in-memory one, plus the bounded
//! prediction history they persist.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory;
pub mod history;

pub use trait_::{HistoryStore, StorageError, Result};
pub use json_storage::JsonHistoryStore;
pub use memory::MemoryHistoryStore;
pub use history::PredictionHistory;
