//! Ingestion layer for subtrack.
//!
//! Discovers and reads subscription documents from JSON, JSONL and
//! `mongoexport` files, coerces them into typed records, and exposes the
//! result to the core through [`subtrack_core::batch::RecordSource`].

pub mod document;
pub mod reader;
pub mod source;

pub use source::FileRecordSource;
pub use subtrack_core as core;
