//! Runtime layer for subtrack.
//!
//! Concrete notification and reporting sinks, the service that wires one
//! batch run together, and the periodic scheduler used by watch mode.

pub mod notifier;
pub mod reporter;
pub mod scheduler;
pub mod service;

pub use service::TrackerService;
pub use subtrack_core as core;
