//! Computational core for subtrack.
//!
//! Holds the subscription record model, the billing-cycle cost model, the
//! staleness and expiry classifiers, and the batch runner that drives them
//! over a collection of records. The analysis modules are synchronous and do
//! no I/O of their own; delivery goes through the injected sink traits.
//! `settings` is the exception and owns the CLI plus its persisted defaults.

pub mod batch;
pub mod clock;
pub mod cost;
pub mod cycle;
pub mod error;
pub mod expiry;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod sinks;
pub mod staleness;
pub mod time_utils;
