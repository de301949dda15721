//! proximity-trace - Contact-tracing reports from network proximity webhooks
//!
//! The platform's proximity API delivers, per triggered computation, a list of
//! time-slices in which wireless clients were seen near a traced device. This
//! crate turns one such delivery into two reports per traced device through a
//! deterministic pipeline: wire adaptation → contact aggregation and dwell
//! coalescing → report formatting → report files.
//!
//! ## Reports
//!
//! - **Proximity total time**: cumulative exposure per contact, longest first
//! - **Dwell total time**: contiguous time spent at each location, chronological

pub mod aggregator;
pub mod config;
pub mod dwell;
pub mod error;
pub mod formatter;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod types;

pub use aggregator::aggregate_contacts;
pub use config::TraceConfig;
pub use dwell::coalesce_dwell;
pub use error::TraceError;
pub use formatter::{format_duration, format_local};
pub use pipeline::{process_delivery, DeliveryOutcome, DeliveryProcessor};

// Schema exports
pub use schema::{parse_delivery, validate_delivery, PayloadIssue};

/// Crate version reported by the CLI
pub const TRACE_VERSION: &str = env!("CARGO_PKG_VERSION");
