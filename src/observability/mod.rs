//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Front end and workers produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (counters and histograms, front end only)
//!
//! Consumers:
//!     → Log aggregation (stderr of the front end and every worker)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows from the HTTP layer through the envelope into worker logs
//! - Metrics are cheap no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
