//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request envelope url (path + query)
//!     → router.rs (scan rules in declared order)
//!     → matcher.rs (root / segment-prefix match)
//!     → upstream.rs (first upstream id → dialable authority)
//!     → Return: Upstream, RouteNotFound or UpstreamNotFound
//!
//! Route Compilation (at worker startup):
//!     RuleConfig[] + UpstreamConfig[]
//!     → Compile path patterns, index upstreams by id
//!     → Freeze as immutable RoutingTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (declared order)

pub mod matcher;
pub mod router;
pub mod upstream;

pub use router::RoutingTable;
pub use upstream::Upstream;
