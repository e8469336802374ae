//! HTTP front end subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum, request ID, tracing)
//!     → buffer body, build RequestEnvelope
//!     → pool picks a worker, envelope dispatched, reply awaited by id
//!     → response.rs (reply envelope → status, headers, body)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
