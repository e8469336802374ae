//! Config-driven reverse proxy with a pool of request workers.

pub mod config;
pub mod error;
pub mod http;
pub mod ipc;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod routing;
pub mod worker;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pool::WorkerPool;
