//! parley-server
//!
//! Single-threaded chat broker over named pipes.

pub mod config;
pub mod error;
pub mod types;
pub mod server;

// these add `impl Server` blocks, nothing to re-export
mod dispatch;
mod liveness;

pub use config::Config;
pub use dispatch::ClientOutcome;
pub use error::BrokerError;
pub use server::Server;
