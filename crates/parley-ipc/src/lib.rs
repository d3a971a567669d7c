//! parley-ipc
//!
//! Everything that touches the filesystem on behalf of the broker and its
//! clients:
//!
//! - [`paths`]        : where a broker's artifacts live in its run directory
//! - [`fifo`]         : named-pipe channels carrying fixed-size records
//! - [`named_mutex`]  : lock identified by a path, shared by unrelated processes
//! - [`activity_log`] : roster snapshot region + append-only message log
//!
//! Channels use `tokio::net::unix::pipe` opened read-write, which is
//! Linux-specific: a read-write open never blocks waiting for the peer.

pub mod error;
pub mod paths;
pub mod fifo;
pub mod named_mutex;
pub mod activity_log;

pub use error::IpcError;
pub use fifo::{ChannelPair, JoinEndpoint};
pub use named_mutex::{NamedMutex, NamedMutexGuard};
pub use activity_log::{ActivityLog, LogReader};
