//! Broker error type.

use parley_ipc::IpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Creating the join endpoint, log or mutex failed.
    #[error("startup failed: {0}")]
    Startup(#[source] IpcError),

    #[error("join endpoint: {0}")]
    Join(#[source] IpcError),

    /// Reading from or writing to one client's channel failed.
    #[error("client {name} (slot {index}): {source}")]
    Client {
        index: usize,
        name: String,
        #[source]
        source: IpcError,
    },

    #[error("activity log: {0}")]
    Log(#[source] IpcError),
}

impl BrokerError {
    pub(crate) fn client(index: usize, name: &str, source: IpcError) -> Self {
        BrokerError::Client {
            index,
            name: name.to_string(),
            source,
        }
    }
}
