//! Error type for channel, lock and log operations.

use std::io;
use std::path::PathBuf;

use parley_protocol::ProtocolError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IpcError>;

#[derive(Debug, Error)]
pub enum IpcError {
    /// Creating, opening, reading or writing an artifact failed.
    #[error("{op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A read or write moved a different number of bytes than one record.
    #[error("{} transferred {got} bytes, expected a {expected}-byte record", .path.display())]
    ShortRecord {
        path: PathBuf,
        expected: usize,
        got: usize,
    },

    /// Bytes arrived but do not form a valid record.
    #[error("malformed record on {}: {source}", .path.display())]
    Protocol {
        path: PathBuf,
        #[source]
        source: ProtocolError,
    },

    /// The activity log does not have the expected layout.
    #[error("activity log {} is corrupt: {reason}", .path.display())]
    CorruptLog { path: PathBuf, reason: String },
}

impl IpcError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        IpcError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn protocol(path: impl Into<PathBuf>, source: ProtocolError) -> Self {
        IpcError::Protocol {
            path: path.into(),
            source,
        }
    }
}
