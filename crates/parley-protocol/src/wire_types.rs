//! Low-level wire types and constants.
//!
//! This module defines:
//! - Record tags (one per message kind, plus join and roster records).
//! - Protocol versioning.
//! - Field widths and the resulting constant record sizes.
//!
//! The actual encode/decode logic lives in `record_codec`.

use parley_core::{MessageKind, MAX_BODY_LEN, MAX_NAME_LEN, MAX_PATH_LEN, ROSTER_CAPACITY};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Bytes of `[tag, version, reserved, reserved]` at the front of every record.
pub const HEADER_LEN: usize = 4;

/// Size of a message record on every channel and in the log.
///
/// Stays below `PIPE_BUF` (4096) so a single FIFO write is atomic.
pub const MESSAGE_SIZE: usize = HEADER_LEN + MAX_NAME_LEN + MAX_BODY_LEN;

/// Size of a join request record.
pub const JOIN_SIZE: usize = HEADER_LEN + MAX_NAME_LEN + 2 * MAX_PATH_LEN;

/// Size of the roster snapshot region at the start of the activity log.
pub const ROSTER_SIZE: usize = HEADER_LEN + 4 + ROSTER_CAPACITY * MAX_NAME_LEN;

/// Record tags (first byte of every record).
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WireTag {
    Chat = 1,
    Joined = 2,
    Departed = 3,
    Shutdown = 4,
    Disconnected = 5,
    Ping = 6,
    Rejected = 7,

    /// Join request sent to the broker's join endpoint.
    Join = 0x10,

    /// Roster snapshot at the head of the activity log.
    Roster = 0x20,
}

impl WireTag {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(WireTag::Chat),
            2 => Some(WireTag::Joined),
            3 => Some(WireTag::Departed),
            4 => Some(WireTag::Shutdown),
            5 => Some(WireTag::Disconnected),
            6 => Some(WireTag::Ping),
            7 => Some(WireTag::Rejected),
            0x10 => Some(WireTag::Join),
            0x20 => Some(WireTag::Roster),
            _ => None,
        }
    }

    pub fn from_kind(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Chat => WireTag::Chat,
            MessageKind::Joined => WireTag::Joined,
            MessageKind::Departed => WireTag::Departed,
            MessageKind::Shutdown => WireTag::Shutdown,
            MessageKind::Disconnected => WireTag::Disconnected,
            MessageKind::Ping => WireTag::Ping,
            MessageKind::Rejected => WireTag::Rejected,
        }
    }

    /// The message kind this tag carries, or `None` for join/roster tags.
    pub fn kind(self) -> Option<MessageKind> {
        match self {
            WireTag::Chat => Some(MessageKind::Chat),
            WireTag::Joined => Some(MessageKind::Joined),
            WireTag::Departed => Some(MessageKind::Departed),
            WireTag::Shutdown => Some(MessageKind::Shutdown),
            WireTag::Disconnected => Some(MessageKind::Disconnected),
            WireTag::Ping => Some(MessageKind::Ping),
            WireTag::Rejected => Some(MessageKind::Rejected),
            WireTag::Join | WireTag::Roster => None,
        }
    }
}
