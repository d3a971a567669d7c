//! parley-core
//!
//! Pure broker logic:
//! - messages (chat records, join requests, roster snapshots)
//! - human-readable rendering of records
//! - chat commands embedded in message bodies
//! - bounded, order-preserving client registry
//! - wraparound-safe logical clock

pub mod messages;
pub mod render;
pub mod command;
pub mod registry;
pub mod clock;

pub use messages::{
    JoinRequest,
    Message,
    MessageKind,
    Roster,
    MAX_BODY_LEN,
    MAX_NAME_LEN,
    MAX_PATH_LEN,
    ROSTER_CAPACITY,
};

pub use command::ChatCommand;
pub use registry::{Registry, RegistryFull};
pub use clock::{LogicalClock, CLOCK_WRAP};
