//! Message types exchanged between the broker and its clients.
//!
//! These are **transport-agnostic** logical records:
//! - [`Message`]: the one record kind that travels over every client channel.
//! - [`JoinRequest`]: sent once by a prospective client to the join endpoint.
//! - [`Roster`]: point-in-time list of connected names kept in the activity log.
//!
//! Every string field is bounded so the wire codec (in `parley-protocol`)
//! can give each record a constant size.

/// Longest sender / client name in bytes.
pub const MAX_NAME_LEN: usize = 64;

/// Longest chat body in bytes.
pub const MAX_BODY_LEN: usize = 1024;

/// Longest channel path carried in a join request, in bytes.
pub const MAX_PATH_LEN: usize = 256;

/// Number of name slots in a roster snapshot.
pub const ROSTER_CAPACITY: usize = 32;

/// What a [`Message`] means.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// A line of chat text from `name`.
    Chat,

    /// `name` joined the broker.
    Joined,

    /// `name` left voluntarily.
    Departed,

    /// The broker is going away; no further records follow.
    Shutdown,

    /// `name` stopped answering pings and was evicted.
    Disconnected,

    /// Liveness check (broker -> client) and its answer (client -> broker).
    Ping,

    /// The broker was full when this client asked to join.
    Rejected,
}

impl MessageKind {
    /// Whether records of this kind belong in the activity log.
    pub fn is_logged(self) -> bool {
        !matches!(self, MessageKind::Ping | MessageKind::Rejected)
    }

    /// Whether a client should stop listening after receiving this kind.
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageKind::Shutdown | MessageKind::Rejected)
    }
}

/// A single chat record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,

    /// Sender (for `Chat`, `Ping`) or subject (for `Joined`, `Departed`,
    /// `Disconnected`). Empty for `Shutdown` and `Rejected`.
    pub name: String,

    /// Only meaningful for `Chat`.
    pub body: String,
}

/// Join request (client -> broker, once).
///
/// Both paths name FIFOs the client has already created and opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub name: String,

    /// Channel the broker reads from (client -> broker).
    pub inbound_path: String,

    /// Channel the broker writes to (broker -> client).
    pub outbound_path: String,
}

/// Point-in-time view of connected clients, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    pub names: Vec<String>,
}

impl Roster {
    pub fn new(names: Vec<String>) -> Self {
        Roster { names }
    }

    pub fn client_count(&self) -> usize {
        self.names.len()
    }
}

// -----------------------------------------------------------------------------
// Convenience constructors
// -----------------------------------------------------------------------------

impl Message {
    fn with_name(kind: MessageKind, name: impl Into<String>) -> Self {
        Message {
            kind,
            name: name.into(),
            body: String::new(),
        }
    }

    pub fn chat(name: impl Into<String>, body: impl Into<String>) -> Self {
        Message {
            kind: MessageKind::Chat,
            name: name.into(),
            body: body.into(),
        }
    }

    pub fn joined(name: impl Into<String>) -> Self {
        Message::with_name(MessageKind::Joined, name)
    }

    pub fn departed(name: impl Into<String>) -> Self {
        Message::with_name(MessageKind::Departed, name)
    }

    pub fn disconnected(name: impl Into<String>) -> Self {
        Message::with_name(MessageKind::Disconnected, name)
    }

    /// A ping. The broker sends it with an empty name; clients answer
    /// with their own.
    pub fn ping(name: impl Into<String>) -> Self {
        Message::with_name(MessageKind::Ping, name)
    }

    pub fn shutdown() -> Self {
        Message::with_name(MessageKind::Shutdown, "")
    }

    pub fn rejected() -> Self {
        Message::with_name(MessageKind::Rejected, "")
    }
}

/// Cut `s` to at most `max` bytes without splitting a UTF-8 character.
pub fn truncate_to_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
