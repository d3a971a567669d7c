//! Human-readable rendering of records.
//!
//! Output format (`Message` -> line, no trailing newline):
//!
//! - Chat:         `[name] : body`
//! - Joined:       `-- name JOINED --`
//! - Departed:     `-- name DEPARTED --`
//! - Shutdown:     `!!! server is shutting down !!!`
//! - Disconnected: `-- name DISCONNECTED --`
//! - Rejected:     `!!! join rejected: server is full !!!`
//! - Ping:         never shown to a user

use crate::messages::{Message, MessageKind, Roster};

/// Rule printed around command output.
pub const RULE: &str = "====================";

/// Render a single record, or `None` for kinds a user never sees.
pub fn render(msg: &Message) -> Option<String> {
    let line = match msg.kind {
        MessageKind::Chat => format!("[{}] : {}", msg.name, msg.body),
        MessageKind::Joined => format!("-- {} JOINED --", msg.name),
        MessageKind::Departed => format!("-- {} DEPARTED --", msg.name),
        MessageKind::Shutdown => "!!! server is shutting down !!!".to_string(),
        MessageKind::Disconnected => format!("-- {} DISCONNECTED --", msg.name),
        MessageKind::Rejected => "!!! join rejected: server is full !!!".to_string(),
        MessageKind::Ping => return None,
    };
    Some(line)
}

/// Render a roster as `K CLIENTS` followed by one `i: name` line each.
pub fn render_roster(roster: &Roster) -> Vec<String> {
    let mut lines = Vec::with_capacity(roster.client_count() + 1);
    lines.push(format!("{} CLIENTS", roster.client_count()));
    for (i, name) in roster.names.iter().enumerate() {
        lines.push(format!("{}: {}", i, name));
    }
    lines
}
