//! Commands embedded in chat text.
//!
//! In advanced mode every client that *receives* a chat line inspects its
//! body; two prefixes trigger a local query against the activity log:
//!
//! - `%last N` : replay the last `N` logged records
//! - `%who`    : print the current roster snapshot

/// A query recognised in a chat body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Last(usize),
    Who,
}

impl ChatCommand {
    /// Parse a chat body. Anything that is not a recognised command,
    /// including `%last` with a missing, zero or non-numeric count, is `None`.
    pub fn parse(body: &str) -> Option<Self> {
        if let Some(rest) = body.strip_prefix("%last ") {
            let digits: String = rest
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            return match digits.parse::<usize>() {
                Ok(n) if n > 0 => Some(ChatCommand::Last(n)),
                _ => None,
            };
        }

        if body.starts_with("%who") {
            return Some(ChatCommand::Who);
        }

        None
    }
}
