// crates/parley-client/src/commands.rs

use parley_core::render::{render, render_roster, RULE};
use parley_core::{ChatCommand, Message, MessageKind};
use parley_ipc::{IpcError, LogReader};
use tracing::warn;

/// Lines printed in answer to a chat command seen in the room.
pub fn command_output(cmd: ChatCommand, log: &LogReader) -> Result<Vec<String>, IpcError> {
    let mut lines = vec![RULE.to_string()];
    match cmd {
        ChatCommand::Last(n) => {
            lines.push(format!("LAST {} MESSAGES", n));
            lines.extend(log.read_last(n)?.iter().filter_map(render));
        }
        ChatCommand::Who => {
            lines.extend(render_roster(&log.read_snapshot()?));
        }
    }
    lines.push(RULE.to_string());
    Ok(lines)
}

/// Everything a user sees for one received record: its rendering, then
/// the output of any command it carries (when a log is available).
pub fn present(msg: &Message, log: Option<&LogReader>) -> Vec<String> {
    let mut lines: Vec<String> = render(msg).into_iter().collect();
    if msg.kind != MessageKind::Chat {
        return lines;
    }

    let (Some(log), Some(cmd)) = (log, ChatCommand::parse(&msg.body)) else {
        return lines;
    };

    match command_output(cmd, log) {
        Ok(output) => lines.extend(output),
        Err(e) => {
            warn!("{:?} failed: {}", cmd, e);
            lines.push(format!("!!! could not read {} !!!", log.path().display()));
        }
    }
    lines
}
