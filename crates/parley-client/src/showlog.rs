// crates/parley-client/src/showlog.rs

use parley_core::render::{render, render_roster};
use parley_ipc::{IpcError, LogReader};

/// The roster, a `MESSAGES` marker, then every logged record.
pub fn dump(log: &LogReader) -> Result<Vec<String>, IpcError> {
    let mut lines = render_roster(&log.read_snapshot()?);
    lines.push("MESSAGES".to_string());
    lines.extend(log.read_all()?.iter().filter_map(render));
    Ok(lines)
}
