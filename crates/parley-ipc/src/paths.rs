//! Artifact naming inside a run directory.
//!
//! For a broker called `room` running in `dir`:
//! - `dir/room.fifo` : join endpoint
//! - `dir/room.log`  : activity log
//! - `dir/room.lock` : named mutex guarding the log's roster region
//!
//! A client identified by `id` (its pid) creates:
//! - `dir/<id>.server.fifo` : client -> broker
//! - `dir/<id>.client.fifo` : broker -> client

use std::path::{Path, PathBuf};

pub fn join_fifo(dir: &Path, broker: &str) -> PathBuf {
    dir.join(format!("{}.fifo", broker))
}

pub fn log_file(dir: &Path, broker: &str) -> PathBuf {
    dir.join(format!("{}.log", broker))
}

pub fn lock_file(dir: &Path, broker: &str) -> PathBuf {
    dir.join(format!("{}.lock", broker))
}

/// `(to_server, to_client)` FIFO paths for client `id`.
pub fn client_fifos(dir: &Path, id: u32) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{}.server.fifo", id)),
        dir.join(format!("{}.client.fifo", id)),
    )
}
