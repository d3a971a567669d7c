//! Activity log: roster snapshot region + append-only message records.
//!
//! File layout:
//!
//! ```text
//! [0 .. ROSTER_SIZE)                     roster snapshot (rewritten in place)
//! [ROSTER_SIZE + i*MESSAGE_SIZE .. +MESSAGE_SIZE)  message record i
//! ```
//!
//! The two regions never overlap: appends start at `ROSTER_SIZE` at the
//! earliest and only move forward. Because every message record has the
//! same size, the last `n` records sit at a computable offset.
//!
//! The roster region is the only part written from more than one context
//! (the broker's snapshot workers) and read by other processes, so every
//! access to it goes through the [`NamedMutex`]. Appends come only from
//! the broker's dispatch loop and use positional writes, so a snapshot
//! worker never disturbs the append position.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use parley_core::{Message, Roster};
use parley_protocol::{decode_message, decode_roster, encode_message, encode_roster, MESSAGE_SIZE, ROSTER_SIZE};

use crate::error::{IpcError, Result};
use crate::named_mutex::NamedMutex;

const APPEND_START: u64 = ROSTER_SIZE as u64;
const RECORD: u64 = MESSAGE_SIZE as u64;

// ============================================================================
// Writer (broker side)
// ============================================================================

/// The broker's handle on its activity log.
#[derive(Debug)]
pub struct ActivityLog {
    path: PathBuf,
    file: Arc<File>,
    mutex: NamedMutex,

    /// Where the next record goes.
    append_offset: u64,

    /// Generation of the most recently requested roster.
    generation: u64,

    /// Generation of the roster currently on disk.
    written: Arc<AtomicU64>,

    /// Snapshot workers that may still be running.
    pending: Vec<JoinHandle<()>>,
}

impl ActivityLog {
    /// Open (or create) the log at `path` and its mutex at `lock_path`,
    /// then write an empty roster.
    ///
    /// Records already in an existing log are kept; new ones follow them.
    pub fn create(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| IpcError::io("open log", &path, e))?;

        let len = file
            .metadata()
            .map_err(|e| IpcError::io("stat log", &path, e))?
            .len();
        check_layout(&path, len, true)?;

        let mutex = NamedMutex::create(lock_path)?;

        let mut log = ActivityLog {
            path,
            file: Arc::new(file),
            mutex,
            append_offset: len.max(APPEND_START),
            generation: 0,
            written: Arc::new(AtomicU64::new(0)),
            pending: Vec::new(),
        };
        log.write_snapshot(&Roster::default())?;

        info!(
            "activity log {} ready ({} existing records)",
            log.path.display(),
            log.record_count()
        );
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mutex(&self) -> &NamedMutex {
        &self.mutex
    }

    /// Records in the append region.
    pub fn record_count(&self) -> u64 {
        (self.append_offset - APPEND_START) / RECORD
    }

    /// Append `msg` at the end of the log. Pings are never logged.
    pub fn append(&mut self, msg: &Message) -> Result<()> {
        if !msg.kind.is_logged() {
            return Ok(());
        }

        let mut buf = Vec::with_capacity(MESSAGE_SIZE);
        encode_message(msg, &mut buf).map_err(|e| IpcError::protocol(&self.path, e))?;
        self.file
            .write_all_at(&buf, self.append_offset)
            .map_err(|e| IpcError::io("append to", &self.path, e))?;
        self.append_offset += RECORD;
        Ok(())
    }

    /// Overwrite the roster region now, on the calling thread.
    pub fn write_snapshot(&mut self, roster: &Roster) -> Result<()> {
        self.generation += 1;
        write_roster(&self.file, &self.path, &self.mutex, &self.written, self.generation, roster)
    }

    /// Overwrite the roster region on a blocking worker so a slow mutex
    /// acquisition never stalls the caller.
    ///
    /// Workers may finish out of order; one carrying an older roster than
    /// what is already on disk skips its write.
    pub fn spawn_snapshot(&mut self, roster: Roster) {
        self.generation += 1;
        let generation = self.generation;
        let file = Arc::clone(&self.file);
        let path = self.path.clone();
        let mutex = self.mutex.clone();
        let written = Arc::clone(&self.written);

        self.pending.retain(|handle| !handle.is_finished());
        self.pending.push(tokio::task::spawn_blocking(move || {
            if let Err(e) = write_roster(&file, &path, &mutex, &written, generation, &roster) {
                error!("roster snapshot {} failed: {}", generation, e);
            }
        }));
    }

    /// Wait for every outstanding snapshot worker.
    pub async fn flush_snapshots(&mut self) {
        for handle in self.pending.drain(..) {
            if let Err(e) = handle.await {
                error!("roster snapshot worker panicked: {}", e);
            }
        }
    }

    /// Finish outstanding snapshots, close the log and remove the mutex.
    pub async fn close(mut self) -> Result<()> {
        self.flush_snapshots().await;
        self.file
            .sync_data()
            .map_err(|e| IpcError::io("sync log", &self.path, e))?;
        debug!("closing activity log {}", self.path.display());
        let ActivityLog { mutex, .. } = self;
        mutex.remove()
    }
}

fn write_roster(
    file: &File,
    path: &Path,
    mutex: &NamedMutex,
    written: &AtomicU64,
    generation: u64,
    roster: &Roster,
) -> Result<()> {
    let mut buf = Vec::with_capacity(ROSTER_SIZE);
    encode_roster(roster, &mut buf).map_err(|e| IpcError::protocol(path, e))?;

    let _guard = mutex.lock()?;
    if written.load(Ordering::Acquire) >= generation {
        debug!("roster snapshot {} superseded", generation);
        return Ok(());
    }
    file.write_all_at(&buf, 0)
        .map_err(|e| IpcError::io("write roster to", path, e))?;
    written.store(generation, Ordering::Release);
    debug!("roster snapshot {} written ({} clients)", generation, roster.client_count());
    Ok(())
}

/// Validate a log length. An empty file is acceptable only when `allow_empty`.
fn check_layout(path: &Path, len: u64, allow_empty: bool) -> Result<()> {
    if len == 0 && allow_empty {
        return Ok(());
    }
    if len < APPEND_START {
        return Err(IpcError::CorruptLog {
            path: path.to_path_buf(),
            reason: format!("{} bytes is shorter than the roster region", len),
        });
    }
    if (len - APPEND_START) % RECORD != 0 {
        return Err(IpcError::CorruptLog {
            path: path.to_path_buf(),
            reason: "append region ends in a partial record".to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// Reader (clients, log-dump)
// ============================================================================

/// Read-only view of an activity log.
#[derive(Debug)]
pub struct LogReader {
    path: PathBuf,
    file: File,
    mutex: Option<NamedMutex>,
}

impl LogReader {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| IpcError::io("open log", &path, e))?;
        Ok(LogReader {
            path,
            file,
            mutex: None,
        })
    }

    /// Read the roster region under `mutex` from now on.
    pub fn with_mutex(mut self, mutex: NamedMutex) -> Self {
        self.mutex = Some(mutex);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn len(&self) -> Result<u64> {
        Ok(self
            .file
            .metadata()
            .map_err(|e| IpcError::io("stat log", &self.path, e))?
            .len())
    }

    /// Whole records currently in the append region.
    pub fn record_count(&self) -> Result<u64> {
        let len = self.len()?;
        check_layout(&self.path, len.min(APPEND_START), false)?;
        Ok((len - APPEND_START) / RECORD)
    }

    /// Read the roster snapshot, holding the mutex if one is attached.
    pub fn read_snapshot(&self) -> Result<Roster> {
        let _guard = match &self.mutex {
            Some(mutex) => Some(mutex.lock()?),
            None => None,
        };

        let mut buf = vec![0u8; ROSTER_SIZE];
        self.file
            .read_exact_at(&mut buf, 0)
            .map_err(|e| IpcError::io("read roster from", &self.path, e))?;
        decode_roster(&buf).map_err(|e| IpcError::protocol(&self.path, e))
    }

    /// The last `n` records, oldest first. Fewer if the log holds fewer.
    pub fn read_last(&self, n: usize) -> Result<Vec<Message>> {
        let total = self.record_count()?;
        let take = total.min(n as u64);
        self.read_range(total - take, take)
    }

    /// Every record, oldest first. A trailing partial record is an error.
    pub fn read_all(&self) -> Result<Vec<Message>> {
        check_layout(&self.path, self.len()?, false)?;
        let total = self.record_count()?;
        self.read_range(0, total)
    }

    fn read_range(&self, first: u64, count: u64) -> Result<Vec<Message>> {
        let mut messages = Vec::with_capacity(count as usize);
        let mut buf = vec![0u8; MESSAGE_SIZE];
        for i in first..first + count {
            self.file
                .read_exact_at(&mut buf, APPEND_START + i * RECORD)
                .map_err(|e| IpcError::io("read record from", &self.path, e))?;
            messages.push(decode_message(&buf).map_err(|e| IpcError::protocol(&self.path, e))?);
        }
        Ok(messages)
    }
}
