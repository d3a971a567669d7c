//! Named-pipe channels carrying fixed-size records.
//!
//! Every open is read-write, so opening never waits for the other side and
//! the channel never reports end-of-stream while this process holds it.
//! Reads and writes move exactly one record per system call: records are
//! smaller than `PIPE_BUF`, so the kernel writes each one atomically and a
//! read of one record size returns either a whole record or nothing.
//!
//! - [`JoinEndpoint`] : the broker's well-known inbound endpoint
//! - [`ChannelPair`]  : one client's two channels, seen from either side

use std::io;
use std::path::{Path, PathBuf};
use std::task::{Context, Poll};

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tokio::net::unix::pipe;
use tracing::debug;

use parley_core::{JoinRequest, Message};
use parley_protocol::{
    decode_join, decode_message, encode_join, encode_message, JOIN_SIZE, MESSAGE_SIZE,
};

use crate::error::{IpcError, Result};

// ============================================================================
// Artifact lifecycle
// ============================================================================

/// Create a FIFO at `path`, replacing any stale artifact of the same name.
pub fn create(path: &Path) -> Result<()> {
    remove(path)?;
    mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR)
        .map_err(|errno| IpcError::io("mkfifo", path, errno.into()))?;
    debug!("created fifo {}", path.display());
    Ok(())
}

/// Remove the artifact at `path`; a missing file is not an error.
pub fn remove(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IpcError::io("remove", path, e)),
    }
}

pub fn open_reader(path: &Path) -> Result<pipe::Receiver> {
    pipe::OpenOptions::new()
        .read_write(true)
        .open_receiver(path)
        .map_err(|e| IpcError::io("open for reading", path, e))
}

pub fn open_writer(path: &Path) -> Result<pipe::Sender> {
    pipe::OpenOptions::new()
        .read_write(true)
        .open_sender(path)
        .map_err(|e| IpcError::io("open for writing", path, e))
}

// ============================================================================
// Record transfer
// ============================================================================

/// Read one `size`-byte record if one is waiting.
///
/// `Ok(None)` means the channel had nothing to read (stale readiness).
/// Any other byte count is a desynchronised peer.
pub fn try_read_record(rx: &pipe::Receiver, path: &Path, size: usize) -> Result<Option<Vec<u8>>> {
    let mut buf = vec![0u8; size];
    match rx.try_read(&mut buf) {
        Ok(n) if n == size => Ok(Some(buf)),
        Ok(n) => Err(IpcError::ShortRecord {
            path: path.to_path_buf(),
            expected: size,
            got: n,
        }),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(IpcError::io("read", path, e)),
    }
}

/// Wait for and read one `size`-byte record.
pub async fn read_record(rx: &pipe::Receiver, path: &Path, size: usize) -> Result<Vec<u8>> {
    loop {
        rx.readable()
            .await
            .map_err(|e| IpcError::io("wait on", path, e))?;
        if let Some(buf) = try_read_record(rx, path, size)? {
            return Ok(buf);
        }
    }
}

/// Write one whole record, waiting for buffer space if needed.
pub async fn write_record(tx: &pipe::Sender, path: &Path, bytes: &[u8]) -> Result<()> {
    loop {
        tx.writable()
            .await
            .map_err(|e| IpcError::io("wait on", path, e))?;
        match tx.try_write(bytes) {
            Ok(n) if n == bytes.len() => return Ok(()),
            Ok(n) => {
                return Err(IpcError::ShortRecord {
                    path: path.to_path_buf(),
                    expected: bytes.len(),
                    got: n,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(IpcError::io("write", path, e)),
        }
    }
}

/// Encode and write a single message.
pub async fn send_message(tx: &pipe::Sender, path: &Path, msg: &Message) -> Result<()> {
    let mut buf = Vec::with_capacity(MESSAGE_SIZE);
    encode_message(msg, &mut buf).map_err(|e| IpcError::protocol(path, e))?;
    write_record(tx, path, &buf).await
}

/// Deliver a join request to the broker's join endpoint at `path`.
pub async fn send_join(path: &Path, join: &JoinRequest) -> Result<()> {
    let mut buf = Vec::with_capacity(JOIN_SIZE);
    encode_join(join, &mut buf).map_err(|e| IpcError::protocol(path, e))?;
    let tx = open_writer(path)?;
    write_record(&tx, path, &buf).await
}

// ============================================================================
// Join endpoint
// ============================================================================

/// The broker's well-known endpoint for join requests.
#[derive(Debug)]
pub struct JoinEndpoint {
    path: PathBuf,
    rx: pipe::Receiver,
}

impl JoinEndpoint {
    /// Create (replacing any stale artifact) and open the join endpoint.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        create(&path)?;
        let rx = open_reader(&path)?;
        Ok(JoinEndpoint { path, rx })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn poll_read_ready(&self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.rx
            .poll_read_ready(cx)
            .map_err(|e| IpcError::io("poll", &self.path, e))
    }

    /// Read one waiting join request, if any.
    pub fn try_recv(&self) -> Result<Option<JoinRequest>> {
        match try_read_record(&self.rx, &self.path, JOIN_SIZE)? {
            Some(buf) => decode_join(&buf)
                .map(Some)
                .map_err(|e| IpcError::protocol(&self.path, e)),
            None => Ok(None),
        }
    }

    /// Close the endpoint and remove its artifact so no one else can join.
    pub fn close(self) -> Result<()> {
        let JoinEndpoint { path, rx } = self;
        drop(rx);
        remove(&path)
    }
}

// ============================================================================
// Per-client channel pair
// ============================================================================

/// One client's two channels, from the point of view of whoever holds it:
/// `rx` is read here, `tx` is written here.
#[derive(Debug)]
pub struct ChannelPair {
    rx_path: PathBuf,
    rx: pipe::Receiver,
    tx_path: PathBuf,
    tx: pipe::Sender,
}

impl ChannelPair {
    /// Broker side: open the two FIFOs a joining client already created.
    pub fn open_for_broker(join: &JoinRequest) -> Result<Self> {
        let rx_path = PathBuf::from(&join.inbound_path);
        let tx_path = PathBuf::from(&join.outbound_path);
        let rx = open_reader(&rx_path)?;
        let tx = open_writer(&tx_path)?;
        Ok(ChannelPair {
            rx_path,
            rx,
            tx_path,
            tx,
        })
    }

    /// Client side: create both FIFOs, then read `to_client` and write
    /// `to_server`.
    pub fn create_for_client(to_server: &Path, to_client: &Path) -> Result<Self> {
        create(to_client)?;
        let rx = open_reader(to_client)?;
        create(to_server)?;
        let tx = open_writer(to_server)?;
        Ok(ChannelPair {
            rx_path: to_client.to_path_buf(),
            rx,
            tx_path: to_server.to_path_buf(),
            tx,
        })
    }

    pub fn rx_path(&self) -> &Path {
        &self.rx_path
    }

    pub fn tx_path(&self) -> &Path {
        &self.tx_path
    }

    pub fn poll_recv_ready(&self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.rx
            .poll_read_ready(cx)
            .map_err(|e| IpcError::io("poll", &self.rx_path, e))
    }

    /// Read one waiting message, if any.
    pub fn try_recv(&self) -> Result<Option<Message>> {
        match try_read_record(&self.rx, &self.rx_path, MESSAGE_SIZE)? {
            Some(buf) => decode_message(&buf)
                .map(Some)
                .map_err(|e| IpcError::protocol(&self.rx_path, e)),
            None => Ok(None),
        }
    }

    /// Wait for the next message.
    pub async fn recv(&self) -> Result<Message> {
        let buf = read_record(&self.rx, &self.rx_path, MESSAGE_SIZE).await?;
        decode_message(&buf).map_err(|e| IpcError::protocol(&self.rx_path, e))
    }

    pub async fn send(&self, msg: &Message) -> Result<()> {
        send_message(&self.tx, &self.tx_path, msg).await
    }

    /// Close both channels and remove both artifacts.
    ///
    /// Both removals are attempted; the first failure is reported.
    pub fn close(self) -> Result<()> {
        let ChannelPair {
            rx_path,
            rx,
            tx_path,
            tx,
        } = self;
        drop(rx);
        drop(tx);
        let rx_removed = remove(&rx_path);
        let tx_removed = remove(&tx_path);
        rx_removed.and(tx_removed)
    }
}
