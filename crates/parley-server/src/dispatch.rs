//! Handlers for flagged sources, plus fan-out.
//!
//! Routing policy:
//! - `Chat`      => broadcast to all clients (sender included), logged.
//! - `Departed`  => remove the sender first, then broadcast, logged.
//! - `Ping`      => refresh the sender's last-contact time only.
//! - anything else from a client is ignored.
//!
//! A join request is accepted into the registry and announced with
//! `Joined`; when the registry is full the requester gets a single
//! `Rejected` record and nothing else happens.
//!
//! A whole record that does not decode (unknown tag, wrong version, bad
//! UTF-8) is dropped with a warning. Only a partial record is fatal.

use tracing::{debug, info, warn};

use parley_core::{Message, MessageKind, RegistryFull};
use parley_ipc::{ChannelPair, IpcError};

use crate::error::BrokerError;
use crate::server::Server;
use crate::types::ClientRecord;

/// What handling a client did to its registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientOutcome {
    /// Nothing was waiting (stale readiness).
    Idle,
    /// One record was read; the client keeps its slot.
    Handled,
    /// One record was read and the client left its slot.
    Removed,
}

impl Server {
    /// Read one join request and admit (or reject) the requester.
    /// Returns whether a request was read.
    pub async fn handle_join(&mut self) -> Result<bool, BrokerError> {
        self.join_ready = false;

        let request = match self.join.try_recv() {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(false),
            Err(IpcError::Protocol { source, .. }) => {
                warn!("dropping malformed join request: {}", source);
                return Ok(true);
            }
            Err(e) => return Err(BrokerError::Join(e)),
        };

        let channels = match ChannelPair::open_for_broker(&request) {
            Ok(channels) => channels,
            Err(e) => {
                warn!("dropping join from {}: {}", request.name, e);
                return Ok(true);
            }
        };

        let name = request.name.clone();
        let record = ClientRecord::new(request.name, channels, self.clock.now());
        match self.clients.add(record) {
            Ok(idx) => {
                info!("{} joined (slot {}, {} connected)", name, idx, self.clients.len());
                self.broadcast(&Message::joined(name)).await?;
                self.refresh_roster();
            }
            Err(RegistryFull { capacity, rejected }) => {
                warn!("rejecting {}: registry full ({} clients)", rejected.name, capacity);
                if let Err(e) = rejected.channels.send(&Message::rejected()).await {
                    warn!("could not notify {} of rejection: {}", rejected.name, e);
                }
                // The requester owns its FIFOs; only our handles go away.
                drop(rejected);
            }
        }
        Ok(true)
    }

    /// Read one message from client `idx` and act on it.
    pub async fn handle_client(&mut self, idx: usize) -> Result<ClientOutcome, BrokerError> {
        let client = match self.clients.get_mut(idx) {
            Some(client) => client,
            None => return Ok(ClientOutcome::Idle),
        };
        client.data_ready = false;

        let msg = match client.channels.try_recv() {
            Ok(Some(msg)) => msg,
            Ok(None) => return Ok(ClientOutcome::Idle),
            Err(IpcError::Protocol { source, .. }) => {
                warn!("ignoring malformed record from {} (slot {}): {}", client.name, idx, source);
                return Ok(ClientOutcome::Handled);
            }
            Err(e) => return Err(BrokerError::client(idx, &client.name, e)),
        };

        match msg.kind {
            MessageKind::Chat => {
                info!("chat from {} (slot {})", client.name, idx);
                self.broadcast(&msg).await?;
                Ok(ClientOutcome::Handled)
            }
            MessageKind::Departed => {
                if let Some(name) = self.remove_client(idx) {
                    info!("{} departed (slot {})", name, idx);
                    self.broadcast(&Message::departed(name)).await?;
                    self.refresh_roster();
                }
                Ok(ClientOutcome::Removed)
            }
            MessageKind::Ping => {
                client.last_contact = self.clock.now();
                Ok(ClientOutcome::Handled)
            }
            other => {
                debug!("ignoring {:?} from {} (slot {})", other, client.name, idx);
                Ok(ClientOutcome::Handled)
            }
        }
    }

    /// Log `msg`, then send it to every client in registry order.
    ///
    /// A record is in the log before any client can receive it.
    pub async fn broadcast(&mut self, msg: &Message) -> Result<(), BrokerError> {
        if let Some(log) = self.log.as_mut() {
            log.append(msg).map_err(BrokerError::Log)?;
        }
        for (idx, client) in self.clients.iter().enumerate() {
            client
                .channels
                .send(msg)
                .await
                .map_err(|e| BrokerError::client(idx, &client.name, e))?;
        }
        Ok(())
    }

    /// Remove client `idx`, close its channels and remove their artifacts.
    pub(crate) fn remove_client(&mut self, idx: usize) -> Option<String> {
        let ClientRecord { name, channels, .. } = self.clients.remove(idx)?;
        if let Err(e) = channels.close() {
            warn!("closing channels of {}: {}", name, e);
        }
        Some(name)
    }

    /// Kick off a background rewrite of the roster snapshot.
    pub(crate) fn refresh_roster(&mut self) {
        let roster = self.roster();
        if let Some(log) = self.log.as_mut() {
            log.spawn_snapshot(roster);
        }
    }

    /// Wait for outstanding roster rewrites.
    pub async fn flush_roster(&mut self) {
        if let Some(log) = self.log.as_mut() {
            log.flush_snapshots().await;
        }
    }
}
