//! Shared types for the broker.
//!
//! This module defines:
//! - `ClientRecord`: one connected client, owned by the registry
//! - `Readiness`: which sources the last readiness wait found readable

use parley_ipc::ChannelPair;

/// One connected client.
#[derive(Debug)]
pub struct ClientRecord {
    pub name: String,

    /// Inbound (client -> broker) and outbound (broker -> client) channels.
    pub channels: ChannelPair,

    /// Logical time of the last message received from this client.
    pub last_contact: u64,

    /// Set by the readiness wait, cleared when the client is handled.
    pub data_ready: bool,
}

impl ClientRecord {
    pub fn new(name: String, channels: ChannelPair, now: u64) -> Self {
        ClientRecord {
            name,
            channels,
            last_contact: now,
            data_ready: false,
        }
    }
}

/// Result of one readiness wait.
///
/// `clients[i]` refers to registry slot `i` at the time of the wait.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readiness {
    pub join: bool,
    pub clients: Vec<bool>,
}

impl Readiness {
    pub fn idle(client_count: usize) -> Self {
        Readiness {
            join: false,
            clients: vec![false; client_count],
        }
    }

    pub fn any(&self) -> bool {
        self.join || self.clients.iter().any(|&ready| ready)
    }
}
