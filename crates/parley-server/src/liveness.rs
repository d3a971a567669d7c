//! Liveness tick: advance the clock, ping everyone, evict the silent.

use tracing::{debug, warn};

use parley_core::Message;

use crate::error::BrokerError;
use crate::server::Server;

impl Server {
    /// Run one liveness tick.
    ///
    /// A client is evicted once `disconnect_after` ticks have passed since
    /// the broker last heard from it. Every eviction is announced with
    /// `Disconnected`. The roster snapshot is rewritten in the background
    /// afterwards.
    pub async fn tick(&mut self) -> Result<(), BrokerError> {
        let now = self.clock.advance();
        debug!("tick {}", now);

        self.broadcast(&Message::ping("")).await?;

        let mut idx = 0;
        while idx < self.clients.len() {
            let age = match self.clients.get(idx) {
                Some(client) => self.clock.age(client.last_contact),
                None => break,
            };

            if age < self.config.disconnect_after {
                idx += 1;
                continue;
            }

            // The next client shifts into `idx`; examine it on the next pass.
            if let Some(name) = self.remove_client(idx) {
                warn!("{} (slot {}) silent for {} ticks, disconnecting", name, idx, age);
                self.broadcast(&Message::disconnected(name)).await?;
            }
        }

        self.refresh_roster();
        Ok(())
    }
}
