//! Broker context and top-level loop.
//!
//! This module:
//! - Creates the join endpoint (and, in advanced mode, the activity log and
//!   its named mutex) in the configured run directory.
//! - Owns the client registry, the logical clock and the log handle.
//! - Runs the dispatch loop: wait for readiness, a tick or shutdown, then
//!   handle what woke it.
//! - Tears everything down on shutdown.
//!
//! Message handling and fan-out live in `dispatch`, the ping/eviction
//! pass in `liveness`.

use std::future::{poll_fn, Future};
use std::path::Path;
use std::task::Poll;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use parley_core::{LogicalClock, Message, Registry, Roster};
use parley_ipc::{paths, ActivityLog, JoinEndpoint};

use crate::config::Config;
use crate::dispatch::ClientOutcome;
use crate::error::BrokerError;
use crate::types::{ClientRecord, Readiness};

/// The broker: single owner of every piece of broker state.
#[derive(Debug)]
pub struct Server {
    pub(crate) name: String,
    pub(crate) config: Config,
    pub(crate) join: JoinEndpoint,
    pub(crate) join_ready: bool,
    pub(crate) clients: Registry<ClientRecord>,
    pub(crate) clock: LogicalClock,
    pub(crate) log: Option<ActivityLog>,
}

/// What ended one readiness wait.
enum Wake {
    Shutdown,
    Tick,
    Ready(Result<Readiness, BrokerError>),
}

impl Server {
    /// Create the broker's artifacts and return a server with no clients.
    ///
    /// The log is created before the join endpoint, so any client able to
    /// join finds an initialised log.
    pub fn start(name: &str, config: Config) -> Result<Self, BrokerError> {
        config.validate()?;
        if name.is_empty() || name.contains('/') {
            return Err(BrokerError::Config(format!("invalid broker name {:?}", name)));
        }

        let log = if config.advanced {
            let log = ActivityLog::create(
                paths::log_file(&config.run_dir, name),
                paths::lock_file(&config.run_dir, name),
            )
            .map_err(BrokerError::Startup)?;
            Some(log)
        } else {
            None
        };

        let join = JoinEndpoint::open(paths::join_fifo(&config.run_dir, name))
            .map_err(BrokerError::Startup)?;

        info!(
            "broker {} listening on {} (max_clients = {}, advanced = {})",
            name,
            join.path().display(),
            config.max_clients,
            config.advanced
        );

        Ok(Server {
            name: name.to_string(),
            clients: Registry::new(config.max_clients),
            config,
            join,
            join_ready: false,
            clock: LogicalClock::new(),
            log,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn join_path(&self) -> &Path {
        self.join.path()
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log.as_ref().map(|log| log.path())
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Connected names in registry order.
    pub fn client_names(&self) -> Vec<String> {
        self.clients.iter().map(|c| c.name.clone()).collect()
    }

    pub fn roster(&self) -> Roster {
        Roster::new(self.client_names())
    }

    pub fn clock(&self) -> u64 {
        self.clock.now()
    }

    // ------------------------------------------------------------------------
    // Readiness
    // ------------------------------------------------------------------------

    /// Wait until the join endpoint or at least one client channel is
    /// readable and report which ones are.
    pub async fn wait_ready(&self) -> Result<Readiness, BrokerError> {
        poll_fn(|cx| {
            let mut ready = Readiness::idle(self.clients.len());

            match self.join.poll_read_ready(cx) {
                Poll::Ready(Ok(())) => ready.join = true,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(BrokerError::Join(e))),
                Poll::Pending => {}
            }

            for (idx, client) in self.clients.iter().enumerate() {
                match client.channels.poll_recv_ready(cx) {
                    Poll::Ready(Ok(())) => ready.clients[idx] = true,
                    Poll::Ready(Err(e)) => {
                        return Poll::Ready(Err(BrokerError::client(idx, &client.name, e)))
                    }
                    Poll::Pending => {}
                }
            }

            if ready.any() {
                Poll::Ready(Ok(ready))
            } else {
                Poll::Pending
            }
        })
        .await
    }

    /// Record a readiness result as per-source flags.
    pub fn mark_ready(&mut self, ready: Readiness) {
        debug!("readiness: join = {}, clients = {:?}", ready.join, ready.clients);
        self.join_ready = ready.join;
        for (client, flag) in self.clients.iter_mut().zip(ready.clients) {
            client.data_ready = flag;
        }
    }

    /// Handle every flagged source once: the join endpoint first, then
    /// clients in registry order. Returns how many records were read.
    pub async fn dispatch(&mut self) -> Result<usize, BrokerError> {
        let mut handled = 0;
        if self.join_ready && self.handle_join().await? {
            handled += 1;
        }

        let mut idx = 0;
        while idx < self.clients.len() {
            let flagged = self.clients.get(idx).map_or(false, |c| c.data_ready);
            if !flagged {
                idx += 1;
                continue;
            }
            match self.handle_client(idx).await? {
                ClientOutcome::Idle => idx += 1,
                ClientOutcome::Handled => {
                    handled += 1;
                    idx += 1;
                }
                // The next client now sits at `idx`.
                ClientOutcome::Removed => handled += 1,
            }
        }
        Ok(handled)
    }

    /// Wait for and handle at least one record, without ticks or shutdown.
    ///
    /// Passes that only find stale readiness are repeated.
    pub async fn step(&mut self) -> Result<usize, BrokerError> {
        loop {
            let ready = self.wait_ready().await?;
            self.mark_ready(ready);
            let handled = self.dispatch().await?;
            if handled > 0 {
                return Ok(handled);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Main loop
    // ------------------------------------------------------------------------

    /// Run until `shutdown` resolves or a fatal error occurs, then shut down.
    ///
    /// Ticks (advanced mode only) and the shutdown request interrupt the
    /// readiness wait; the wait is simply rebuilt on the next pass.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), BrokerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let period = self.config.tick;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let advanced = self.config.advanced;

        let outcome = loop {
            let wake = tokio::select! {
                biased;
                _ = &mut shutdown => Wake::Shutdown,
                _ = ticker.tick(), if advanced => Wake::Tick,
                ready = self.wait_ready() => Wake::Ready(ready),
            };

            let result = match wake {
                Wake::Shutdown => {
                    info!("shutdown requested");
                    break Ok(());
                }
                Wake::Tick => self.tick().await,
                Wake::Ready(Ok(ready)) => {
                    self.mark_ready(ready);
                    self.dispatch().await.map(|_| ())
                }
                Wake::Ready(Err(e)) => Err(e),
            };

            if let Err(e) = result {
                error!("fatal: {}", e);
                break Err(e);
            }
        };

        let closed = self.shutdown().await;
        outcome.and(closed)
    }

    // ------------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------------

    /// Remove the join endpoint, tell every client the broker is going
    /// away, remove every client and close the log.
    ///
    /// Every step is attempted; the first failure is reported.
    pub async fn shutdown(self) -> Result<(), BrokerError> {
        let Server {
            name,
            join,
            mut clients,
            log,
            ..
        } = self;
        info!("broker {} shutting down ({} clients)", name, clients.len());

        let mut first_err = None;
        let mut keep = |e: BrokerError| {
            error!("shutdown: {}", e);
            if first_err.is_none() {
                first_err = Some(e);
            }
        };

        if let Err(e) = join.close() {
            keep(BrokerError::Join(e));
        }

        let bye = Message::shutdown();
        for (idx, client) in clients.iter().enumerate() {
            if let Err(e) = client.channels.send(&bye).await {
                keep(BrokerError::client(idx, &client.name, e));
            }
        }

        for client in clients.drain_all() {
            let ClientRecord { name, channels, .. } = client;
            if let Err(e) = channels.close() {
                warn!("closing channels of {}: {}", name, e);
            }
        }

        if let Some(mut log) = log {
            if let Err(e) = log.append(&bye) {
                keep(BrokerError::Log(e));
            }
            log.spawn_snapshot(Roster::default());
            if let Err(e) = log.close().await {
                keep(BrokerError::Log(e));
            }
        }

        info!("broker {} stopped", name);
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
