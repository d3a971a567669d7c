// crates/parley-client/src/session.rs
//
// One chat session: join, then run an input loop and a listener until
// either side ends, then clean up our FIFOs.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use parley_core::messages::truncate_to_boundary;
use parley_core::{JoinRequest, Message, MessageKind, MAX_BODY_LEN, MAX_NAME_LEN};
use parley_ipc::{fifo, paths, ChannelPair, LogReader, NamedMutex};

use crate::commands::present;

/// Everything needed to join a broker.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub broker: String,
    pub user: String,
    pub run_dir: PathBuf,

    /// Answer `%last` / `%who` from the broker's activity log.
    pub advanced: bool,

    /// Distinguishes this client's FIFOs; the process id in practice.
    pub id: u32,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// We left (end of input or interrupt).
    Departed,
    /// The broker shut down.
    Shutdown,
    /// The broker was full.
    Rejected,
}

pub struct Session {
    user: String,
    channels: Arc<ChannelPair>,
    log: Option<Arc<LogReader>>,
}

impl Session {
    /// Create our FIFOs and ask the broker to let us in.
    pub async fn join(opts: &ClientOptions) -> Result<Session> {
        let user = truncate_to_boundary(&opts.user, MAX_NAME_LEN).to_string();
        if user.is_empty() {
            bail!("user name must not be empty");
        }

        let join_path = paths::join_fifo(&opts.run_dir, &opts.broker);
        if !join_path.exists() {
            bail!("no broker named {} in {}", opts.broker, opts.run_dir.display());
        }

        let (to_server, to_client) = paths::client_fifos(&opts.run_dir, opts.id);
        let channels = ChannelPair::create_for_client(&to_server, &to_client)
            .context("creating client FIFOs")?;

        let request = JoinRequest {
            name: user.clone(),
            inbound_path: to_server.display().to_string(),
            outbound_path: to_client.display().to_string(),
        };
        if let Err(e) = fifo::send_join(&join_path, &request).await {
            if let Err(close_err) = channels.close() {
                warn!("removing client FIFOs after failed join: {}", close_err);
            }
            return Err(e).with_context(|| format!("joining {}", opts.broker));
        }
        info!("sent join for {} to {}", user, join_path.display());

        let log = if opts.advanced {
            open_log(opts).map(Arc::new)
        } else {
            None
        };

        Ok(Session {
            user,
            channels: Arc::new(channels),
            log,
        })
    }

    /// Forward `input` lines as chat until input ends, `interrupt`
    /// resolves or the broker goes away; print what arrives to `out`.
    ///
    /// Our FIFOs are removed before returning.
    pub async fn run<W, I>(
        self,
        input: mpsc::UnboundedReceiver<String>,
        out: W,
        interrupt: I,
    ) -> Result<Ending>
    where
        W: Write + Send + 'static,
        I: Future<Output = ()>,
    {
        let Session {
            user,
            channels,
            log,
        } = self;

        // Both receivers exist before either side can signal.
        let (stop_tx, listener_stop) = broadcast::channel::<()>(1);
        let input_stop = stop_tx.subscribe();

        let listener = tokio::spawn(listen(
            user.clone(),
            Arc::clone(&channels),
            log,
            out,
            stop_tx.clone(),
            listener_stop,
        ));

        let sent = forward_input(&user, &channels, input, interrupt, input_stop).await;
        let _ = stop_tx.send(());

        let heard = listener.await;
        let cleanup = close(channels);

        let ending = match (heard.context("listener task failed")??, sent?) {
            (Some(ending), _) => ending,
            (None, ending) => ending,
        };
        cleanup?;
        Ok(ending)
    }
}

fn open_log(opts: &ClientOptions) -> Option<LogReader> {
    let log_path = paths::log_file(&opts.run_dir, &opts.broker);
    let lock_path = paths::lock_file(&opts.run_dir, &opts.broker);
    let opened = LogReader::open(&log_path)
        .and_then(|reader| Ok(reader.with_mutex(NamedMutex::open(&lock_path)?)));
    match opened {
        Ok(reader) => Some(reader),
        Err(e) => {
            warn!("chat commands unavailable: {}", e);
            None
        }
    }
}

/// Send each input line as a chat record. End of input and `interrupt`
/// both send a departure.
async fn forward_input<I>(
    user: &str,
    channels: &ChannelPair,
    mut input: mpsc::UnboundedReceiver<String>,
    interrupt: I,
    mut stop: broadcast::Receiver<()>,
) -> Result<Ending>
where
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = stop.recv() => {
                debug!("input loop stopped by listener");
                return Ok(Ending::Departed);
            }
            _ = &mut interrupt => break,
            line = input.recv() => match line {
                Some(line) => {
                    let body = truncate_to_boundary(line.trim_end_matches(['\r', '\n']), MAX_BODY_LEN);
                    if body.is_empty() {
                        continue;
                    }
                    channels.send(&Message::chat(user, body)).await.context("sending chat")?;
                }
                None => break,
            },
        }
    }

    channels.send(&Message::departed(user)).await.context("sending departure")?;
    info!("{} departed", user);
    Ok(Ending::Departed)
}

/// Print every record from the broker and answer pings, until the broker
/// says goodbye or the input side stops us.
async fn listen<W>(
    user: String,
    channels: Arc<ChannelPair>,
    log: Option<Arc<LogReader>>,
    mut out: W,
    stop_tx: broadcast::Sender<()>,
    mut stop: broadcast::Receiver<()>,
) -> Result<Option<Ending>>
where
    W: Write,
{
    let result = loop {
        let msg = tokio::select! {
            _ = stop.recv() => break Ok(None),
            msg = channels.recv() => msg,
        };
        let msg = match msg.context("reading from broker") {
            Ok(msg) => msg,
            Err(e) => break Err(e),
        };

        if msg.kind == MessageKind::Ping {
            if let Err(e) = channels.send(&Message::ping(&user)).await {
                break Err(anyhow::Error::new(e).context("answering ping"));
            }
            continue;
        }

        let lines = match presentation(msg.clone(), log.as_ref()).await {
            Ok(lines) => lines,
            Err(e) => break Err(e),
        };
        if let Err(e) = print_lines(&mut out, &lines) {
            break Err(e);
        }

        match msg.kind {
            MessageKind::Shutdown => break Ok(Some(Ending::Shutdown)),
            MessageKind::Rejected => break Ok(Some(Ending::Rejected)),
            _ => {}
        }
    };

    let _ = stop_tx.send(());
    result
}

/// Lines for one record. Reading the log takes the named mutex and does
/// file I/O, so with a log attached the work runs on the blocking pool.
async fn presentation(msg: Message, log: Option<&Arc<LogReader>>) -> Result<Vec<String>> {
    match log {
        Some(log) => {
            let log = Arc::clone(log);
            tokio::task::spawn_blocking(move || present(&msg, Some(&log)))
                .await
                .context("presenting a record")
        }
        None => Ok(present(&msg, None)),
    }
}

fn print_lines<W: Write>(out: &mut W, lines: &[String]) -> Result<()> {
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}

/// Close both channels and remove our FIFOs (the broker may already have).
fn close(channels: Arc<ChannelPair>) -> Result<()> {
    match Arc::try_unwrap(channels) {
        Ok(pair) => pair.close()?,
        Err(shared) => {
            fifo::remove(shared.rx_path())?;
            fifo::remove(shared.tx_path())?;
        }
    }
    Ok(())
}
