// crates/parley-client/tests/session.rs
//
// Client sessions against a real broker in a temporary run directory.

use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parley_client::{ClientOptions, Ending, Session};
use parley_ipc::{paths, NamedMutex};
use parley_server::{Config, Server};
use tempfile::tempdir;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(String::from)
            .collect()
    }

    async fn wait_for(&self, line: &str) {
        timeout(Duration::from_secs(2), async {
            while !self.lines().iter().any(|l| l == line) {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("never saw {:?}, got {:?}", line, self.lines()));
    }
}

fn options(dir: &Path, id: u32, user: &str, advanced: bool) -> ClientOptions {
    ClientOptions {
        broker: "room".to_string(),
        user: user.to_string(),
        run_dir: dir.to_path_buf(),
        advanced,
        id,
    }
}

fn config(dir: &Path) -> Config {
    Config {
        run_dir: dir.to_path_buf(),
        ..Config::default()
    }
}

#[tokio::test]
async fn chat_then_end_of_input_departs_cleanly() {
    let dir = tempdir().unwrap();
    let server = Server::start("room", config(dir.path())).unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serve = server.run(async move {
        let _ = stop_rx.await;
    });

    let chat = async {
        let session = Session::join(&options(dir.path(), 1, "ann", false)).await.unwrap();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let out = SharedBuf::default();

        let driver = {
            let out = out.clone();
            async move {
                out.wait_for("-- ann JOINED --").await;
                input_tx.send("hello\n".to_string()).unwrap();
                input_tx.send(String::new()).unwrap();
                out.wait_for("[ann] : hello").await;
                // Dropping the sender is end of input.
            }
        };

        let (ending, ()) = tokio::join!(
            session.run(input_rx, out.clone(), std::future::pending()),
            driver
        );
        let _ = stop_tx.send(());
        (ending.unwrap(), out)
    };

    let (served, (ending, out)) = tokio::join!(serve, chat);
    served.unwrap();

    assert_eq!(ending, Ending::Departed);
    assert_eq!(out.lines(), vec!["-- ann JOINED --", "[ann] : hello"]);
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn broker_shutdown_ends_the_session_while_input_is_open() {
    let dir = tempdir().unwrap();
    let server = Server::start("room", config(dir.path())).unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serve = server.run(async move {
        let _ = stop_rx.await;
    });

    let chat = async {
        let session = Session::join(&options(dir.path(), 1, "ann", false)).await.unwrap();
        let (_input_tx, input_rx) = mpsc::unbounded_channel();
        let out = SharedBuf::default();

        let driver = {
            let out = out.clone();
            async move {
                out.wait_for("-- ann JOINED --").await;
                let _ = stop_tx.send(());
            }
        };

        let (ending, ()) = tokio::join!(
            session.run(input_rx, out.clone(), std::future::pending()),
            driver
        );
        (ending.unwrap(), out)
    };

    let (served, (ending, out)) = tokio::join!(serve, chat);
    served.unwrap();

    assert_eq!(ending, Ending::Shutdown);
    assert_eq!(
        out.lines(),
        vec!["-- ann JOINED --", "!!! server is shutting down !!!"]
    );
}

#[tokio::test]
async fn full_broker_rejects_and_the_client_cleans_up() {
    let dir = tempdir().unwrap();
    let server = Server::start(
        "room",
        Config {
            max_clients: 1,
            ..config(dir.path())
        },
    )
    .unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serve = server.run(async move {
        let _ = stop_rx.await;
    });

    let chat = async {
        let ann = Session::join(&options(dir.path(), 1, "ann", false)).await.unwrap();
        let (_ann_input, ann_rx) = mpsc::unbounded_channel();
        let ann_out = SharedBuf::default();

        let bob_opts = options(dir.path(), 2, "bob", false);
        let rest = {
            let ann_out = ann_out.clone();
            async move {
                ann_out.wait_for("-- ann JOINED --").await;

                let bob = Session::join(&bob_opts).await.unwrap();
                let (_bob_input, bob_rx) = mpsc::unbounded_channel();
                let bob_out = SharedBuf::default();
                let ending = bob
                    .run(bob_rx, bob_out.clone(), std::future::pending())
                    .await
                    .unwrap();
                let _ = stop_tx.send(());
                (ending, bob_out)
            }
        };

        let (ann_ending, (bob_ending, bob_out)) = tokio::join!(
            ann.run(ann_rx, ann_out.clone(), std::future::pending()),
            rest
        );
        assert_eq!(ann_ending.unwrap(), Ending::Shutdown);
        (bob_ending, bob_out, ann_out)
    };

    let (served, (bob_ending, bob_out, ann_out)) = tokio::join!(serve, chat);
    served.unwrap();

    assert_eq!(bob_ending, Ending::Rejected);
    assert_eq!(bob_out.lines(), vec!["!!! join rejected: server is full !!!"]);
    assert!(!ann_out.lines().iter().any(|l| l.contains("bob")));
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn last_command_replays_the_log_including_itself() {
    let dir = tempdir().unwrap();
    let server = Server::start(
        "room",
        Config {
            advanced: true,
            ..config(dir.path())
        },
    )
    .unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serve = server.run(async move {
        let _ = stop_rx.await;
    });

    let chat = async {
        let session = Session::join(&options(dir.path(), 1, "ann", true)).await.unwrap();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let out = SharedBuf::default();

        let driver = {
            let out = out.clone();
            async move {
                out.wait_for("-- ann JOINED --").await;
                input_tx.send("first".to_string()).unwrap();
                out.wait_for("[ann] : first").await;
                input_tx.send("%last 2".to_string()).unwrap();
                out.wait_for("LAST 2 MESSAGES").await;
                drop(input_tx);
            }
        };

        let (ending, ()) = tokio::join!(
            session.run(input_rx, out.clone(), std::future::pending()),
            driver
        );
        let _ = stop_tx.send(());
        (ending.unwrap(), out)
    };

    let (served, (ending, out)) = tokio::join!(serve, chat);
    served.unwrap();

    assert_eq!(ending, Ending::Departed);
    assert_eq!(
        out.lines(),
        vec![
            "-- ann JOINED --",
            "[ann] : first",
            "[ann] : %last 2",
            "====================",
            "LAST 2 MESSAGES",
            "[ann] : first",
            "[ann] : %last 2",
            "====================",
        ]
    );
}

#[tokio::test]
async fn joining_a_missing_broker_fails_without_leaving_fifos() {
    let dir = tempdir().unwrap();
    let err = Session::join(&options(dir.path(), 1, "ann", false))
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("no broker named room"));
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn failed_join_removes_the_client_fifos() {
    let dir = tempdir().unwrap();
    // Something that is not a FIFO sits where the join endpoint should be.
    let join_path = paths::join_fifo(dir.path(), "room");
    std::fs::write(&join_path, b"not a pipe").unwrap();

    let err = Session::join(&options(dir.path(), 1, "ann", false))
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("joining room"));

    let left: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(left, vec![join_path]);
}

#[tokio::test]
async fn waiting_on_the_log_mutex_does_not_stall_other_tasks() {
    let dir = tempdir().unwrap();
    let server = Server::start(
        "room",
        Config {
            advanced: true,
            ..config(dir.path())
        },
    )
    .unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serve = server.run(async move {
        let _ = stop_rx.await;
    });

    let chat = async {
        let ann = Session::join(&options(dir.path(), 1, "ann", true)).await.unwrap();
        let (ann_input, ann_rx) = mpsc::unbounded_channel();
        let ann_out = SharedBuf::default();
        let ann_run = tokio::spawn(ann.run(ann_rx, ann_out.clone(), std::future::pending()));
        ann_out.wait_for("-- ann JOINED --").await;

        let bob = Session::join(&options(dir.path(), 2, "bob", false)).await.unwrap();
        let (bob_input, bob_rx) = mpsc::unbounded_channel();
        let bob_out = SharedBuf::default();
        let bob_run = tokio::spawn(bob.run(bob_rx, bob_out.clone(), std::future::pending()));
        bob_out.wait_for("-- bob JOINED --").await;

        // While the roster is locked, ann's %who cannot finish, but the
        // broker and bob keep running on this same thread.
        let mutex = NamedMutex::open(paths::lock_file(dir.path(), "room")).unwrap();
        let guard = mutex.lock().unwrap();
        ann_input.send("%who".to_string()).unwrap();
        bob_out.wait_for("[ann] : %who").await;
        assert!(!ann_out.lines().iter().any(|l| l == "[ann] : %who"));

        drop(guard);
        ann_out.wait_for("[ann] : %who").await;
        assert!(ann_out.lines().iter().any(|l| l.ends_with(" CLIENTS")));

        drop(ann_input);
        drop(bob_input);
        assert_eq!(ann_run.await.unwrap().unwrap(), Ending::Departed);
        assert_eq!(bob_run.await.unwrap().unwrap(), Ending::Departed);
        let _ = stop_tx.send(());
    };

    let (served, ()) = tokio::join!(serve, chat);
    served.unwrap();
}
