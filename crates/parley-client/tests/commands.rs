use parley_client::commands::{command_output, present};
use parley_client::showlog;
use parley_core::{ChatCommand, Message, Roster};
use parley_ipc::{paths, ActivityLog, IpcError, LogReader, NamedMutex};
use tempfile::{tempdir, TempDir};

fn seeded_log(dir: &TempDir) -> ActivityLog {
    let mut log = ActivityLog::create(
        paths::log_file(dir.path(), "room"),
        paths::lock_file(dir.path(), "room"),
    )
    .unwrap();
    log.append(&Message::joined("ann")).unwrap();
    log.append(&Message::joined("bob")).unwrap();
    log.append(&Message::chat("ann", "hi bob")).unwrap();
    log.write_snapshot(&Roster::new(vec!["ann".to_string(), "bob".to_string()]))
        .unwrap();
    log
}

fn reader(dir: &TempDir) -> LogReader {
    LogReader::open(paths::log_file(dir.path(), "room"))
        .unwrap()
        .with_mutex(NamedMutex::open(paths::lock_file(dir.path(), "room")).unwrap())
}

#[tokio::test]
async fn who_prints_the_roster_between_rules() {
    let dir = tempdir().unwrap();
    let log = seeded_log(&dir);

    assert_eq!(
        command_output(ChatCommand::Who, &reader(&dir)).unwrap(),
        vec!["====================", "2 CLIENTS", "0: ann", "1: bob", "===================="]
    );

    log.close().await.unwrap();
}

#[tokio::test]
async fn last_is_bounded_by_what_the_log_holds() {
    let dir = tempdir().unwrap();
    let log = seeded_log(&dir);

    assert_eq!(
        command_output(ChatCommand::Last(10), &reader(&dir)).unwrap(),
        vec![
            "====================",
            "LAST 10 MESSAGES",
            "-- ann JOINED --",
            "-- bob JOINED --",
            "[ann] : hi bob",
            "====================",
        ]
    );

    log.close().await.unwrap();
}

#[tokio::test]
async fn commands_only_run_for_chat_with_a_log() {
    let dir = tempdir().unwrap();
    let log = seeded_log(&dir);
    let reader = reader(&dir);

    let who = Message::chat("bob", "%who");
    assert_eq!(present(&who, None), vec!["[bob] : %who"]);
    assert_eq!(present(&who, Some(&reader)).len(), 1 + 5);

    // Not a chat record, so the body is never inspected.
    let odd = Message {
        body: "%who".to_string(),
        ..Message::joined("bob")
    };
    assert_eq!(present(&odd, Some(&reader)), vec!["-- bob JOINED --"]);

    assert!(present(&Message::ping(""), Some(&reader)).is_empty());

    log.close().await.unwrap();
}

#[tokio::test]
async fn showlog_dumps_roster_then_messages() {
    let dir = tempdir().unwrap();
    let log = seeded_log(&dir);

    let lines = showlog::dump(&LogReader::open(paths::log_file(dir.path(), "room")).unwrap()).unwrap();
    assert_eq!(
        lines,
        vec![
            "2 CLIENTS",
            "0: ann",
            "1: bob",
            "MESSAGES",
            "-- ann JOINED --",
            "-- bob JOINED --",
            "[ann] : hi bob",
        ]
    );

    log.close().await.unwrap();
}

#[test]
fn showlog_refuses_a_file_that_is_not_a_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"just some text").unwrap();

    let err = showlog::dump(&LogReader::open(&path).unwrap()).unwrap_err();
    assert!(matches!(err, IpcError::Io { .. } | IpcError::CorruptLog { .. }));
}
