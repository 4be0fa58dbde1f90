mod common;

use pdns_sensor::domain::source::{Source, SourceError};
use pdns_sensor::domain::queue::DomainQueue;
use pdns_sensor::infrastructure::sources::MikrotikLogSource;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const QUERY_A: &str = "Jan 01 12:00:00 dns,packet query from 192.168.1.1#54321: example.com. A\n";
const RESPONSE: &str = "Jan 01 12:00:01 dns,packet response to 192.168.1.1#54321: ignored.example.net. A\n";
const QUERY_AAAA: &str =
    "Jan 01 12:00:02 dns,packet query from 192.168.1.7#40000: www.Example.org. AAAA\n";

async fn wait_for_pending(queue: &DomainQueue, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while queue.count().await < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("domains were not ingested in time");
}

#[tokio::test]
async fn test_follows_appended_lines() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(QUERY_A.as_bytes()).unwrap();
    file.write_all(RESPONSE.as_bytes()).unwrap();
    file.flush().unwrap();

    let queue = common::memory_queue();
    let source = Arc::new(
        MikrotikLogSource::new(queue.clone(), file.path())
            .with_poll_interval(Duration::from_millis(20)),
    );

    let runner = source.clone();
    let task = tokio::spawn(async move { runner.start().await });

    wait_for_pending(&queue, 1).await;

    file.write_all(QUERY_AAAA.as_bytes()).unwrap();
    file.flush().unwrap();

    wait_for_pending(&queue, 2).await;

    source.stop(Duration::from_secs(5)).await.unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(queue.drain().await, vec!["example.com", "www.example.org"]);
}

#[tokio::test]
async fn test_partial_line_waits_for_newline() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let (head, tail) = QUERY_A.split_at(40);
    file.write_all(head.as_bytes()).unwrap();
    file.flush().unwrap();

    let queue = common::memory_queue();
    let source = Arc::new(
        MikrotikLogSource::new(queue.clone(), file.path())
            .with_poll_interval(Duration::from_millis(20)),
    );

    let runner = source.clone();
    let task = tokio::spawn(async move { runner.start().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(queue.count().await, 0);

    file.write_all(tail.as_bytes()).unwrap();
    file.flush().unwrap();

    wait_for_pending(&queue, 1).await;

    source.stop(Duration::from_secs(5)).await.unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(queue.drain().await, vec!["example.com"]);
}

#[tokio::test]
async fn test_missing_file_fails_start() {
    let dir = tempfile::tempdir().unwrap();
    let source = MikrotikLogSource::new(common::memory_queue(), dir.path().join("network.log"));

    assert!(matches!(source.start().await, Err(SourceError::Io(_))));
}

#[tokio::test]
async fn test_non_utf8_line_does_not_stop_the_source() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"Jan 01 11:59:59 system,info user caf\xe9 logged in\n")
        .unwrap();
    file.write_all(QUERY_A.as_bytes()).unwrap();
    file.flush().unwrap();

    let queue = common::memory_queue();
    let source = Arc::new(
        MikrotikLogSource::new(queue.clone(), file.path())
            .with_poll_interval(Duration::from_millis(20)),
    );

    let runner = source.clone();
    let task = tokio::spawn(async move { runner.start().await });

    wait_for_pending(&queue, 1).await;
    assert!(!task.is_finished());

    source.stop(Duration::from_secs(5)).await.unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(queue.drain().await, vec!["example.com"]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_follows_replacement_file_after_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.log");
    std::fs::write(&path, QUERY_A).unwrap();

    let queue = common::memory_queue();
    let source = Arc::new(
        MikrotikLogSource::new(queue.clone(), &path).with_poll_interval(Duration::from_millis(20)),
    );

    let runner = source.clone();
    let task = tokio::spawn(async move { runner.start().await });

    wait_for_pending(&queue, 1).await;

    // The new file is already longer than the old read position.
    std::fs::rename(&path, dir.path().join("network.log.1")).unwrap();
    let mut replacement = RESPONSE.repeat(4);
    replacement.push_str(QUERY_AAAA);
    std::fs::write(&path, replacement).unwrap();

    wait_for_pending(&queue, 2).await;

    source.stop(Duration::from_secs(5)).await.unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(queue.drain().await, vec!["example.com", "www.example.org"]);
}
