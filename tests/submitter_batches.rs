mod common;

use common::RecordingClient;
use pdns_sensor::domain::submitter::{BatchSubmitter, TickReport};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn domains(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("d{}.example.com", i)).collect()
}

#[tokio::test]
async fn test_chunking_boundaries() {
    let cases = [
        (0, 1024, vec![]),
        (1, 1024, vec![1]),
        (1024, 1024, vec![1024]),
        (1025, 1024, vec![1024, 1]),
        (2500, 1024, vec![1024, 1024, 452]),
        (5, 2, vec![2, 2, 1]),
    ];

    for (count, max, expected) in cases {
        let client = Arc::new(RecordingClient::new());
        let submitter = BatchSubmitter::new(client.clone(), Duration::from_secs(60), max);

        let input = domains(count);
        let report = submitter.submit_batches(&input).await;

        let sizes: Vec<usize> = client.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, expected, "{count} domains, max {max}");
        assert_eq!(report.batches, expected.len());
        // Concatenated batches reproduce the drained order.
        assert_eq!(client.delivered(), input);
    }
}

#[tokio::test]
async fn test_failed_batch_does_not_stop_the_rest() {
    let client = Arc::new(RecordingClient::failing_on(&[2]));
    let submitter = BatchSubmitter::new(client.clone(), Duration::from_secs(60), 1024);

    let report = submitter.submit_batches(&domains(2500)).await;

    assert_eq!(
        report,
        TickReport {
            drained: 2500,
            batches: 3,
            failed_batches: 1,
            failed_domains: 1024,
        }
    );
    assert_eq!(client.batches().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_run_drains_every_interval() {
    let queue = common::memory_queue();
    let client = Arc::new(RecordingClient::new());
    let submitter = BatchSubmitter::new(client.clone(), Duration::from_secs(60), 1024);
    let shutdown = CancellationToken::new();

    let task = tokio::spawn(submitter.run(queue.clone(), shutdown.clone()));

    queue.add("example.com").await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    // First tick fires one interval after start.
    assert!(client.batches().is_empty());

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(client.batches(), vec![vec!["example.com".to_string()]]);

    // Nothing pending: ticks submit nothing.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(client.batches().len(), 1);

    queue.add("example.org").await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(client.batches().len(), 2);

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_flushes_pending_domains() {
    let queue = common::memory_queue();
    let client = Arc::new(RecordingClient::new());
    let submitter = BatchSubmitter::new(client.clone(), Duration::from_secs(60), 1024);
    let shutdown = CancellationToken::new();

    let task = tokio::spawn(submitter.run(queue.clone(), shutdown.clone()));

    queue.add("example.com").await;
    queue.add("example.net").await;
    shutdown.cancel();
    task.await.unwrap();

    assert_eq!(
        client.batches(),
        vec![vec!["example.com".to_string(), "example.net".to_string()]]
    );
    assert_eq!(queue.count().await, 0);
}
