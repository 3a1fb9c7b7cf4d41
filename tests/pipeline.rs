//! End-to-end runs of the pipeline over an in-memory channel

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use meta_sniffer::{AuthorStatistic, Event, MetaSniffer};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn counts_only_files_with_author_inside_the_window() {
    let root = tempdir().unwrap();
    let channel = Arc::new(FakeChannel::with_messages(vec![
        pdf(1, "a.pdf", day(3), json!({"Author": "Alice"})),
        pdf(2, "b.pdf", day(4), json!({"Title": "Meeting notes"})),
        attachment(
            3,
            "notes.docx",
            "application/msword",
            day(5),
            exif(json!({"Author": "Dan"})),
        ),
        text(5, day(6)),
        pdf(4, "late.pdf", day(20), json!({"Author": "Mallory"})),
    ]));
    let extractor = Arc::new(JsonFileExtractor::default());
    let sniffer = sniffer(root.path(), Arc::clone(&channel), extractor);

    let report = sniffer
        .run_with_report("docs", Some(day(10)), Some(day(1)))
        .await
        .unwrap();

    assert_eq!(
        report.statistics,
        vec![AuthorStatistic {
            author: "Alice".into(),
            count: 1
        }]
    );
    assert_eq!(report.files_fetched, 2);
    assert_eq!(report.records_dropped, 1);
    assert_eq!(report.records_retained(), 1);
    assert_eq!(channel.downloaded(), vec![1, 2]);
}

#[tokio::test]
async fn same_author_from_different_fields_is_counted_together() {
    let root = tempdir().unwrap();
    let channel = Arc::new(FakeChannel::with_messages(vec![
        pdf(1, "one.pdf", day(1), json!({"Creator": "Carol"})),
        pdf(2, "two.pdf", day(2), json!({"Author": "Carol", "Creator": "Dave"})),
    ]));
    let sniffer = sniffer(
        root.path(),
        channel,
        Arc::new(JsonFileExtractor::default()),
    );

    let stats = sniffer.run("docs", None, None).await.unwrap();

    assert_eq!(
        stats,
        vec![AuthorStatistic {
            author: "Carol".into(),
            count: 2
        }]
    );
}

#[tokio::test]
async fn extraction_failure_drops_the_file() {
    let root = tempdir().unwrap();
    let channel = Arc::new(FakeChannel::with_messages(vec![attachment(
        1,
        "broken.pdf",
        "application/pdf",
        day(1),
        BROKEN_PAYLOAD.to_string(),
    )]));
    let sniffer = sniffer(
        root.path(),
        channel,
        Arc::new(JsonFileExtractor::default()),
    );

    let report = sniffer.run_with_report("docs", None, None).await.unwrap();

    assert!(report.statistics.is_empty());
    assert_eq!(report.files_fetched, 1);
    assert_eq!(report.extraction_failures, 1);
    assert_eq!(report.records_dropped, 1);
}

#[tokio::test]
async fn empty_channel_gives_empty_result() {
    let root = tempdir().unwrap();
    let channel = Arc::new(FakeChannel::default());
    let extractor = Arc::new(JsonFileExtractor::default());
    let sniffer = sniffer(root.path(), Arc::clone(&channel), Arc::clone(&extractor));

    let stats = sniffer.run("docs", None, None).await.unwrap();

    assert!(stats.is_empty());
    assert_eq!(extractor.started.load(Ordering::SeqCst), 0);
    assert_eq!(channel.disconnects.load(Ordering::SeqCst), 1);
    assert!(dir_entries(sniffer.storage_dir()).is_empty());
}

#[tokio::test]
async fn files_exist_during_extraction_and_are_gone_afterwards() {
    let root = tempdir().unwrap();
    let channel = Arc::new(FakeChannel::with_messages(vec![
        pdf(1, "a.pdf", day(1), json!({"Author": "Alice"})),
        pdf(2, "b.pdf", day(2), json!({"Author": "Bob"})),
        attachment(3, "c.pdf", "application/pdf", day(3), BROKEN_PAYLOAD.into()),
    ]));
    let extractor = Arc::new(JsonFileExtractor::default());
    let sniffer = sniffer(root.path(), channel, Arc::clone(&extractor));

    sniffer.run("docs", None, None).await.unwrap();

    let seen = extractor.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|(path, existed)| *existed && path.starts_with(sniffer.storage_dir())));
    assert!(sniffer.storage_dir().is_dir());
    assert!(dir_entries(sniffer.storage_dir()).is_empty());
}

#[tokio::test]
async fn leftovers_from_a_previous_run_are_removed() {
    let root = tempdir().unwrap();
    let downloads = root.path().join("downloads");
    std::fs::create_dir_all(downloads.join("nested")).unwrap();
    std::fs::write(downloads.join("stale.pdf"), "old").unwrap();

    let sniffer = sniffer(
        root.path(),
        Arc::new(FakeChannel::default()),
        Arc::new(JsonFileExtractor::default()),
    );
    sniffer.run("docs", None, None).await.unwrap();

    assert!(dir_entries(&downloads).is_empty());
}

#[tokio::test]
async fn connection_failure_is_reported_as_empty_result() {
    let root = tempdir().unwrap();
    let channel = Arc::new(FakeChannel {
        messages: vec![pdf(1, "a.pdf", day(1), json!({"Author": "Alice"}))],
        refuse_connect: true,
        ..Default::default()
    });
    let sniffer = sniffer(
        root.path(),
        Arc::clone(&channel),
        Arc::new(JsonFileExtractor::default()),
    );

    let stats = sniffer.run("docs", None, None).await.unwrap();

    assert!(stats.is_empty());
    assert!(channel.downloaded().is_empty());
    assert_eq!(channel.disconnects.load(Ordering::SeqCst), 1);
    assert!(dir_entries(sniffer.storage_dir()).is_empty());
}

#[tokio::test]
async fn before_bound_is_exclusive() {
    let root = tempdir().unwrap();
    let channel = Arc::new(FakeChannel::with_messages(vec![
        pdf(1, "edge.pdf", day(5), json!({"Author": "Edge"})),
        pdf(2, "inside.pdf", day(4), json!({"Author": "Inside"})),
        pdf(3, "start.pdf", day(1), json!({"Author": "Start"})),
    ]));
    let sniffer = sniffer(
        root.path(),
        Arc::clone(&channel),
        Arc::new(JsonFileExtractor::default()),
    );

    let stats = sniffer.run("docs", Some(day(5)), Some(day(1))).await.unwrap();

    assert_eq!(as_map(&stats), HashMap::from([("Inside".to_string(), 1)]));
    assert_eq!(channel.downloaded(), vec![2]);
}

#[tokio::test]
async fn duplicate_file_names_keep_the_last_download() {
    let root = tempdir().unwrap();
    let channel = Arc::new(FakeChannel::with_messages(vec![
        pdf(1, "report.pdf", day(1), json!({"Author": "First"})),
        pdf(2, "report.pdf", day(2), json!({"Author": "Second"})),
    ]));
    let sniffer = sniffer(
        root.path(),
        channel,
        Arc::new(JsonFileExtractor::default()),
    );

    let report = sniffer.run_with_report("docs", None, None).await.unwrap();

    assert_eq!(report.files_fetched, 2);
    assert_eq!(as_map(&report.statistics), HashMap::from([("Second".to_string(), 2)]));
}

#[tokio::test]
async fn counts_add_up_to_retained_records() {
    let root = tempdir().unwrap();
    let authors = ["Ann", "Ben", "Ann", "Cid", "", "Ann", "Ben"];
    let messages = authors
        .iter()
        .enumerate()
        .map(|(i, author)| {
            pdf(
                i as i64 + 1,
                &format!("doc{i}.pdf"),
                day(1),
                json!({"Author": author}),
            )
        })
        .collect();
    let sniffer = sniffer(
        root.path(),
        Arc::new(FakeChannel::with_messages(messages)),
        Arc::new(JsonFileExtractor::default()),
    );

    let report = sniffer.run_with_report("docs", None, None).await.unwrap();

    let total: usize = report.statistics.iter().map(|s| s.count).sum();
    assert_eq!(total, report.records_retained());
    assert_eq!(total, 6);
    assert_eq!(report.records_dropped, 1);
    assert!(report.statistics.windows(2).all(|w| w[0].count >= w[1].count));
    assert_eq!(report.statistics[0].author, "Ann");
    assert!(report.records.iter().all(|r| r.creation_date == "Unknown"));
}

#[tokio::test]
async fn cancellation_during_extraction_still_cleans_storage() {
    let root = tempdir().unwrap();
    let channel = Arc::new(FakeChannel::with_messages(vec![pdf(
        1,
        "slow.pdf",
        day(1),
        json!({"Author": "Slow"}),
    )]));
    let extractor = Arc::new(JsonFileExtractor {
        hold_until: Some(CancellationToken::new()),
        ..Default::default()
    });
    let sniffer = sniffer(root.path(), channel, Arc::clone(&extractor));

    let token = sniffer.cancel_token();
    let watcher = Arc::clone(&extractor);
    tokio::spawn(async move {
        while watcher.started.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        token.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(10), sniffer.run("docs", None, None))
        .await
        .expect("run should stop after cancellation");

    assert!(is_cancelled(&result.unwrap_err()));
    assert!(dir_entries(sniffer.storage_dir()).is_empty());
}

#[tokio::test]
async fn cancellation_during_download_still_cleans_storage() {
    let root = tempdir().unwrap();
    let channel = Arc::new(FakeChannel {
        hold_download: Some(CancellationToken::new()),
        ..FakeChannel::with_messages(vec![pdf(1, "a.pdf", day(1), json!({"Author": "Alice"}))])
    });
    let extractor = Arc::new(JsonFileExtractor::default());
    let sniffer = sniffer(root.path(), Arc::clone(&channel), Arc::clone(&extractor));

    let token = sniffer.cancel_token();
    let watcher = Arc::clone(&channel);
    tokio::spawn(async move {
        while watcher.download_started.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        token.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(10), sniffer.run("docs", None, None))
        .await
        .expect("run should stop after cancellation");

    assert!(is_cancelled(&result.unwrap_err()));
    assert_eq!(channel.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(extractor.started.load(Ordering::SeqCst), 0);
    assert!(dir_entries(sniffer.storage_dir()).is_empty());
}

#[tokio::test]
async fn failed_cleanup_does_not_change_the_result() {
    let root = tempdir().unwrap();
    let storage_dir = root.path().join("downloads");
    let hook_dir = storage_dir.clone();
    let channel = Arc::new(FakeChannel::with_messages(vec![
        pdf(1, "a.pdf", day(1), json!({"Author": "Alice"})),
        pdf(2, "b.pdf", day(2), json!({"Title": "Minutes"})),
    ]));
    let reads = AtomicUsize::new(0);
    let extractor = Arc::new(JsonFileExtractor {
        // Once both files are read, a plain file where the directory was
        // makes the release fail
        after_read: Some(Box::new(move |_: &std::path::Path| {
            if reads.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                std::fs::remove_dir_all(&hook_dir).unwrap();
                std::fs::write(&hook_dir, "not a directory").unwrap();
            }
        })),
        ..Default::default()
    });
    let sniffer = sniffer(root.path(), channel, extractor);
    assert_eq!(sniffer.storage_dir(), storage_dir.as_path());

    let report = sniffer.run_with_report("docs", None, None).await.unwrap();

    assert_eq!(
        report.statistics,
        vec![AuthorStatistic {
            author: "Alice".into(),
            count: 1
        }]
    );
    assert_eq!(report.files_fetched, 2);
    assert_eq!(report.records_dropped, 1);
    assert!(sniffer.storage_dir().is_file());
}

#[tokio::test]
async fn unrecoverable_extraction_error_aborts_the_run() {
    let root = tempdir().unwrap();
    let channel = Arc::new(FakeChannel::with_messages(vec![pdf(
        1,
        "a.pdf",
        day(1),
        json!({"Author": "Alice"}),
    )]));
    let extractor = Arc::new(JsonFileExtractor {
        fail_with: Some(|| meta_sniffer::Error::Other("extractor misconfigured".into())),
        ..Default::default()
    });
    let sniffer = sniffer(root.path(), channel, extractor);

    let err = sniffer.run("docs", None, None).await.unwrap_err();

    assert!(matches!(err, meta_sniffer::Error::Other(ref msg) if msg.contains("misconfigured")));
    assert!(dir_entries(sniffer.storage_dir()).is_empty());
}

#[tokio::test]
async fn progress_events_are_published() {
    let root = tempdir().unwrap();
    let channel = Arc::new(FakeChannel::with_messages(vec![
        pdf(1, "a.pdf", day(1), json!({"Author": "Alice"})),
        text(2, day(2)),
    ]));
    let sniffer: MetaSniffer = sniffer(
        root.path(),
        channel,
        Arc::new(JsonFileExtractor::default()),
    );
    let mut events = sniffer.subscribe();

    sniffer.run("docs", None, None).await.unwrap();

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert!(matches!(received.first(), Some(Event::FetchStarted { channel }) if channel == "docs"));
    assert!(
        received
            .iter()
            .any(|e| matches!(e, Event::FileFetched { file_name, .. } if file_name == "a.pdf"))
    );
    assert!(
        received
            .iter()
            .any(|e| matches!(e, Event::FetchComplete { files: 1, failures: 0 }))
    );
    assert!(received.iter().any(|e| matches!(
        e,
        Event::MetadataExtracted { done: 1, total: 1, author: Some(a) } if a == "Alice"
    )));
    assert!(matches!(
        received.last(),
        Some(Event::AnalysisComplete { authors: 1, records: 1 })
    ));
}

#[cfg(unix)]
mod with_exiftool_binary {
    use super::*;
    use meta_sniffer::metadata::CliMetadataExtractor;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    /// Stand-in for exiftool that prints the file it is given (`-json <path>`)
    fn echo_exiftool(dir: &std::path::Path) -> PathBuf {
        let script = dir.join("exiftool");
        std::fs::write(&script, "#!/bin/sh\ncat \"$2\"\n").unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();
        script
    }

    #[tokio::test]
    async fn pipeline_runs_through_the_command_line_tool() {
        let root = tempdir().unwrap();
        let tools = tempdir().unwrap();
        let channel = Arc::new(FakeChannel::with_messages(vec![
            pdf(
                1,
                "a.pdf",
                day(1),
                json!({"Author": "Alice", "CreateDate": "2023:01:02 03:04:05"}),
            ),
            pdf(2, "b.pdf", day(2), json!({"Artist": "Bob"})),
            attachment(3, "c.pdf", "application/pdf", day(3), BROKEN_PAYLOAD.into()),
        ]));
        let extractor = Arc::new(CliMetadataExtractor::new(echo_exiftool(tools.path())));
        let sniffer = MetaSniffer::new(test_config(root.path()), channel, extractor);

        let report = sniffer.run_with_report("docs", None, None).await.unwrap();

        assert_eq!(
            as_map(&report.statistics),
            HashMap::from([("Alice".to_string(), 1), ("Bob".to_string(), 1)])
        );
        assert_eq!(report.extraction_failures, 1);
        let alice = report.records.iter().find(|r| r.author == "Alice").unwrap();
        assert_eq!(alice.file, "a.pdf");
        assert_eq!(alice.creation_date, "2023:01:02 03:04:05");
        assert!(dir_entries(sniffer.storage_dir()).is_empty());
    }
}
