//! Integration tests for the download engine.
//!
//! These tests drive full items through `process_batch` / `download_one`
//! against wiremock servers and temporary directories. Truncated and paced
//! bodies come from the raw server in `support::scripted_server`.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use streamfetch_core::download::{
    BatchOptions, DownloadDefaults, DownloadInput, DownloadSpec, DownloadStatus, HttpTransport,
    LogLevel, RecordingSink, TransportOptions, download_one, process_batch,
};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, Request, Respond, ResponseTemplate};

mod support;
use support::scripted_server::{Reply, ScriptedServer};
use support::socket_guard::start_mock_server_or_skip;

fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn options(dir: &Path) -> BatchOptions {
    BatchOptions {
        defaults: DownloadDefaults {
            output_dir: dir.to_path_buf(),
            retry_delay: Duration::ZERO,
            ..DownloadDefaults::default()
        },
        ..BatchOptions::default()
    }
}

fn resume_options(dir: &Path) -> BatchOptions {
    let mut options = options(dir);
    options.defaults.resume = true;
    options
}

/// Fails the first `fail_count` requests with 500, then serves `success_body`.
struct FlakyResponder {
    request_count: Arc<AtomicUsize>,
    fail_count: usize,
    success_body: Vec<u8>,
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.request_count.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_count {
            ResponseTemplate::new(500).set_body_bytes(b"internal server error".to_vec())
        } else {
            ResponseTemplate::new(200).set_body_bytes(self.success_body.clone())
        }
    }
}

#[tokio::test]
async fn test_download_writes_full_body_and_reports_size() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let content = body(5000);

    Mock::given(method("GET"))
        .and(path("/files/image.iso"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sink = RecordingSink::new();
    let url = format!("{}/files/image.iso", mock_server.uri());
    let outcome = download_one(url.as_str().into(), &options(temp_dir.path()), &sink).await;

    assert_eq!(outcome.status, DownloadStatus::Completed, "{:?}", outcome.error);
    assert_eq!(outcome.file_name.as_deref(), Some("image.iso"));
    assert_eq!(outcome.total_bytes, Some(5000));
    assert_eq!(outcome.attempts, 1);
    assert!(!outcome.resume_used);
    assert!(outcome.error.is_none());
    assert!(outcome.average_speed.is_some());
    assert_eq!(outcome.final_url.as_deref(), Some(url.as_str()));

    let file_path = temp_dir.path().join("image.iso");
    assert_eq!(outcome.path.as_deref(), Some(file_path.as_path()));
    assert_eq!(std::fs::read(&file_path).expect("read file"), content);
    assert_eq!(sink.messages(LogLevel::Success).len(), 1);

    let events = sink.progress_events();
    let last = events.last().expect("final progress event");
    assert_eq!(last.bytes, 5000);
    assert_eq!(last.total, Some(5000));
}

#[tokio::test]
async fn test_existing_file_is_skipped_without_request() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let file_path = temp_dir.path().join("report.pdf");
    std::fs::write(&file_path, b"keep me").expect("seed file");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let sink = RecordingSink::new();
    let url = format!("{}/report.pdf", mock_server.uri());
    let outcome = download_one(url.into(), &options(temp_dir.path()), &sink).await;

    assert_eq!(outcome.status, DownloadStatus::Skipped);
    assert_eq!(outcome.total_bytes, Some(7));
    assert_eq!(outcome.attempts, 0);
    assert_eq!(std::fs::read(&file_path).expect("read file"), b"keep me");
    assert!(sink.contains("already exists"));
}

#[tokio::test]
async fn test_force_overwrites_existing_file() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let file_path = temp_dir.path().join("report.pdf");
    std::fs::write(&file_path, b"old content that is longer").expect("seed file");

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
        .mount(&mock_server)
        .await;

    let mut options = options(temp_dir.path());
    options.defaults.force = true;
    let url = format!("{}/report.pdf", mock_server.uri());
    let outcome = download_one(url.into(), &options, &RecordingSink::new()).await;

    assert_eq!(outcome.status, DownloadStatus::Completed);
    assert_eq!(std::fs::read(&file_path).expect("read file"), b"new");
}

#[tokio::test]
async fn test_resume_appends_remainder_byte_identical() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let content = body(5000);
    let file_path = temp_dir.path().join("big.bin");
    std::fs::write(&file_path, &content[..1000]).expect("seed partial file");

    Mock::given(method("GET"))
        .and(path("/big.bin"))
        .and(header("Range", "bytes=1000-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "bytes 1000-4999/5000")
                .set_body_bytes(content[1000..].to_vec()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let sink = RecordingSink::new();
    let url = format!("{}/big.bin", mock_server.uri());
    let outcome = download_one(url.into(), &resume_options(temp_dir.path()), &sink).await;

    assert_eq!(outcome.status, DownloadStatus::Completed, "{:?}", outcome.error);
    assert!(outcome.resume_used);
    assert_eq!(outcome.total_bytes, Some(5000));
    assert_eq!(std::fs::read(&file_path).expect("read file"), content);
    assert!(sink.contains("resuming after"));

    let last = sink.progress_events().pop().expect("final progress event");
    assert_eq!(last.bytes, 5000);
    assert_eq!(last.total, Some(5000));
}

#[tokio::test]
async fn test_mismatched_content_range_restarts_from_zero() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let content = body(5000);
    let file_path = temp_dir.path().join("big.bin");
    std::fs::write(&file_path, b"stale partial data").expect("seed partial file");

    Mock::given(method("GET"))
        .and(path("/big.bin"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "bytes 0-4999/5000")
                .set_body_bytes(content.clone()),
        )
        .mount(&mock_server)
        .await;

    let sink = RecordingSink::new();
    let url = format!("{}/big.bin", mock_server.uri());
    let outcome = download_one(url.into(), &resume_options(temp_dir.path()), &sink).await;

    assert_eq!(outcome.status, DownloadStatus::Completed, "{:?}", outcome.error);
    assert!(!outcome.resume_used);
    assert_eq!(outcome.total_bytes, Some(5000));
    assert_eq!(std::fs::read(&file_path).expect("read file"), content);
    assert_eq!(sink.messages(LogLevel::Warning).len(), 1);
    assert!(sink.contains("restarting from byte 0"));
}

#[tokio::test]
async fn test_server_ignoring_range_restarts_from_zero() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let content = body(3000);
    let file_path = temp_dir.path().join("data.bin");
    std::fs::write(&file_path, &content[..500]).expect("seed partial file");

    Mock::given(method("GET"))
        .and(path("/data.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
        .mount(&mock_server)
        .await;

    let sink = RecordingSink::new();
    let url = format!("{}/data.bin", mock_server.uri());
    let outcome = download_one(url.into(), &resume_options(temp_dir.path()), &sink).await;

    assert_eq!(outcome.status, DownloadStatus::Completed);
    assert!(!outcome.resume_used);
    assert_eq!(std::fs::read(&file_path).expect("read file"), content);
    assert!(sink.contains("ignored the range request"));
}

#[tokio::test]
async fn test_empty_existing_file_with_resume_downloads_fresh() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let file_path = temp_dir.path().join("empty.bin");
    std::fs::write(&file_path, b"").expect("seed empty file");

    Mock::given(method("GET"))
        .and(path("/empty.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .mount(&mock_server)
        .await;

    let url = format!("{}/empty.bin", mock_server.uri());
    let outcome =
        download_one(url.into(), &resume_options(temp_dir.path()), &RecordingSink::new()).await;

    assert_eq!(outcome.status, DownloadStatus::Completed);
    assert!(!outcome.resume_used);
    assert_eq!(std::fs::read(&file_path).expect("read file"), b"payload");

    let requests = mock_server.received_requests().await.expect("recorded requests");
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("range"));
}

#[tokio::test]
async fn test_persistent_failure_uses_every_attempt() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/broken.bin"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let mut options = options(temp_dir.path());
    options.defaults.retry_count = 2;
    let sink = RecordingSink::new();
    let url = format!("{}/broken.bin", mock_server.uri());
    let outcome = download_one(url.into(), &options, &sink).await;

    assert_eq!(outcome.status, DownloadStatus::Failed);
    assert_eq!(outcome.attempts, 3);
    let error = outcome.error.expect("failed outcome carries an error");
    assert!(error.contains("gave up"), "{error}");
    assert!(error.contains("HTTP 500"), "{error}");
    assert_eq!(sink.messages(LogLevel::Warning).len(), 2);
    assert_eq!(sink.messages(LogLevel::Error).len(), 1);
}

#[tokio::test]
async fn test_transient_failures_recover_within_budget() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let request_count = Arc::new(AtomicUsize::new(0));

    Mock::given(method("GET"))
        .and(path("/flaky.bin"))
        .respond_with(FlakyResponder {
            request_count: Arc::clone(&request_count),
            fail_count: 2,
            success_body: b"finally".to_vec(),
        })
        .mount(&mock_server)
        .await;

    let url = format!("{}/flaky.bin", mock_server.uri());
    let outcome =
        download_one(url.into(), &options(temp_dir.path()), &RecordingSink::new()).await;

    assert_eq!(outcome.status, DownloadStatus::Completed, "{:?}", outcome.error);
    assert_eq!(outcome.attempts, 3);
    assert!(outcome.error.is_none());
    assert_eq!(request_count.load(Ordering::SeqCst), 3);
    assert_eq!(
        std::fs::read(temp_dir.path().join("flaky.bin")).expect("read file"),
        b"finally"
    );
}

#[tokio::test]
async fn test_root_url_saves_under_host_name() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<html></html>".to_vec()))
        .mount(&mock_server)
        .await;

    let sink = RecordingSink::new();
    let url = format!("{}/", mock_server.uri());
    let outcome = download_one(url.into(), &options(temp_dir.path()), &sink).await;

    assert_eq!(outcome.status, DownloadStatus::Completed);
    assert_eq!(outcome.file_name.as_deref(), Some("127.0.0.1.download"));
    assert!(temp_dir.path().join("127.0.0.1.download").exists());
    assert!(sink.contains("URL host"));
}

#[tokio::test]
async fn test_redirect_target_is_reported() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let target = format!("{}/mirror/file.tar.gz", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/latest/file.tar.gz"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", target.as_str()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mirror/file.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive".to_vec()))
        .mount(&mock_server)
        .await;

    let url = format!("{}/latest/file.tar.gz", mock_server.uri());
    let outcome =
        download_one(url.into(), &options(temp_dir.path()), &RecordingSink::new()).await;

    assert_eq!(outcome.status, DownloadStatus::Completed);
    assert_eq!(outcome.final_url.as_deref(), Some(target.as_str()));
    assert_eq!(outcome.file_name.as_deref(), Some("file.tar.gz"));
}

#[tokio::test]
async fn test_caller_transport_left_open_and_headers_attached() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/private.bin"))
        .and(header("X-Api-Key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"private".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transport = Arc::new(
        HttpTransport::build(&TransportOptions::default()).expect("build transport"),
    );
    let spec = DownloadSpec {
        transport: Some(Arc::clone(&transport)),
        headers: Some([("X-Api-Key".to_string(), "secret".to_string())].into()),
        ..DownloadSpec::new(format!("{}/private.bin", mock_server.uri()))
    };
    let outcome =
        download_one(spec.into(), &options(temp_dir.path()), &RecordingSink::new()).await;

    assert_eq!(outcome.status, DownloadStatus::Completed, "{:?}", outcome.error);
    assert!(!transport.is_closed());
}

#[tokio::test]
async fn test_caller_transport_closed_when_disposal_requested() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .mount(&mock_server)
        .await;

    let transport = Arc::new(
        HttpTransport::build(&TransportOptions::default()).expect("build transport"),
    );
    let spec = DownloadSpec {
        transport: Some(Arc::clone(&transport)),
        dispose_handle: Some(true),
        ..DownloadSpec::new(format!("{}/a.txt", mock_server.uri()))
    };
    let outcome =
        download_one(spec.into(), &options(temp_dir.path()), &RecordingSink::new()).await;

    assert_eq!(outcome.status, DownloadStatus::Completed);
    assert!(transport.is_closed());
}

#[tokio::test]
async fn test_closed_caller_transport_fails_item() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let transport = Arc::new(
        HttpTransport::build(&TransportOptions::default()).expect("build transport"),
    );
    transport.close();

    let spec = DownloadSpec {
        transport: Some(transport),
        ..DownloadSpec::new("http://127.0.0.1:9/never.bin")
    };
    let outcome =
        download_one(spec.into(), &options(temp_dir.path()), &RecordingSink::new()).await;

    assert_eq!(outcome.status, DownloadStatus::Failed);
    assert_eq!(outcome.attempts, 0);
    assert!(outcome.error.expect("error").contains("closed"));
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let target_dir = temp_dir.path().join("not-yet");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut options = options(&target_dir);
    options.dry_run = true;
    let sink = RecordingSink::new();
    let url = format!("{}/file.zip", mock_server.uri());
    let outcome = download_one(url.into(), &options, &sink).await;

    assert_eq!(outcome.status, DownloadStatus::Skipped);
    assert!(outcome.total_bytes.is_none());
    assert_eq!(outcome.path, Some(target_dir.join("file.zip")));
    assert!(!target_dir.exists());
    assert!(sink.contains("dry run"));
}

#[tokio::test]
async fn test_batch_isolates_failures_and_keeps_order() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/missing.bin"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&mock_server)
        .await;

    let mut options = options(temp_dir.path());
    options.defaults.retry_count = 0;
    let inputs = vec![
        DownloadInput::from("not a url"),
        DownloadInput::from(format!("{}/missing.bin", mock_server.uri())),
        DownloadInput::from(format!("{}/ok.bin", mock_server.uri())),
    ];
    let outcomes = process_batch(inputs, &options, &RecordingSink::new()).await;

    let statuses: Vec<_> = outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            DownloadStatus::Failed,
            DownloadStatus::Failed,
            DownloadStatus::Completed
        ]
    );
    assert_eq!(outcomes[0].attempts, 0);
    assert!(outcomes[0].file_name.is_none());
    assert_eq!(outcomes[1].attempts, 1);
    assert!(outcomes[1].error.as_deref().is_some_and(|e| e.contains("404")));
    assert_eq!(
        std::fs::read(temp_dir.path().join("ok.bin")).expect("read file"),
        b"ok"
    );
}

#[tokio::test]
async fn test_record_overrides_directory_and_name() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let nested = temp_dir.path().join("nested").join("dir");

    Mock::given(method("GET"))
        .and(path("/v1/export"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a,b\n1,2\n".to_vec()))
        .mount(&mock_server)
        .await;

    let spec = DownloadSpec {
        file_name: Some("export.csv".to_string()),
        file_path: Some(nested.clone()),
        ..DownloadSpec::new(format!("{}/v1/export", mock_server.uri()))
    };
    let outcome =
        download_one(spec.into(), &options(temp_dir.path()), &RecordingSink::new()).await;

    assert_eq!(outcome.status, DownloadStatus::Completed);
    assert_eq!(
        std::fs::read(nested.join("export.csv")).expect("read file"),
        b"a,b\n1,2\n"
    );
}

#[tokio::test]
async fn test_mid_file_range_response_fetches_whole_file() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let content = body(5000);
    let file_path = temp_dir.path().join("big.bin");
    std::fs::write(&file_path, &content[..1000]).expect("seed partial file");

    let served = content.clone();
    let Some(server) = ScriptedServer::start(move |_, range| match range {
        Some(_) => Reply::partial(500, 5000, &served[500..]),
        None => Reply::ok(&served),
    })
    .await
    else {
        return;
    };

    let sink = RecordingSink::new();
    let outcome = download_one(
        server.url("/big.bin").into(),
        &resume_options(temp_dir.path()),
        &sink,
    )
    .await;

    assert_eq!(outcome.status, DownloadStatus::Completed, "{:?}", outcome.error);
    assert_eq!(outcome.attempts, 1);
    assert!(!outcome.resume_used);
    assert_eq!(outcome.total_bytes, Some(5000));
    assert_eq!(std::fs::read(&file_path).expect("read file"), content);
    assert_eq!(server.ranges(), vec![Some("bytes=1000-".to_string()), None]);
    assert!(sink.contains("requesting the whole file"));
}

#[tokio::test]
async fn test_stream_fault_resumes_from_partial_on_retry() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let content = body(5000);

    let served = content.clone();
    let Some(server) = ScriptedServer::start(move |n, range| match (n, range) {
        (0, None) => Reply::truncated(5000, &served[..2000]),
        (_, Some("bytes=2000-")) => Reply::partial(2000, 5000, &served[2000..]),
        _ => Reply::new("500 Internal Server Error", &[], 0, &[]),
    })
    .await
    else {
        return;
    };

    let sink = RecordingSink::new();
    let outcome = download_one(
        server.url("/big.bin").into(),
        &resume_options(temp_dir.path()),
        &sink,
    )
    .await;

    assert_eq!(outcome.status, DownloadStatus::Completed, "{:?}", outcome.error);
    assert_eq!(outcome.attempts, 2);
    assert!(outcome.resume_used);
    assert_eq!(outcome.total_bytes, Some(5000));
    assert_eq!(
        std::fs::read(temp_dir.path().join("big.bin")).expect("read file"),
        content
    );
    assert_eq!(server.ranges(), vec![None, Some("bytes=2000-".to_string())]);
    assert_eq!(sink.messages(LogLevel::Warning).len(), 1);
}

#[tokio::test]
async fn test_stream_fault_without_resume_restarts_from_zero() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let content = body(5000);

    let served = content.clone();
    let Some(server) = ScriptedServer::start(move |n, _| {
        if n == 0 {
            Reply::truncated(5000, &served[..2000])
        } else {
            Reply::ok(&served)
        }
    })
    .await
    else {
        return;
    };

    let outcome = download_one(
        server.url("/big.bin").into(),
        &options(temp_dir.path()),
        &RecordingSink::new(),
    )
    .await;

    assert_eq!(outcome.status, DownloadStatus::Completed, "{:?}", outcome.error);
    assert_eq!(outcome.attempts, 2);
    assert!(!outcome.resume_used);
    assert_eq!(
        std::fs::read(temp_dir.path().join("big.bin")).expect("read file"),
        content
    );
    assert_eq!(server.ranges(), vec![None, None]);
}

#[tokio::test]
async fn test_progress_events_are_throttled_during_slow_stream() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let content = body(12_000);

    let served = content.clone();
    let Some(server) = ScriptedServer::start(move |_, _| {
        Reply::paced(&served, 1000, Duration::from_millis(60))
    })
    .await
    else {
        return;
    };

    let sink = RecordingSink::new();
    let outcome = download_one(
        server.url("/slow.bin").into(),
        &options(temp_dir.path()),
        &sink,
    )
    .await;
    assert_eq!(outcome.status, DownloadStatus::Completed, "{:?}", outcome.error);

    let events = sink.progress_events();
    let (last, throttled) = events.split_last().expect("progress events");
    assert_eq!(last.bytes, 12_000);
    assert!(throttled.len() >= 2, "expected several events, got {}", throttled.len());
    for pair in throttled.windows(2) {
        let gap = pair[1].elapsed.saturating_sub(pair[0].elapsed);
        assert!(gap >= Duration::from_millis(190), "events {gap:?} apart");
    }
    let budget = last.elapsed.as_millis() / 200 + 1;
    assert!(throttled.len() as u128 <= budget, "{} events in {:?}", throttled.len(), last.elapsed);
}
