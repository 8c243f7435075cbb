//! End-to-end download tests against a local mock server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use streamfetch::{
    BufferSink, DownloadError, DownloadOptions, DownloadProgress, FileSink, HttpClient, Sink,
    headers,
};

/// Shared log of sink interactions, inspectable after the sink moved into
/// the download call.
#[derive(Debug, Default)]
struct SinkLog {
    appends: Vec<Vec<u8>>,
    finalized: usize,
    aborted: usize,
}

#[derive(Debug, Clone, Default)]
struct ObservedSink {
    log: Arc<Mutex<SinkLog>>,
    fail_append_at: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
#[error("sink exploded on purpose")]
struct InjectedFault;

#[async_trait]
impl Sink for ObservedSink {
    type Acc = Vec<u8>;
    type Output = Vec<u8>;
    type Error = InjectedFault;

    async fn begin(&mut self) -> Result<Self::Acc, Self::Error> {
        Ok(Vec::new())
    }

    async fn append(&mut self, mut acc: Self::Acc, chunk: Bytes) -> Result<Self::Acc, Self::Error> {
        let mut log = self.log.lock().expect("sink log lock");
        if self.fail_append_at == Some(log.appends.len() + 1) {
            return Err(InjectedFault);
        }
        log.appends.push(chunk.to_vec());
        acc.extend_from_slice(&chunk);
        Ok(acc)
    }

    async fn finalize(&mut self, acc: Self::Acc) -> Result<Self::Output, Self::Error> {
        self.log.lock().expect("sink log lock").finalized += 1;
        Ok(acc)
    }

    async fn abort(&mut self, acc: Option<Self::Acc>) {
        drop(acc);
        self.log.lock().expect("sink log lock").aborted += 1;
    }
}

#[tokio::test]
async fn test_download_success_accumulates_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hello"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/hello", mock_server.uri());

    let body = client
        .download(&url, BufferSink::new(), DownloadOptions::default())
        .await
        .expect("download should succeed");
    assert_eq!(body.as_ref(), b"hello");
}

#[tokio::test]
async fn test_download_404_reports_status_and_aborts_sink() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_bytes(b"not here"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/missing", mock_server.uri());
    let sink = ObservedSink::default();
    let log = Arc::clone(&sink.log);

    let error = client
        .download(&url, sink, DownloadOptions::default())
        .await
        .expect_err("404 must fail");

    assert_eq!(error.to_string(), "got HTTP status: 404");
    assert_eq!(error.status(), Some(404));
    let log = log.lock().expect("sink log lock");
    assert_eq!(log.aborted, 1, "abort must run exactly once");
    assert_eq!(log.finalized, 0, "finalize must never run");
}

#[tokio::test]
async fn test_download_tracks_bytes_against_declared_size() {
    let mock_server = MockServer::start().await;
    let body = vec![7u8; 10];

    Mock::given(method("GET"))
        .and(path("/sized"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/sized", mock_server.uri());
    let (progress_tx, progress_rx) = DownloadProgress::channel();

    let result = client
        .download(
            &url,
            BufferSink::new(),
            DownloadOptions::default().with_progress(progress_tx),
        )
        .await
        .expect("download should succeed");

    assert_eq!(result.len(), 10);
    let snapshot = *progress_rx.borrow();
    assert_eq!(snapshot.bytes_received, 10);
    assert_eq!(snapshot.declared_total_size, Some(10));
}

#[tokio::test]
async fn test_download_connection_refused_has_no_status() {
    // Bind a port, then drop the listener so nothing is listening on it.
    let refused_addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local addr")
    };

    let client = HttpClient::new();
    let url = format!("http://{refused_addr}/file");
    let sink = ObservedSink::default();
    let log = Arc::clone(&sink.log);

    let error = client
        .download(&url, sink, DownloadOptions::default())
        .await
        .expect_err("refused connection must fail");

    assert_eq!(error.status(), None);
    let message = error.to_string().to_lowercase();
    assert!(
        message.contains("refused") || message.contains("connect"),
        "message should mention the refusal: {message}"
    );
    assert_eq!(log.lock().expect("sink log lock").aborted, 1);
}

#[tokio::test]
async fn test_sink_fault_aborts_once_and_surfaces_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/faulty"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data the sink rejects"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/faulty", mock_server.uri());
    let sink = ObservedSink {
        fail_append_at: Some(1),
        ..ObservedSink::default()
    };
    let log = Arc::clone(&sink.log);

    let error = client
        .download(&url, sink, DownloadOptions::default())
        .await
        .expect_err("sink fault must fail the download");

    assert!(matches!(error, DownloadError::Sink { .. }));
    assert!(
        error.to_string().contains("sink exploded on purpose"),
        "fault description missing: {error}"
    );
    let log = log.lock().expect("sink log lock");
    assert_eq!(log.aborted, 1);
    assert_eq!(log.finalized, 0);
}

#[tokio::test]
async fn test_cancelled_token_stops_download_cleanly() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"late")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/slow", mock_server.uri());
    let token = CancellationToken::new();
    token.cancel();
    let sink = ObservedSink::default();
    let log = Arc::clone(&sink.log);

    let error = client
        .download(&url, sink, DownloadOptions::default().with_cancel(token))
        .await
        .expect_err("cancelled download must not succeed");

    assert!(matches!(error, DownloadError::Cancelled));
    assert_eq!(error.status(), None);
    assert_eq!(log.lock().expect("sink log lock").aborted, 1);
}

#[tokio::test]
async fn test_download_sends_identifying_user_agent() {
    let mock_server = MockServer::start().await;

    // Only requests carrying the fixed UA match; anything else 404s.
    Mock::given(method("GET"))
        .and(path("/ua"))
        .and(UserAgentContains("streamfetch"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/ua", mock_server.uri());

    let body = client
        .download(&url, BufferSink::new(), DownloadOptions::default())
        .await
        .expect("UA must be sent on every request");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn test_download_passes_caller_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/authed"))
        .and(header("x-api-key", "sesame"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"granted"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/authed", mock_server.uri());

    let body = client
        .download(
            &url,
            BufferSink::new(),
            DownloadOptions::default().with_header("x-api-key", "sesame"),
        )
        .await
        .expect("caller headers must be sent");
    assert_eq!(body.as_ref(), b"granted");
}

#[tokio::test]
async fn test_file_sink_writes_body_to_disk() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("temp dir");

    Mock::given(method("GET"))
        .and(path("/file.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"file contents"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/file.bin", mock_server.uri());
    let target = temp_dir.path().join("file.bin");

    let output = client
        .download(&url, FileSink::new(&target), DownloadOptions::default())
        .await
        .expect("file download should succeed");

    assert_eq!(output.bytes_written, 13);
    assert_eq!(std::fs::read(&target).expect("read file"), b"file contents");
}

#[tokio::test]
async fn test_file_sink_leaves_no_partial_file_on_http_error() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("temp dir");

    Mock::given(method("GET"))
        .and(path("/gone.bin"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/gone.bin", mock_server.uri());
    let target = temp_dir.path().join("gone.bin");

    let error = client
        .download(&url, FileSink::new(&target), DownloadOptions::default())
        .await
        .expect_err("410 must fail");

    assert_eq!(error.status(), Some(410));
    assert!(!target.exists(), "partial file must be removed after error");
}

#[tokio::test]
async fn test_empty_200_finalizes_with_empty_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/empty", mock_server.uri());
    let sink = ObservedSink::default();
    let log = Arc::clone(&sink.log);

    let body = client
        .download(&url, sink, DownloadOptions::default())
        .await
        .expect("empty 200 is a success");

    assert!(body.is_empty());
    let log = log.lock().expect("sink log lock");
    assert_eq!(log.finalized, 1);
    assert_eq!(log.aborted, 0);
}

#[tokio::test]
async fn test_probe_returns_normalized_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/sized"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Length", "1234"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/sized", mock_server.uri());

    let normalized = client.probe(&url).await.expect("probe should succeed");
    assert_eq!(headers::single_value(&normalized, "Content-Length"), Some("1234"));
}

/// Matches requests whose User-Agent contains the given fragment.
struct UserAgentContains(&'static str);

impl wiremock::Match for UserAgentContains {
    fn matches(&self, request: &wiremock::Request) -> bool {
        request
            .headers
            .get("User-Agent")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|ua| ua.contains(self.0))
    }
}
