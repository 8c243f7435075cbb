//! HTTP client facade for streaming downloads.
//!
//! `HttpClient` wraps a shared reqwest client (User-Agent, gzip, proxy
//! routing from the environment, TLS options) and exposes the `download`
//! entry point: fetch a URL and deliver its body incrementally to a
//! caller-supplied [`Sink`].

use std::collections::HashMap;

use reqwest::{Client, ClientBuilder};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use super::error::{DownloadError, describe_error};
use super::event::RequestDescriptor;
use super::machine;
use super::session::TransportSession;
use super::sink::Sink;
use super::supervisor::Supervisor;
use crate::progress::DownloadProgress;
use crate::tls::TlsOptions;
use crate::{headers, proxy, user_agent};

/// Per-call options for [`HttpClient::download`].
#[derive(Debug, Default)]
pub struct DownloadOptions {
    /// Extra request headers, order-preserving, sent in addition to the
    /// client's fixed User-Agent.
    pub headers: Vec<(String, String)>,
    /// Caller-liveness token; when it fires, the transport session is
    /// cancelled and no further events are delivered.
    pub cancel: Option<CancellationToken>,
    /// Advisory progress snapshots, published after each accounting change.
    pub progress: Option<watch::Sender<DownloadProgress>>,
}

impl DownloadOptions {
    /// Adds one request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Ties the download's lifetime to a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Publishes progress snapshots through the given sender.
    #[must_use]
    pub fn with_progress(mut self, progress: watch::Sender<DownloadProgress>) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// HTTP client for streaming downloads into caller-supplied sinks.
///
/// Designed to be created once and reused, taking advantage of connection
/// pooling. Proxy routing is read from `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY`
/// when the client is built.
///
/// # Example
///
/// ```no_run
/// use streamfetch::{BufferSink, DownloadOptions, HttpClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let body = client
///     .download("https://example.com/file", BufferSink::new(), DownloadOptions::default())
///     .await?;
/// println!("fetched {} bytes", body.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with default TLS options.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_tls_options(&TlsOptions::default())
    }

    /// Creates a client with explicit TLS/security options.
    ///
    /// The options are opaque to the download core; they are applied here
    /// and passed through to every session start.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_tls_options(tls: &TlsOptions) -> Self {
        let client = base_client_builder(tls)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Downloads `url`, delivering body chunks to `sink` as they arrive.
    ///
    /// The sink's `finalize` result is returned on success. On any failure —
    /// transport error, non-200 status, sink fault, cancellation — the sink
    /// is aborted exactly once and the transport session is cancelled before
    /// the failure is returned.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`]; [`DownloadError::status`] carries the HTTP
    /// status code when one was involved and `None` for pre-HTTP failures.
    #[must_use = "download result contains the sink's final value"]
    #[instrument(skip(self, sink, options), fields(url = %url))]
    pub async fn download<S: Sink>(
        &self,
        url: &str,
        mut sink: S,
        options: DownloadOptions,
    ) -> Result<S::Output, DownloadError> {
        debug!("starting download");
        let descriptor = RequestDescriptor::get(url).with_headers(options.headers);
        let session = TransportSession::start(&self.client, descriptor)?;
        let supervisor = Supervisor::new(session, options.cancel);
        machine::run(url, supervisor, &mut sink, options.progress.as_ref()).await
    }

    /// Fetches the normalized response headers of `url` via a HEAD request.
    ///
    /// Useful for callers that size buffers from `content-length` up front.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] for malformed URLs,
    /// [`DownloadError::Network`] for transport failures, and
    /// [`DownloadError::HttpStatus`] for non-200 responses.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn probe(&self, url: &str) -> Result<HashMap<String, Vec<String>>, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url.to_string()))?;

        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|error| DownloadError::network(url, describe_error(&error)))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(DownloadError::http_status(status));
        }
        Ok(headers::normalize(response.headers()))
    }
}

fn base_client_builder(tls: &TlsOptions) -> ClientBuilder {
    let builder = Client::builder()
        .gzip(true)
        .user_agent(user_agent::default_user_agent());
    proxy::apply_env_proxies(tls.apply(builder))
}
