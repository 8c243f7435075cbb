//! Transport events and the immutable request descriptor.
//!
//! A [`TransportSession`](super::TransportSession) delivers the body of one
//! in-flight request as a sequence of [`TransportEvent`]s tagged with a
//! [`RequestHandle`]. For a given handle the sequence is exactly
//! `StreamStart → StreamChunk* → StreamEnd`, or a single
//! `ImmediateResponse`, or `TransportError` at any point.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::HeaderMap;

/// Opaque identifier correlating inbound events to one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle(u64);

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

impl RequestHandle {
    /// Allocates a fresh, process-unique handle.
    pub(crate) fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// One asynchronous delivery from the transport for a single request.
#[derive(Debug)]
pub enum TransportEvent {
    /// The response started streaming; carries the response headers.
    StreamStart {
        /// Raw response headers as received on the wire.
        headers: HeaderMap,
    },
    /// One body chunk, delivered in order.
    StreamChunk(Bytes),
    /// The body completed; no further chunks follow.
    StreamEnd,
    /// A terminal, non-streamed response (non-200, or a declared-empty body).
    ImmediateResponse {
        /// HTTP status code.
        status: u16,
        /// Raw response headers.
        headers: HeaderMap,
        /// The full response body.
        body: Bytes,
    },
    /// Connection-level failure at any point.
    TransportError {
        /// Description of the failure, including the deepest cause.
        detail: String,
    },
}

/// Optional request body as a (content-type, raw-bytes) pair.
#[derive(Debug, Clone)]
pub struct RequestBody {
    /// MIME type sent as `Content-Type`.
    pub content_type: String,
    /// Raw body bytes.
    pub bytes: Bytes,
}

/// Immutable description of one outbound request.
///
/// The header list preserves the order and the key casing the caller
/// supplied; keys are case-insensitive on the wire. The timeout bounds only
/// a non-streaming round trip; the streaming path runs without an overall
/// timeout, until a terminal event, a transport error, or cancellation.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<RequestBody>,
    timeout: Option<Duration>,
}

impl RequestDescriptor {
    /// Creates a GET descriptor for the given URL.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// Appends caller-supplied headers, preserving their order.
    #[must_use]
    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Attaches a request body.
    #[must_use]
    pub fn with_body(mut self, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody {
            content_type: content_type.into(),
            bytes: bytes.into(),
        });
        self
    }

    /// Bounds the total wait of a non-streaming round trip.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target URL as supplied.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Caller-supplied headers in supply order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The optional request body.
    #[must_use]
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// The optional round-trip timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
