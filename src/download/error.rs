//! Error types for the download module.
//!
//! Every failure of a `download` call surfaces as a [`DownloadError`]: the
//! `Display` text is the user-facing message and [`DownloadError::status`]
//! carries the HTTP status code when one was involved. Together they form
//! the `(message, status)` failure pair the facade promises.

use thiserror::Error;

/// Errors that can occur during a streaming download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Connection-level failure (DNS, refusal, reset, TLS handshake).
    ///
    /// `detail` is derived from the transport's own error description,
    /// including the deepest cause, so reasons like "Connection refused"
    /// survive the wrapping layers.
    #[error("network error downloading {url}: {detail}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// Description of the transport failure.
        detail: String,
    },

    /// HTTP error response: any status code other than 200.
    #[error("got HTTP status: {status}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// The sink's begin/append/finalize faulted.
    ///
    /// The fault is caught at the boundary and never re-raised; the sink is
    /// aborted and the transport session cancelled before this is returned.
    #[error("sink fault: {detail}")]
    Sink {
        /// Description of the sink fault.
        detail: String,
    },

    /// The provided URL is malformed; rejected before the event loop.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The download was cancelled through the caller's cancellation token.
    ///
    /// When cancellation comes from caller death this value is produced but
    /// never observed, which is the intended shutdown path.
    #[error("download cancelled before completion")]
    Cancelled,
}

impl DownloadError {
    /// Creates a network error from a transport failure description.
    pub fn network(url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            detail: detail.into(),
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(status: u16) -> Self {
        Self::HttpStatus { status }
    }

    /// Creates a sink fault error.
    pub fn sink(detail: impl Into<String>) -> Self {
        Self::Sink {
            detail: detail.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns the HTTP status code when one was involved.
    ///
    /// `None` for pre-HTTP failures (transport errors, sink faults,
    /// malformed URLs, cancellation).
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status } => Some(*status),
            _ => None,
        }
    }
}

// Note on From trait implementations:
// We intentionally do NOT implement `From<reqwest::Error>` because the
// Network variant requires context (the URL) that the source error does not
// provide, and the transport delivers failures as already-described events.
// The helper constructors are the correct pattern here.

/// Renders an error with its full cause chain.
///
/// Wrappers like reqwest often keep the interesting reason (e.g. the OS-level
/// "Connection refused") several `source()` hops down.
pub(crate) fn describe_error(error: &(dyn std::error::Error + 'static)) -> String {
    let mut description = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !description.contains(&text) {
            description.push_str(": ");
            description.push_str(&text);
        }
        source = cause.source();
    }
    description
}
