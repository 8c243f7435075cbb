//! streamfetch
//!
//! A streaming HTTP client facade: fetch remote resources and incrementally
//! deliver their bodies to a caller-supplied sink, while staying
//! cooperatively cancellable and resilient to abrupt consumer failure.
//!
//! # Architecture
//!
//! - [`download`] - the streaming core: client facade, transport session,
//!   download state machine, sink contract, liveness supervisor
//! - [`headers`] - header normalization (lower-cased key multimap)
//! - [`progress`] - advisory progress snapshots over a watch channel
//! - [`tls`] - TLS/security options passed through to the transport
//!
//! Proxy routing is configured from `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY`
//! when the client is built; every outbound request carries a fixed
//! identifying User-Agent.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod headers;
pub mod progress;
pub mod tls;

mod proxy;
mod user_agent;

// Re-export commonly used types
pub use download::{
    BufferSink, DownloadError, DownloadOptions, FileSink, FileSinkOutput, HttpClient,
    RequestDescriptor, RequestHandle, Sink, TransportEvent, TransportSession,
};
pub use progress::DownloadProgress;
pub use tls::TlsOptions;
