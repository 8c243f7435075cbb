//! Streaming HTTP download core.
//!
//! This module implements the asynchronous streaming-download state machine:
//! a non-blocking request is issued through a [`TransportSession`], body
//! chunks arrive as discrete [`TransportEvent`]s, and the state machine
//! accumulates them into a caller-supplied [`Sink`] while tracking progress
//! and guaranteeing cleanup of both the request and the sink on every exit
//! path.
//!
//! # Example
//!
//! ```no_run
//! use streamfetch::{BufferSink, DownloadOptions, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let body = client
//!     .download("https://example.com/data.bin", BufferSink::new(), DownloadOptions::default())
//!     .await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod event;
mod machine;
mod session;
mod sink;
mod supervisor;

pub use client::{DownloadOptions, HttpClient};
pub use error::DownloadError;
pub use event::{RequestBody, RequestDescriptor, RequestHandle, TransportEvent};
pub use session::TransportSession;
pub use sink::{BufferSink, FileAccumulator, FileSink, FileSinkOutput, Sink};
pub use supervisor::Supervisor;

// Note: no module-local Result aliases; use `Result<T, DownloadError>`
// explicitly in function signatures.
