//! The sink contract and the built-in sinks.
//!
//! A sink is the caller-supplied destination for body bytes: a three-
//! operation capability (`begin`, `append`, `finalize`-or-`abort`) over an
//! accumulator the sink defines. The download state machine threads the
//! accumulator through `append`, moving it rather than mutating in place,
//! and guarantees exactly one of `finalize` or `abort` runs at the end.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

/// Caller-supplied destination that incrementally consumes body bytes.
///
/// # Contract
///
/// - `begin` produces the initial accumulator.
/// - `append` consumes the accumulator and returns its successor; on `Err`
///   the accumulator is gone (the sink consumed it while faulting).
/// - Exactly one of `finalize` or `abort` is called last; after that the
///   accumulator must not be touched again.
/// - `abort` is invoked at most once, never concurrently with `append` or
///   `finalize`, and receives the accumulator only when the state machine
///   still holds one.
///
/// Faults returned from `begin`/`append`/`finalize` propagate to the
/// download's error boundary: the sink is aborted, the transport session is
/// cancelled, and the fault becomes a failure value.
#[async_trait]
pub trait Sink: Send {
    /// Accumulator threaded through `append` calls.
    type Acc: Send + 'static;
    /// Value produced by `finalize` on success.
    type Output: Send;
    /// Fault type for `begin`/`append`/`finalize`.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Produces the initial accumulator.
    async fn begin(&mut self) -> Result<Self::Acc, Self::Error>;

    /// Consumes one body chunk, returning the successor accumulator.
    async fn append(&mut self, acc: Self::Acc, chunk: Bytes) -> Result<Self::Acc, Self::Error>;

    /// Completes the sink, producing its final result.
    async fn finalize(&mut self, acc: Self::Acc) -> Result<Self::Output, Self::Error>;

    /// Releases sink-side resources on a failure path.
    ///
    /// `acc` is `None` when a faulting `append`/`finalize` already consumed
    /// the accumulator.
    async fn abort(&mut self, acc: Option<Self::Acc>);
}

/// In-memory sink: accumulates all chunks and finalizes to [`Bytes`].
#[derive(Debug, Default)]
pub struct BufferSink;

impl BufferSink {
    /// Creates a new in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sink for BufferSink {
    type Acc = BytesMut;
    type Output = Bytes;
    type Error = std::convert::Infallible;

    async fn begin(&mut self) -> Result<Self::Acc, Self::Error> {
        Ok(BytesMut::new())
    }

    async fn append(&mut self, mut acc: Self::Acc, chunk: Bytes) -> Result<Self::Acc, Self::Error> {
        acc.extend_from_slice(&chunk);
        Ok(acc)
    }

    async fn finalize(&mut self, acc: Self::Acc) -> Result<Self::Output, Self::Error> {
        Ok(acc.freeze())
    }

    async fn abort(&mut self, acc: Option<Self::Acc>) {
        drop(acc);
    }
}

/// Result of a completed [`FileSink`] download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSinkOutput {
    /// Path the body was written to.
    pub path: PathBuf,
    /// Total bytes written.
    pub bytes_written: u64,
}

/// File-backed sink: streams chunks through a buffered writer.
///
/// `abort` removes the partial file so no incomplete data is left behind.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
}

/// Open write state of a [`FileSink`]; owned by the download loop between
/// `begin` and `finalize`/`abort`.
#[derive(Debug)]
pub struct FileAccumulator {
    writer: BufWriter<File>,
    bytes_written: u64,
}

impl FileSink {
    /// Creates a sink that writes to `path`, truncating any existing file.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The target path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for FileSink {
    type Acc = FileAccumulator;
    type Output = FileSinkOutput;
    type Error = std::io::Error;

    async fn begin(&mut self) -> Result<Self::Acc, Self::Error> {
        let file = File::create(&self.path).await?;
        Ok(FileAccumulator {
            writer: BufWriter::new(file),
            bytes_written: 0,
        })
    }

    async fn append(&mut self, mut acc: Self::Acc, chunk: Bytes) -> Result<Self::Acc, Self::Error> {
        acc.writer.write_all(&chunk).await?;
        acc.bytes_written += chunk.len() as u64;
        Ok(acc)
    }

    async fn finalize(&mut self, mut acc: Self::Acc) -> Result<Self::Output, Self::Error> {
        // Ensure all data is flushed to disk before reporting success.
        acc.writer.flush().await?;
        Ok(FileSinkOutput {
            path: self.path.clone(),
            bytes_written: acc.bytes_written,
        })
    }

    async fn abort(&mut self, acc: Option<Self::Acc>) {
        // Close the writer before removing the partial file.
        drop(acc);
        debug!(path = %self.path.display(), "removing partial file after abort");
        let _ = tokio::fs::remove_file(&self.path).await;
    }
}
