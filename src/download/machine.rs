//! The download state machine.
//!
//! Consumes transport events in sequence, drives the sink, tracks byte
//! counts against the optional declared total size, and decides
//! success/failure/cleanup at each step. The loop has exactly one success
//! exit (`StreamEnd`, or an immediate 200) and failure exits for transport
//! errors, non-200 statuses, sink faults, and cancellation; every failure
//! exit aborts the sink and then cancels the session, in that order, so the
//! sink never holds a reference the caller might still observe as
//! "in progress".

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::error::{DownloadError, describe_error};
use super::event::{RequestHandle, TransportEvent};
use super::sink::Sink;
use super::supervisor::Supervisor;
use crate::headers;
use crate::progress::DownloadProgress;

/// Mutable per-download record, owned exclusively by the event loop and
/// discarded the moment the call returns.
#[derive(Debug)]
struct DownloadState {
    handle: RequestHandle,
    /// Advisory size from `content-length`; set once, never revised, never
    /// used to terminate the loop early.
    declared_total_size: Option<u64>,
    /// Sum of all chunk sizes passed to the sink so far.
    bytes_received: u64,
}

impl DownloadState {
    fn new(handle: RequestHandle) -> Self {
        Self {
            handle,
            declared_total_size: None,
            bytes_received: 0,
        }
    }

    fn publish(&self, progress: Option<&watch::Sender<DownloadProgress>>) {
        if let Some(progress) = progress {
            let _ = progress.send(DownloadProgress {
                bytes_received: self.bytes_received,
                declared_total_size: self.declared_total_size,
            });
        }
    }
}

/// Runs the event loop for one started session.
///
/// # Errors
///
/// Returns the structured failure for transport errors, non-200 statuses,
/// sink faults, and cancellation. All of them abort the sink exactly once
/// and cancel the session before returning.
pub(crate) async fn run<S: Sink>(
    url: &str,
    mut supervisor: Supervisor,
    sink: &mut S,
    progress: Option<&watch::Sender<DownloadProgress>>,
) -> Result<S::Output, DownloadError> {
    let mut state = DownloadState::new(supervisor.handle());

    let mut acc = match sink.begin().await {
        Ok(acc) => Some(acc),
        Err(fault) => {
            let detail = describe_error(&fault);
            warn!(handle = %state.handle, detail, "sink begin faulted");
            sink.abort(None).await;
            supervisor.cancel();
            return Err(DownloadError::sink(detail));
        }
    };

    loop {
        let Some(event) = supervisor.next_event().await else {
            // Cancellation left the channel permanently silent: clean
            // shutdown, not a hang. Nobody remains to observe the result.
            debug!(handle = %state.handle, "channel silent after cancellation");
            sink.abort(acc.take()).await;
            supervisor.cancel();
            return Err(DownloadError::Cancelled);
        };

        match event {
            TransportEvent::TransportError { detail } => {
                warn!(handle = %state.handle, detail, "transport error");
                sink.abort(acc.take()).await;
                supervisor.cancel();
                return Err(DownloadError::network(url, detail));
            }

            TransportEvent::ImmediateResponse {
                status: 200,
                headers,
                body,
            } => {
                state.declared_total_size = headers::content_length(&headers);
                append_chunk(&supervisor, sink, &mut acc, body, &mut state).await?;
                state.publish(progress);
                return finish(url, supervisor, sink, acc, &state).await;
            }

            TransportEvent::ImmediateResponse { status, .. } => {
                debug!(handle = %state.handle, status, "non-200 response");
                sink.abort(acc.take()).await;
                supervisor.cancel();
                return Err(DownloadError::http_status(status));
            }

            TransportEvent::StreamStart { headers } => {
                state.declared_total_size = headers::content_length(&headers);
                state.bytes_received = 0;
                state.publish(progress);
                debug!(
                    handle = %state.handle,
                    declared_total_size = ?state.declared_total_size,
                    "stream started"
                );
            }

            TransportEvent::StreamChunk(chunk) => {
                append_chunk(&supervisor, sink, &mut acc, chunk, &mut state).await?;
                state.publish(progress);
            }

            TransportEvent::StreamEnd => {
                return finish(url, supervisor, sink, acc, &state).await;
            }
        }
    }
}

/// Appends one chunk through the sink's error boundary.
///
/// On a sink fault the accumulator is already consumed: the sink is aborted
/// with `None`, the session is cancelled, and the fault comes back as a
/// failure value.
async fn append_chunk<S: Sink>(
    supervisor: &Supervisor,
    sink: &mut S,
    acc: &mut Option<S::Acc>,
    chunk: Bytes,
    state: &mut DownloadState,
) -> Result<(), DownloadError> {
    let Some(current) = acc.take() else {
        // Unreachable by construction: the accumulator only disappears on a
        // path that immediately returns.
        sink.abort(None).await;
        supervisor.cancel();
        return Err(sink_fault_taken());
    };
    let chunk_len = chunk.len() as u64;
    match sink.append(current, chunk).await {
        Ok(next) => {
            *acc = Some(next);
            state.bytes_received += chunk_len;
            Ok(())
        }
        Err(fault) => {
            let detail = describe_error(&fault);
            warn!(handle = %state.handle, detail, "sink append faulted");
            sink.abort(None).await;
            supervisor.cancel();
            Err(DownloadError::sink(detail))
        }
    }
}

/// Finalizes the sink, converting a finalize fault at the boundary.
async fn finish<S: Sink>(
    url: &str,
    supervisor: Supervisor,
    sink: &mut S,
    acc: Option<S::Acc>,
    state: &DownloadState,
) -> Result<S::Output, DownloadError> {
    let Some(acc) = acc else {
        sink.abort(None).await;
        supervisor.cancel();
        return Err(sink_fault_taken());
    };
    match sink.finalize(acc).await {
        Ok(output) => {
            info!(
                handle = %state.handle,
                url,
                bytes = state.bytes_received,
                declared_total_size = ?state.declared_total_size,
                "download complete"
            );
            Ok(output)
        }
        Err(fault) => {
            let detail = describe_error(&fault);
            warn!(handle = %state.handle, detail, "sink finalize faulted");
            sink.abort(None).await;
            supervisor.cancel();
            Err(DownloadError::sink(detail))
        }
    }
}

/// Failure used on the defensive no-accumulator paths.
fn sink_fault_taken() -> DownloadError {
    DownloadError::sink("sink accumulator no longer available")
}
