//! Transport session: one in-flight asynchronous HTTP request.
//!
//! `start` validates the request synchronously, then hands the network I/O
//! to a pump task that translates the reqwest response into a sequence of
//! correlated [`TransportEvent`]s on a single-consumer channel. The session
//! is the only component that talks to the network layer; the state machine
//! only ever sees events.

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use super::error::{DownloadError, describe_error};
use super::event::{RequestDescriptor, RequestHandle, TransportEvent};

/// Events buffered between the pump task and the consumer. Small on purpose:
/// backpressure keeps a fast server from ballooning memory when the sink is
/// slow.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// One in-flight request delivering correlated transport events.
///
/// Dropping the session cancels the pump task, so an abandoned download
/// stops producing events nobody will consume.
#[derive(Debug)]
pub struct TransportSession {
    handle: RequestHandle,
    events: mpsc::Receiver<(RequestHandle, TransportEvent)>,
    cancel: CancellationToken,
}

impl TransportSession {
    /// Issues the request in non-blocking streaming mode.
    ///
    /// The URL is validated here; a malformed URL is rejected immediately
    /// and never enters the event loop.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] when the URL does not parse.
    #[instrument(level = "debug", skip(client, descriptor), fields(url = %descriptor.url()))]
    pub fn start(client: &Client, descriptor: RequestDescriptor) -> Result<Self, DownloadError> {
        Url::parse(descriptor.url())
            .map_err(|_| DownloadError::invalid_url(descriptor.url().to_string()))?;

        let handle = RequestHandle::next();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        debug!(%handle, "starting transport session");
        tokio::spawn(pump(
            client.clone(),
            descriptor,
            handle,
            tx,
            cancel.clone(),
        ));

        Ok(Self {
            handle,
            events: rx,
            cancel,
        })
    }

    /// The correlation handle of this session.
    #[must_use]
    pub fn handle(&self) -> RequestHandle {
        self.handle
    }

    /// Suspends until the transport delivers the next event for this
    /// session's handle.
    ///
    /// Events tagged with a different handle are silently discarded, never
    /// surfaced. Returns `None` once the channel closes without a further
    /// event, which only happens after cancellation.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        while let Some((handle, event)) = self.events.recv().await {
            if handle != self.handle {
                debug!(received = %handle, expected = %self.handle, "discarding uncorrelated event");
                continue;
            }
            return Some(event);
        }
        None
    }

    /// Best-effort request to stop event delivery and release transport-side
    /// resources.
    ///
    /// Idempotent, non-blocking, and safe after the session has already
    /// reached a terminal state.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether `cancel` has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Builds a session around an externally fed event channel. Test-only:
    /// lets state-machine tests inject event sequences without a network.
    #[cfg(test)]
    pub(crate) fn from_parts(
        handle: RequestHandle,
        events: mpsc::Receiver<(RequestHandle, TransportEvent)>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            handle,
            events,
            cancel,
        }
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        // The consumer is gone; stop the pump at its next suspension point.
        self.cancel.cancel();
    }
}

/// Translates one reqwest response into correlated transport events.
///
/// Terminal deliveries per handle: `StreamEnd`, `ImmediateResponse`, or
/// `TransportError`. Cancellation stops delivery without a terminal event.
async fn pump(
    client: Client,
    descriptor: RequestDescriptor,
    handle: RequestHandle,
    tx: mpsc::Sender<(RequestHandle, TransportEvent)>,
    cancel: CancellationToken,
) {
    let mut request = client.request(descriptor.method().clone(), descriptor.url());
    for (name, value) in descriptor.headers() {
        request = request.header(name, value);
    }
    if let Some(body) = descriptor.body() {
        request = request
            .header(CONTENT_TYPE, &body.content_type)
            .body(body.bytes.clone());
    }
    if let Some(timeout) = descriptor.timeout() {
        request = request.timeout(timeout);
    }

    let response = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!(%handle, "session cancelled before response");
            return;
        }
        result = request.send() => match result {
            Ok(response) => response,
            Err(error) => {
                let detail = describe_error(&error);
                send_event(&tx, handle, TransportEvent::TransportError { detail }, &cancel).await;
                return;
            }
        }
    };

    let status = response.status().as_u16();
    let headers = response.headers().clone();

    // Non-200 responses and declared-empty 200s never stream; they collapse
    // to a single terminal event.
    if status != 200 || response.content_length() == Some(0) {
        let event = match read_full_body(response, &cancel).await {
            Some(Ok(body)) => TransportEvent::ImmediateResponse {
                status,
                headers,
                body,
            },
            Some(Err(detail)) => TransportEvent::TransportError { detail },
            None => return, // cancelled mid-read
        };
        send_event(&tx, handle, event, &cancel).await;
        return;
    }

    if !send_event(&tx, handle, TransportEvent::StreamStart { headers }, &cancel).await {
        return;
    }

    let mut stream = response.bytes_stream();
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(%handle, "session cancelled mid-stream");
                return;
            }
            next = stream.next() => next,
        };
        let event = match next {
            Some(Ok(chunk)) => TransportEvent::StreamChunk(chunk),
            Some(Err(error)) => {
                let detail = describe_error(&error);
                send_event(&tx, handle, TransportEvent::TransportError { detail }, &cancel).await;
                return;
            }
            None => {
                send_event(&tx, handle, TransportEvent::StreamEnd, &cancel).await;
                return;
            }
        };
        if !send_event(&tx, handle, event, &cancel).await {
            return;
        }
    }
}

/// Reads a complete response body, honoring cancellation.
///
/// `None` means cancelled; `Some(Err(detail))` is a transport failure.
async fn read_full_body(response: reqwest::Response, cancel: &CancellationToken) -> Option<Result<Bytes, String>> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        result = response.bytes() => Some(result.map_err(|error| describe_error(&error))),
    }
}

/// Delivers one event unless cancellation or a dropped consumer intervenes.
///
/// Returns false when no further events should be sent.
async fn send_event(
    tx: &mpsc::Sender<(RequestHandle, TransportEvent)>,
    handle: RequestHandle,
    event: TransportEvent,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        sent = tx.send((handle, event)) => sent.is_ok(),
    }
}
