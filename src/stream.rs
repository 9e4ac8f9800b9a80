//! Stream emitter — turns the dispatcher's output sink into framed SSE text.
//!
//! The emitter waits on whichever of {new result, heartbeat tick, client
//! cancellation} is ready first. Results are written in completion order;
//! there is no reordering buffer. When the sink closes without ever
//! producing a result, exactly one terminal no-results document is emitted
//! so the client always sees either data or that terminal event.

use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::enrich::EnrichmentResult;

/// Terminal document sent when zero results were produced.
pub const NO_RESULTS_ERROR: &str = "no_emails_found";

/// One event on a stream session.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// An enrichment result, serialized and written immediately.
    Result(EnrichmentResult),
    /// Liveness marker; protocol comment, never data.
    Heartbeat,
    /// Terminal error-shaped document for an empty session.
    NoResults,
}

/// Multi-way wait loop over the output sink.
///
/// Yields until the sink closes or `cancel` fires. Cancellation terminates
/// the stream immediately with no further events, including the terminal
/// no-results document.
pub fn event_stream(
    mut rx: mpsc::Receiver<EnrichmentResult>,
    heartbeat: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = StreamEvent> {
    async_stream::stream! {
        let start = tokio::time::Instant::now() + heartbeat;
        let mut ticker = tokio::time::interval_at(start, heartbeat);
        let mut found_any = false;

        loop {
            tokio::select! {
                // Checked in declaration order: a fired cancellation wins
                // over a ready result, so nothing is flushed after cancel.
                biased;
                _ = cancel.cancelled() => {
                    debug!("Stream session cancelled");
                    return;
                }
                next = rx.recv() => {
                    match next {
                        Some(result) => {
                            found_any = true;
                            yield StreamEvent::Result(result);
                        }
                        None => {
                            if !found_any {
                                yield StreamEvent::NoResults;
                            }
                            debug!("Output sink closed, ending stream");
                            return;
                        }
                    }
                }
                _ = ticker.tick() => {
                    yield StreamEvent::Heartbeat;
                }
            }
        }
    }
}

/// Render one event as standard server-push text framing: data events are
/// prefixed `data: `, comments `: `, and events end with a blank line.
pub fn render_event(event: &StreamEvent) -> String {
    match event {
        StreamEvent::Result(result) => {
            // EnrichmentResult contains no non-string keys or values that
            // can fail serialization; fall back to the terminal shape if it
            // ever does rather than poisoning the framing.
            match serde_json::to_string(result) {
                Ok(json) => format!("data: {json}\n\n"),
                Err(_) => format!("data: {{\"error\": \"{NO_RESULTS_ERROR}\"}}\n\n"),
            }
        }
        StreamEvent::Heartbeat => ": heartbeat\n\n".to_string(),
        StreamEvent::NoResults => {
            format!("data: {{\"error\": \"{NO_RESULTS_ERROR}\"}}\n\n")
        }
    }
}
