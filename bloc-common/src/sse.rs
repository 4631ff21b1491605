//! Server-Sent Events (SSE) utilities
//!
//! Turns a competition [`Subscription`] into an SSE response.

use crate::events::{ResultsEvent, Subscription};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Keep-alive comment interval
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Serialize an event into an SSE frame named after its type
pub fn to_sse_event(event: &ResultsEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("Failed to serialize {}: {}", event.event_type(), e);
            None
        }
    }
}

/// Create an SSE stream for one competition subscriber
///
/// `initial` is sent first so a (re)connecting client starts from the full
/// current state instead of relying on pushes it missed. The stream ends
/// when the hub closes the channel; the subscription is dropped with the
/// stream when the client disconnects.
pub fn create_results_sse_stream(
    initial: Option<ResultsEvent>,
    mut subscription: Subscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(
        competition_id = subscription.competition_id(),
        subscription_id = %subscription.id(),
        "New SSE client connected"
    );

    let stream = async_stream::stream! {
        if let Some(event) = initial.as_ref().and_then(to_sse_event) {
            yield Ok(event);
        }

        while let Some(event) = subscription.recv().await {
            if let Some(frame) = to_sse_event(&event) {
                debug!(
                    competition_id = subscription.competition_id(),
                    "SSE: sending {}",
                    event.event_type()
                );
                yield Ok(frame);
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
