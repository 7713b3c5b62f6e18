//! Stream endpoint: `GET /sse?channel=<session id>`.
//!
//! Each response body owns its registry subscription and its heartbeat
//! timer. When the client disconnects axum drops the body, which cancels the
//! timer and unsubscribes the stream in one step.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::error::RelayError;
use crate::protocol::present;
use crate::registry::Subscription;
use crate::state::AppState;

/// Serialized `ping` event, identical for every stream
pub const PING_FRAME: &str = r#"{"event":"ping","data":{}}"#;

#[derive(Debug, Deserialize)]
pub struct SseQuery {
    pub channel: Option<String>,
}

/// Open an event stream for a session
pub async fn sse_handler(
    Query(params): Query<SseQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, RelayError> {
    let session_id = present(params.channel)
        .ok_or_else(|| RelayError::BadRequest("channel query parameter is required".to_string()))?;

    let subscription = state.registry.open(&session_id);
    tracing::info!(
        session_id = %session_id,
        stream_id = subscription.stream_id(),
        "SSE stream opened"
    );

    let body = Sse::new(event_stream(subscription, state.heartbeat_interval));
    Ok((
        [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
        ],
        body,
    ))
}

struct StreamState {
    subscription: Subscription,
    heartbeat: Interval,
}

/// Frames from the subscription interleaved with periodic pings.
///
/// Ends when the registry drops the stream (shutdown).
pub fn event_stream(
    subscription: Subscription,
    heartbeat_interval: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    // Interval panics on a zero period
    let period = heartbeat_interval.max(Duration::from_millis(1));
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = StreamState {
        subscription,
        heartbeat,
    };

    stream::unfold(state, |mut st| async move {
        tokio::select! {
            frame = st.subscription.recv() => {
                let Some(frame) = frame else {
                    tracing::info!(
                        session_id = st.subscription.session_id(),
                        stream_id = st.subscription.stream_id(),
                        "SSE stream closed by relay"
                    );
                    return None;
                };
                Some((Ok(Event::default().data(&*frame)), st))
            }
            _ = st.heartbeat.tick() => {
                Some((Ok(Event::default().data(PING_FRAME)), st))
            }
        }
    })
}
