//! Relay of execution events to an SSE response.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::exec::ExecEvent;

struct RelayState {
    rx: mpsc::Receiver<ExecEvent>,
    idle: Duration,
    done: bool,
}

/// Events relayed 1:1 by name. The stream ends after `end`/`error`, when the
/// producer goes away, or after `idle` without any event.
pub fn event_stream(
    rx: mpsc::Receiver<ExecEvent>,
    idle: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let state = RelayState {
        rx,
        idle,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }

        let event = match tokio::time::timeout(state.idle, state.rx.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => return None,
            Err(_) => {
                debug!("Live stream idle for {}s, closing", state.idle.as_secs());
                state.done = true;
                ExecEvent::Stderr("[timeout] stream idle".to_string())
            }
        };

        if event.is_terminal() {
            state.done = true;
        }
        Some((Ok(to_sse(&event)), state))
    })
}

pub fn to_sse(event: &ExecEvent) -> Event {
    Event::default().event(event.name()).data(event.data())
}

pub fn sse_response(
    rx: mpsc::Receiver<ExecEvent>,
    idle: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(event_stream(rx, idle)).keep_alive(KeepAlive::default())
}
