// Handlers for the session API used by the guest-details page script

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json,
    },
};
use futures::{stream, Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;

use super::Visitor;
use crate::{
    error::AppError,
    session::{Countdown, SessionError, SessionState, SessionTimer},
    AppState,
};

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatusKind {
    None,
    Active,
    Expired,
}

#[derive(Serialize, Debug)]
pub struct SessionStatus {
    pub state: SessionStatusKind,
    pub remaining_secs: u64,
    pub started_at: Option<i64>,
}

pub async fn session_status(
    State(app_state): State<AppState>,
    visitor: Visitor,
) -> Result<impl IntoResponse, AppError> {
    let cache = app_state.booking_cache(&visitor);
    let timeout = app_state.settings.session.timeout();

    let status = match SessionTimer::initialize(&cache, app_state.clock.as_ref(), timeout) {
        Err(SessionError::NotStarted) => SessionStatus {
            state: SessionStatusKind::None,
            remaining_secs: 0,
            started_at: None,
        },
        Ok(timer) => SessionStatus {
            state: match timer.state() {
                SessionState::Active => SessionStatusKind::Active,
                SessionState::Expired | SessionState::CleanedUp => SessionStatusKind::Expired,
            },
            remaining_secs: timer.remaining(),
            started_at: Some(timer.started_at()),
        },
    };
    tracing::debug!(visitor = visitor.id(), ?status, "Session status");
    Ok(Json(status))
}

fn countdown_event(remaining: u64) -> Result<Event, Infallible> {
    let name = if remaining == 0 { "expired" } else { "tick" };
    Ok(Event::default().event(name).data(remaining.to_string()))
}

/// Server-sent countdown: a `tick` event per second, then a single `expired`.
/// The countdown lives inside the response stream and stops when the client goes away.
pub async fn session_countdown(
    State(app_state): State<AppState>,
    visitor: Visitor,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let cache = app_state.booking_cache(&visitor);
    let timeout = app_state.settings.session.timeout();

    let timer = SessionTimer::initialize(&cache, app_state.clock.as_ref(), timeout)
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    let events = if timer.is_active() {
        tracing::debug!(visitor = visitor.id(), remaining = timer.remaining(), "Streaming session countdown");
        Countdown::start(timer).into_stream().map(countdown_event).boxed()
    } else {
        stream::once(async { countdown_event(0) }).boxed()
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
