//! The booking session: a fixed window, counted from the moment a room is picked,
//! within which guest and payment details must be completed.

use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::Utc;
use futures::{Stream, StreamExt};
use tokio::{sync::watch, task::JoinHandle};
use tokio_stream::wrappers::WatchStream;

use crate::cache::BookingCache;

/// Source of the current time in epoch seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self { now: AtomicI64::new(now) }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_secs() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    // The results screen writes the marker when a room is picked; without it
    // there is no session to enter.
    #[error("no booking session has been started")]
    NotStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Expired,
    CleanedUp,
}

/// Raised once, when the countdown runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionExpired;

#[derive(Debug, Clone)]
pub struct SessionTimer {
    started_at: i64,
    remaining: u64,
    state: SessionState,
    expiry_reported: bool,
}

impl SessionTimer {
    pub fn initialize(cache: &BookingCache, clock: &dyn Clock, timeout: Duration) -> Result<Self, SessionError> {
        let started_at = cache.session_start().ok_or(SessionError::NotStarted)?;
        let elapsed = clock.now().saturating_sub(started_at).max(0) as u64;
        let remaining = timeout.as_secs().saturating_sub(elapsed);
        let state = if remaining == 0 { SessionState::Expired } else { SessionState::Active };
        tracing::debug!(started_at, remaining, ?state, "Booking session initialized");
        Ok(Self { started_at, remaining, state, expiry_reported: false })
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_expired(&self) -> bool {
        self.state == SessionState::Expired
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// One second passes. Returns `Some` exactly once, when the session runs out
    /// (or on the first tick of a timer that was already expired when created).
    pub fn tick(&mut self) -> Option<SessionExpired> {
        match self.state {
            SessionState::CleanedUp => None,
            SessionState::Active => {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    self.state = SessionState::Expired;
                }
                self.take_expiry()
            }
            SessionState::Expired => self.take_expiry(),
        }
    }

    fn take_expiry(&mut self) -> Option<SessionExpired> {
        if self.state == SessionState::Expired && !self.expiry_reported {
            self.expiry_reported = true;
            Some(SessionExpired)
        } else {
            None
        }
    }

    /// Terminal: forget the marker and the held selection.
    pub fn on_expire(&mut self, cache: &BookingCache) {
        self.state = SessionState::Expired;
        self.remaining = 0;
        self.expiry_reported = true;
        expire(cache);
    }

    /// Terminal: the booking went through or the visitor left on purpose.
    pub fn cleanup(&mut self, cache: &BookingCache) {
        if self.state == SessionState::Active {
            self.state = SessionState::CleanedUp;
        }
        cleanup(cache);
    }
}

/// Clears what an expired session leaves behind.
pub fn expire(cache: &BookingCache) {
    tracing::info!(scope = cache.store().scope(), "Booking session expired, clearing selection");
    cache.clear_all();
}

/// Removes the start marker so a stale timer cannot come back on a later visit.
pub fn cleanup(cache: &BookingCache) {
    cache.clear_session_start();
}

/// Drives a [`SessionTimer`] once per second on a background task and publishes the
/// remaining seconds. Dropping the countdown stops the task.
pub struct Countdown {
    updates: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl Countdown {
    pub fn start(mut timer: SessionTimer) -> Self {
        let (tx, rx) = watch::channel(timer.remaining());
        let task = tokio::spawn(async move {
            if !timer.is_active() {
                return;
            }
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let expired = timer.tick().is_some();
                if tx.send(timer.remaining()).is_err() || expired {
                    break;
                }
            }
        });
        Self { updates: rx, task }
    }

    pub fn remaining(&self) -> u64 {
        *self.updates.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.clone()
    }

    /// Remaining seconds as a stream; it ends after the value reaches zero.
    pub fn stream(&self) -> WatchStream<u64> {
        WatchStream::new(self.subscribe())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Like [`Countdown::stream`], but the stream owns the countdown: dropping the
    /// stream (a disconnected client) stops the task.
    pub fn into_stream(self) -> impl Stream<Item = u64> + Send + 'static {
        let updates = self.stream();
        futures::stream::unfold((self, updates), |(countdown, mut updates)| async move {
            let remaining = updates.next().await?;
            Some((remaining, (countdown, updates)))
        })
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub type SharedClock = Arc<dyn Clock>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::{memory_cache, sample_selection};

    const TIMEOUT: Duration = Duration::from_secs(1800);

    #[test]
    fn missing_marker_aborts_entry() {
        let cache = memory_cache();
        let clock = ManualClock::new(10_000);
        assert_eq!(SessionTimer::initialize(&cache, &clock, TIMEOUT).unwrap_err(), SessionError::NotStarted);
    }

    #[test]
    fn marker_exactly_one_timeout_old_is_expired() {
        let cache = memory_cache();
        cache.start_session(10_000);
        let clock = ManualClock::new(10_000 + 1800);
        let mut timer = SessionTimer::initialize(&cache, &clock, TIMEOUT).unwrap();
        assert!(timer.is_expired());
        assert_eq!(timer.remaining(), 0);
        assert_eq!(timer.tick(), Some(SessionExpired));
        assert_eq!(timer.tick(), None);
    }

    #[test]
    fn remaining_counts_from_the_marker() {
        let cache = memory_cache();
        cache.start_session(10_000);
        let clock = ManualClock::new(10_000 + 600);
        let timer = SessionTimer::initialize(&cache, &clock, TIMEOUT).unwrap();
        assert!(timer.is_active());
        assert_eq!(timer.remaining(), 1200);

        // a marker from the future does not extend the window
        clock.set(9_000);
        let timer = SessionTimer::initialize(&cache, &clock, TIMEOUT).unwrap();
        assert_eq!(timer.remaining(), 1800);
    }

    #[test]
    fn tick_raises_expiry_exactly_once() {
        let cache = memory_cache();
        cache.start_session(0);
        let clock = ManualClock::new(1797);
        let mut timer = SessionTimer::initialize(&cache, &clock, TIMEOUT).unwrap();
        assert_eq!(timer.remaining(), 3);
        assert_eq!(timer.tick(), None);
        assert_eq!(timer.tick(), None);
        assert_eq!(timer.tick(), Some(SessionExpired));
        assert_eq!(timer.remaining(), 0);
        for _ in 0..5 {
            assert_eq!(timer.tick(), None);
        }
        assert_eq!(timer.remaining(), 0);
    }

    #[test]
    fn expiry_clears_marker_and_selection() {
        let cache = memory_cache();
        let (hotel, offer, reference) = sample_selection();
        cache.save_selection(&hotel, &offer, &reference);
        cache.start_session(0);
        let clock = ManualClock::new(0);
        let mut timer = SessionTimer::initialize(&cache, &clock, TIMEOUT).unwrap();

        timer.on_expire(&cache);
        assert!(timer.is_expired());
        assert_eq!(cache.session_start(), None);
        assert_eq!(cache.selection(), None);
        assert_eq!(SessionTimer::initialize(&cache, &clock, TIMEOUT).unwrap_err(), SessionError::NotStarted);
    }

    #[test]
    fn cleanup_is_terminal_and_keeps_selection() {
        let cache = memory_cache();
        let (hotel, offer, reference) = sample_selection();
        cache.save_selection(&hotel, &offer, &reference);
        cache.start_session(0);
        let clock = ManualClock::new(5);
        let mut timer = SessionTimer::initialize(&cache, &clock, TIMEOUT).unwrap();

        timer.cleanup(&cache);
        assert_eq!(timer.state(), SessionState::CleanedUp);
        assert_eq!(timer.tick(), None);
        assert_eq!(cache.session_start(), None);
        assert!(cache.selection().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_publishes_every_second_and_ends_at_zero() {
        let cache = memory_cache();
        cache.start_session(0);
        let clock = ManualClock::new(1797);
        let timer = SessionTimer::initialize(&cache, &clock, TIMEOUT).unwrap();

        let countdown = Countdown::start(timer);
        let values: Vec<u64> = countdown.stream().collect().await;
        assert_eq!(values.first(), Some(&3));
        assert_eq!(values.last(), Some(&0));
        assert!(values.windows(2).all(|w| w[0] > w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_countdown_cancels_it() {
        let cache = memory_cache();
        cache.start_session(0);
        let clock = ManualClock::new(0);
        let timer = SessionTimer::initialize(&cache, &clock, TIMEOUT).unwrap();

        let countdown = Countdown::start(timer);
        let mut updates = countdown.subscribe();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(countdown.remaining(), 1798);
        updates.borrow_and_update();

        drop(countdown);
        // the sender goes away with the aborted task
        assert!(updates.changed().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn owned_stream_stops_the_task_when_dropped() {
        let cache = memory_cache();
        cache.start_session(0);
        let clock = ManualClock::new(0);
        let timer = SessionTimer::initialize(&cache, &clock, TIMEOUT).unwrap();

        let countdown = Countdown::start(timer);
        let mut updates = countdown.subscribe();
        let mut stream = Box::pin(countdown.into_stream());
        assert_eq!(stream.next().await, Some(1800));
        assert_eq!(stream.next().await, Some(1799));
        updates.borrow_and_update();

        drop(stream);
        assert!(updates.changed().await.is_err());
    }
}
