//! Session control: cooperative pause, cancellation, and human pacing.
//!
//! Pause and cancellation travel through shared handles rather than global
//! flags. Every public agent action calls [`SessionControl::pause_point`]
//! before doing work; while paused the caller sleeps in `POLL_INTERVAL`
//! increments, and cancellation during a pause surfaces as
//! [`Error::Cancelled`] on the next wake.

use crate::constants::timing;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

/// Cooperative cancellation handle.
///
/// Cloneable; all clones observe the same flag. `cancelled()` resolves once
/// the token is cancelled, which lets long operations race work against it.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the token and wake all waiters.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Error out if the token has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Wait until the token is cancelled.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.inner.notify.notified().await;
        }
    }
}

/// Snapshot of the session lifecycle state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub started_at: Option<DateTime<Utc>>,
    pub paused: bool,
    pub stopped: bool,
    pub current_task: Option<String>,
}

/// Shared pause/stop control observed by all agents.
#[derive(Clone, Debug, Default)]
pub struct SessionControl {
    paused: Arc<AtomicBool>,
    cancel: CancelToken,
    state: Arc<Mutex<SessionMeta>>,
}

#[derive(Debug, Default)]
struct SessionMeta {
    started_at: Option<DateTime<Utc>>,
    current_task: Option<String>,
}

impl SessionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the session started.
    pub fn mark_started(&self) {
        let mut meta = self.state.lock().expect("session state poisoned");
        meta.started_at = Some(Utc::now());
    }

    pub fn set_current_task(&self, task_id: Option<String>) {
        let mut meta = self.state.lock().expect("session state poisoned");
        meta.current_task = task_id;
    }

    /// Raise the shared pause flag.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Clear the shared pause flag.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Stop the session, cancelling all in-flight cooperative work.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The session-wide cancellation token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Cooperative suspension point.
    ///
    /// Returns immediately when not paused; otherwise sleeps in
    /// `POLL_INTERVAL` steps until resumed. Cancellation is honoured both
    /// during the pause and on entry.
    pub async fn pause_point(&self) -> Result<()> {
        self.cancel.check()?;
        while self.is_paused() {
            sleep(timing::POLL_INTERVAL).await;
            self.cancel.check()?;
        }
        Ok(())
    }

    /// Current lifecycle snapshot.
    pub fn state(&self) -> SessionState {
        let meta = self.state.lock().expect("session state poisoned");
        SessionState {
            started_at: meta.started_at,
            paused: self.is_paused(),
            stopped: self.is_stopped(),
            current_task: meta.current_task.clone(),
        }
    }
}

/// Human-like pacing: random uniform delays within `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub min: Duration,
    pub max: Duration,
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Self {
        // A reversed range would panic in the sampler; normalise it here.
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// The crate-default human delay range (0.3 s – 1.0 s).
    pub fn human() -> Self {
        Self::new(timing::HUMAN_DELAY_MIN, timing::HUMAN_DELAY_MAX)
    }

    /// Zero-delay pacing for tests.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Draw one delay from the uniform distribution.
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }

    /// Sleep for one sampled delay.
    pub async fn human_delay(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    /// Sleep within an explicit range, ignoring the configured one.
    pub async fn delay_between(&self, min: Duration, max: Duration) {
        Pacing::new(min, max).human_delay().await;
    }
}
