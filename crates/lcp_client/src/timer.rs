//! Periodic background worker.
//!
//! [`ThreadTimer`] hosts the CRL refresh on one dedicated thread. The state
//! machine is `Idle → Running → Cancelled`, with `Cancelled` terminal: a
//! stopped timer never restarts. Handler failures are captured in a slot
//! rather than raised on the timer thread; the next caller-side
//! [`ThreadTimer::rethrow_error_if_any`] surfaces the latest one and clears
//! it.
//!
//! [`ThreadTimer::stop`] is idempotent and waits for an in-flight handler
//! invocation to finish before returning, which is what makes dropping the
//! crypto provider safe while a refresh is running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

/// Fallback period when no interval provider is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Work executed on each tick. A returned error is captured, not raised.
pub type TimerHandler =
    Box<dyn FnMut() -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send>;

/// Supplies the wait before the next tick, queried once per cycle.
pub type IntervalProvider = Box<dyn Fn() -> Duration + Send>;

/// Error surfaced from a captured background failure.
#[derive(Debug, Error)]
#[error("background task failed: {0}")]
pub struct TimerError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
    Cancelled,
}

struct Shared {
    state: Mutex<State>,
    wakeup: Condvar,
    last_error: Mutex<Option<String>>,
}

/// Cooperative periodic task runner on a dedicated thread.
pub struct ThreadTimer {
    shared: Arc<Shared>,
    handler: Mutex<Option<TimerHandler>>,
    interval: Mutex<Option<IntervalProvider>>,
    auto_reset: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadTimer {
    /// Create an idle timer with no handler.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Idle),
                wakeup: Condvar::new(),
                last_error: Mutex::new(None),
            }),
            handler: Mutex::new(None),
            interval: Mutex::new(None),
            auto_reset: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    /// Install the tick handler. Must be called before [`start`](Self::start).
    pub fn set_handler(&self, handler: TimerHandler) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    /// Install the interval provider consulted before each wait.
    pub fn set_interval_provider(&self, provider: IntervalProvider) {
        *self.interval.lock().unwrap() = Some(provider);
    }

    /// When set, the handler runs repeatedly until stopped; otherwise the
    /// timer fires once and returns to idle.
    pub fn set_auto_reset(&self, auto_reset: bool) {
        self.auto_reset.store(auto_reset, Ordering::SeqCst);
    }

    /// Start the worker thread. A timer that is already running, was never
    /// given a handler, or has been cancelled stays as it is.
    pub fn start(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if *state != State::Idle {
            return;
        }
        let Some(mut handler) = self.handler.lock().unwrap().take() else {
            return;
        };
        let interval = self.interval.lock().unwrap().take();
        let auto_reset = self.auto_reset.load(Ordering::SeqCst);
        *state = State::Running;
        drop(state);

        debug!("timer started");
        let shared = self.shared.clone();
        let handle = std::thread::spawn(move || loop {
            let wait = interval
                .as_ref()
                .map(|provider| provider())
                .unwrap_or(DEFAULT_INTERVAL);
            let deadline = Instant::now() + wait;

            let mut state = shared.state.lock().unwrap();
            while *state == State::Running {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                let (guard, _) = shared
                    .wakeup
                    .wait_timeout(state, deadline - now)
                    .unwrap();
                state = guard;
            }
            if *state != State::Running {
                break;
            }
            drop(state);

            if let Err(e) = handler() {
                warn!(error = %e, "background task failed");
                *shared.last_error.lock().unwrap() = Some(e.to_string());
            }

            if !auto_reset {
                let mut state = shared.state.lock().unwrap();
                if *state == State::Running {
                    *state = State::Idle;
                }
                break;
            }
        });
        *self.worker.lock().unwrap() = Some(handle);
    }

    /// Cancel the timer and wait for an in-flight handler to finish.
    ///
    /// Idempotent; after `stop` the timer is terminally cancelled.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            *state = State::Cancelled;
            self.shared.wakeup.notify_all();
        }
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
            debug!("timer stopped");
        }
    }

    /// Surface the latest captured handler failure, then clear it.
    pub fn rethrow_error_if_any(&self) -> Result<(), TimerError> {
        match self.shared.last_error.lock().unwrap().take() {
            Some(detail) => Err(TimerError(detail)),
            None => Ok(()),
        }
    }
}

impl Default for ThreadTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
