//! Leading-edge debouncer.
//!
//! The first call in a quiet period runs immediately and opens a window.
//! Calls made while the window is open replace the pending callback and
//! push the deadline out; when the window finally closes the latest
//! pending callback runs once. A burst of N calls therefore produces one
//! immediate run and at most one trailing run.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct DebounceState {
    batching: bool,
    pending: Option<Callback>,
    /// Bumped on every arm so stale timers can tell they were superseded.
    epoch: u64,
}

#[derive(Clone)]
pub struct Debouncer {
    interval: Duration,
    state: Arc<Mutex<DebounceState>>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Debouncer")
            .field("interval", &self.interval)
            .field("batching", &state.batching)
            .field("pending", &state.pending.is_some())
            .finish()
    }
}

impl Debouncer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Must be called from within a tokio runtime.
    pub fn run<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let immediate = {
            let mut state = self.state.lock();
            let epoch = self.arm(&mut state);
            if state.batching {
                state.pending = Some(Box::new(callback));
                self.spawn_timer(epoch);
                None
            } else {
                state.batching = true;
                self.spawn_timer(epoch);
                Some(callback)
            }
        };
        if let Some(callback) = immediate {
            callback();
        }
    }

    /// True while a trailing callback is waiting for the window to close.
    pub fn has_pending(&self) -> bool {
        let state = self.state.lock();
        state.batching && state.pending.is_some()
    }

    /// Drops any pending callback and returns to idle.
    pub fn cleanup(&self) {
        let mut state = self.state.lock();
        state.pending = None;
        state.batching = false;
        state.epoch = state.epoch.wrapping_add(1);
    }

    fn arm(&self, state: &mut DebounceState) -> u64 {
        state.epoch = state.epoch.wrapping_add(1);
        state.epoch
    }

    fn spawn_timer(&self, epoch: u64) {
        let state = Arc::clone(&self.state);
        let interval = self.interval;
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let fire = {
                let mut state = state.lock();
                if state.epoch != epoch {
                    return;
                }
                state.batching = false;
                state.pending.take()
            };
            if let Some(callback) = fire {
                callback();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        let make = move || {
            let handle = Arc::clone(&handle);
            Box::new(move || {
                handle.fetch_add(1, Ordering::SeqCst);
            }) as Box<dyn FnOnce() + Send>
        };
        (count, make)
    }

    #[test_timeout::tokio_timeout_test(5, paused)]
    async fn first_call_runs_immediately() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let (count, make) = counter();
        debouncer.run(make());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!debouncer.has_pending());
    }

    #[test_timeout::tokio_timeout_test(5, paused)]
    async fn burst_collapses_to_leading_and_trailing_run() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let (count, make) = counter();
        for _ in 0..25 {
            debouncer.run(make());
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(debouncer.has_pending());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!debouncer.has_pending());
    }

    #[test_timeout::tokio_timeout_test(5, paused)]
    async fn idle_window_resets() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let (count, make) = counter();
        debouncer.run(make());
        tokio::time::sleep(Duration::from_millis(15)).await;
        debouncer.run(make());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test_timeout::tokio_timeout_test(5, paused)]
    async fn cleanup_drops_pending() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let (count, make) = counter();
        debouncer.run(make());
        debouncer.run(make());
        debouncer.cleanup();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
