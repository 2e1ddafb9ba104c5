//! Debounced search input.
//!
//! Re-deriving a page on every keystroke is wasted work; search-term changes
//! wait out a fixed quiescence delay before the derivation runs. Each new
//! call cancels the previously scheduled one, and dropping the debouncer
//! cancels outright so a torn-down consumer is never derived against.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Quiescence delay for search-term changes.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Schedules a callback after a quiescence delay, keeping only the latest.
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Schedule `f` to run after the delay, cancelling any pending call.
    /// Must be called from within a tokio runtime.
    pub fn call<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        }));
    }

    /// Cancel the pending call, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_rapid_calls_fire_only_the_latest() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(SEARCH_DEBOUNCE);

        for value in [1, 2, 3] {
            let fired = fired.clone();
            debouncer.call(move || {
                fired.store(value, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_calls_each_fire() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(SEARCH_DEBOUNCE);

        for _ in 0..2 {
            let count = count.clone();
            debouncer.call(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(400)).await;
        }

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_pending_call() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(SEARCH_DEBOUNCE);

        {
            let count = count.clone();
            debouncer.call(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_call() {
        let count = Arc::new(AtomicUsize::new(0));

        {
            let mut debouncer = Debouncer::new(SEARCH_DEBOUNCE);
            let count = count.clone();
            debouncer.call(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
