use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Stop flag with interruptible waits for a polling worker.
///
/// Unlike `thread::sleep()`, a wait on this signal returns as soon as
/// shutdown is triggered, or early when [`wake`](Self::wake) is called.
pub struct ShutdownSignal {
    shutdown: AtomicBool,
    condvar: Condvar,
    /// Wake generation, bumped by `wake`
    generation: Mutex<u64>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            condvar: Condvar::new(),
            generation: Mutex::new(0),
        }
    }

    /// Trigger shutdown, waking all waiting threads.
    pub fn trigger(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Hold the lock so a waiter between its check and its wait still sees the notify
        let _guard = self.lock();
        self.condvar.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// End the current wait early without shutting down.
    pub fn wake(&self) {
        let mut generation = self.lock();
        *generation = generation.wrapping_add(1);
        self.condvar.notify_all();
    }

    /// Wait for `duration`, until shutdown is triggered, or until woken.
    ///
    /// Returns `true` if shutdown was triggered.
    pub fn wait(&self, duration: Duration) -> bool {
        self.wait_since(self.wake_count(), duration)
    }

    /// Current wake generation, to pass to [`wait_since`](Self::wait_since).
    pub fn wake_count(&self) -> u64 {
        *self.lock()
    }

    /// Like [`wait`](Self::wait), but returns at once if `wake` was called
    /// since `generation` was taken.
    pub fn wait_since(&self, generation: u64, duration: Duration) -> bool {
        if self.is_shutdown() {
            return true;
        }

        let guard = self.lock();
        let result = self.condvar.wait_timeout_while(guard, duration, |current| {
            !self.is_shutdown() && *current == generation
        });

        match result {
            Ok(_) => self.is_shutdown(),
            // Poisoned, treat as shutdown
            Err(_) => true,
        }
    }

    /// The underlying flag, for APIs that poll an `&AtomicBool`.
    pub fn as_atomic(&self) -> &AtomicBool {
        &self.shutdown
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, u64> {
        self.generation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_initial_state() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutdown());
    }

    #[test]
    fn test_trigger() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        assert!(signal.is_shutdown());
    }

    #[test]
    fn test_wait_timeout() {
        let signal = ShutdownSignal::new();
        let start = Instant::now();
        let interrupted = signal.wait(Duration::from_millis(50));
        let elapsed = start.elapsed();

        assert!(!interrupted);
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(500));
    }

    #[test]
    fn test_wait_interrupted() {
        let signal = Arc::new(ShutdownSignal::new());
        let signal_clone = Arc::clone(&signal);

        let handle = thread::spawn(move || {
            let start = Instant::now();
            let interrupted = signal_clone.wait(Duration::from_secs(10));
            (interrupted, start.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        signal.trigger();

        let (interrupted, elapsed) = handle.join().unwrap();
        assert!(interrupted);
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_wake_ends_wait_without_shutdown() {
        let signal = Arc::new(ShutdownSignal::new());
        let signal_clone = Arc::clone(&signal);

        let handle = thread::spawn(move || {
            let start = Instant::now();
            let interrupted = signal_clone.wait(Duration::from_secs(10));
            (interrupted, start.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        signal.wake();

        let (interrupted, elapsed) = handle.join().unwrap();
        assert!(!interrupted);
        assert!(!signal.is_shutdown());
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_wake_before_wait_is_not_lost() {
        let signal = ShutdownSignal::new();
        let generation = signal.wake_count();
        signal.wake();

        let start = Instant::now();
        assert!(!signal.wait_since(generation, Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_wait_already_shutdown() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        let start = Instant::now();
        assert!(signal.wait(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_as_atomic() {
        let signal = ShutdownSignal::new();
        let atomic = signal.as_atomic();

        assert!(!atomic.load(Ordering::SeqCst));
        signal.trigger();
        assert!(atomic.load(Ordering::SeqCst));
    }
}
