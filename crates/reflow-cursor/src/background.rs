//! Background cache-fill worker (spec §4.5 "background fill", §5 "Shared
//! resource policy"): a single long-lived worker that extends the current
//! section's cache while the user is reading, cooperatively preemptable by
//! the foreground.
//!
//! The worker doesn't know anything about chapters or pages; it just calls
//! a host-supplied `step` closure on a loop until told to stop. The host
//! wires `step` to an `ensure_cached`-style extension call guarded by the
//! same mutex the foreground uses, so the two never race on the cache
//! handle (spec: "it holds a mutex over the shared cache handle; foreground
//! requests are allowed to preempt by setting a stop flag").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to a running background-fill worker. Dropping it stops and joins
/// the worker, matching the policy that on stop the worker is "torn down
/// and recreated as needed" rather than left dangling.
pub struct BackgroundFill {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundFill {
    /// Spawn a worker that calls `step` repeatedly, sleeping `idle_delay`
    /// between calls, until `step` returns `false` (no more work, e.g. the
    /// chapter finished) or [`BackgroundFill::stop`] is called.
    ///
    /// `step` itself is responsible for checking whatever `should_abort`
    /// signal it was built with; this type only supplies the coarse-grained
    /// preemption the spec describes, not a layout-level cooperative poll.
    pub fn spawn<F>(idle_delay: Duration, mut step: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_worker = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            while !stop_for_worker.load(Ordering::Relaxed) {
                if !step() {
                    break;
                }
                thread::sleep(idle_delay);
            }
        });
        Self { stop, handle: Some(handle) }
    }

    /// Ask the worker to stop after its current `step()` call returns. Does
    /// not block; call [`BackgroundFill::join`] (or drop this handle) to
    /// wait for the thread to actually exit.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Stop and block until the worker thread exits.
    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BackgroundFill {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn worker_runs_steps_until_told_to_stop() {
        let count = Arc::new(Mutex::new(0u32));
        let count_for_worker = Arc::clone(&count);
        let worker = BackgroundFill::spawn(Duration::from_millis(1), move || {
            let mut guard = count_for_worker.lock().unwrap();
            *guard += 1;
            *guard < 5
        });
        // Give the worker a moment to exhaust its own work (`step` returns
        // false at count 5) rather than racing `stop`.
        thread::sleep(Duration::from_millis(50));
        worker.join();
        assert_eq!(*count.lock().unwrap(), 5);
    }

    #[test]
    fn stop_halts_a_worker_with_unbounded_work() {
        let count = Arc::new(Mutex::new(0u32));
        let count_for_worker = Arc::clone(&count);
        let worker = BackgroundFill::spawn(Duration::from_millis(1), move || {
            *count_for_worker.lock().unwrap() += 1;
            true
        });
        thread::sleep(Duration::from_millis(20));
        worker.stop();
        let seen_after_stop = *count.lock().unwrap();
        thread::sleep(Duration::from_millis(20));
        let seen_later = *count.lock().unwrap();
        // At most one more step can land after `stop()` is observed.
        assert!(seen_later <= seen_after_stop + 1);
    }
}
