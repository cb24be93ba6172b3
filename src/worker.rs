use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Join a worker, giving up after `timeout`.
///
/// A worker still running at the deadline is detached rather than killed.
/// Returns true when the thread finished and was joined.
pub(crate) fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration, name: &str) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            log::warn!("{} did not stop within {:?}; abandoning thread", name, timeout);
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    if handle.join().is_err() {
        log::error!("{} panicked", name);
    }
    true
}
