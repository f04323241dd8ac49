//! Shutdown
//!
//! Tearing the pool down is simple next to running it: flip the shutdown
//! flag under the mutex, broadcast every condition variable once so nobody
//! stays parked, and join the hirelings. The mutex and condition variables
//! are statics, so "destroying" them just means leaving them idle; the next
//! submission re-initializes the pool from scratch.

use std::mem;

use super::WORK_QUEUE;

/// Stop the pool and join every hireling thread.
///
/// A no-op when the pool was never initialized (or already shut down).
/// Reversible: a later submission brings the pool back up.
///
/// Callers are responsible for quiescence — no job may be in flight and no
/// other thread may be submitting while this runs. Shutting down from
/// inside a task deadlocks on the join.
pub fn shutdown_pool() {
    let mut state = WORK_QUEUE.state.lock().unwrap();
    if !state.initialized {
        return;
    }

    debug_assert!(state.jobs.is_null(), "shutting down with a job in flight");

    state.shutdown = true;
    let threads = mem::take(&mut state.threads);
    drop(state);

    WORK_QUEUE.wakeup_owners.notify_all();
    WORK_QUEUE.wakeup_a_team.notify_all();
    WORK_QUEUE.wakeup_b_team.notify_all();

    for handle in threads {
        handle.join().unwrap();
    }

    WORK_QUEUE.state.lock().unwrap().initialized = false;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::super::stats;
    use super::shutdown_pool;
    use crate::for_each::range_for_each;
    use crate::test_util::serial;

    #[test]
    fn shutdown_is_reversible() {
        let _guard = serial();

        let counter = AtomicUsize::new(0);
        range_for_each(0..10, |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            0
        });
        assert!(stats().initialized);

        shutdown_pool();
        assert!(!stats().initialized);

        // Shutting down an already-stopped pool does nothing.
        shutdown_pool();

        let counter = AtomicUsize::new(0);
        let status = range_for_each(0..10, |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            0
        });
        assert_eq!(status, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert!(stats().initialized);
    }
}
