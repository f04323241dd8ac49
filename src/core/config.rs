//! Worker-count resolution.
//!
//! The count is settled once, at the first initialization, from (in order):
//! a prior programmatic override, the `HL_NUM_THREADS` environment
//! variable, its legacy spelling `HL_NUMTHREADS`, and finally the host CPU
//! count. The resolved value survives shutdown, so a re-initialized pool
//! comes back at the same size unless the override is cleared.

use std::env;
use std::thread;

use super::WORK_QUEUE;

/// Hard cap on the pool size, counting the submitting thread.
pub const MAX_THREADS: i32 = 64;

/// Override the worker count used the next time the pool initializes.
///
/// Sticky once set. Passing zero forgets the override (and any previously
/// resolved count) so the next initialization consults the environment
/// again. The pool does not resize after it starts, so calling this while
/// the pool is live has no effect.
pub fn set_thread_count(count: i32) {
    let mut state = WORK_QUEUE.state.lock().unwrap();
    debug_assert!(
        !state.initialized,
        "the pool does not resize after it starts"
    );
    if !state.initialized {
        state.worker_count = count.max(0).min(MAX_THREADS);
    }
}

/// Worker count from the environment, or the host CPU count.
///
/// An unparsable environment value counts as zero and gets clamped up to
/// one at initialization.
pub(crate) fn resolve_worker_count() -> i32 {
    let threads_str = env::var("HL_NUM_THREADS").or_else(|_| env::var("HL_NUMTHREADS"));
    match threads_str {
        Ok(s) => s.trim().parse().unwrap_or(0),
        Err(_) => thread::available_parallelism()
            .map(|n| n.get() as i32)
            .unwrap_or(1),
    }
}

pub(crate) fn clamped(count: i32) -> i32 {
    count.max(1).min(MAX_THREADS)
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::super::shutdown::shutdown_pool;
    use super::super::stats;
    use super::*;
    use crate::for_each::range_for_each;
    use crate::test_util::serial;

    #[test]
    fn clamping() {
        assert_eq!(clamped(0), 1);
        assert_eq!(clamped(-3), 1);
        assert_eq!(clamped(1), 1);
        assert_eq!(clamped(MAX_THREADS), MAX_THREADS);
        assert_eq!(clamped(9999), MAX_THREADS);
    }

    #[test]
    fn unparsable_environment_value_counts_as_zero() {
        let _guard = serial();

        env::set_var("HL_NUM_THREADS", "lots");
        assert_eq!(resolve_worker_count(), 0);
        env::remove_var("HL_NUM_THREADS");
    }

    #[test]
    fn environment_variable_controls_the_pool_size() {
        let _guard = serial();

        shutdown_pool();
        set_thread_count(0);
        env::set_var("HL_NUM_THREADS", "1");

        let counter = AtomicUsize::new(0);
        let status = range_for_each(0..1000, |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            0
        });

        assert_eq!(status, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1000);
        // One worker total: the submitting thread, zero hirelings.
        assert_eq!(stats().worker_count, 1);

        shutdown_pool();
        env::remove_var("HL_NUM_THREADS");
        set_thread_count(0);
    }

    #[test]
    fn legacy_environment_variable_is_honored() {
        let _guard = serial();

        shutdown_pool();
        set_thread_count(0);
        env::remove_var("HL_NUM_THREADS");
        env::set_var("HL_NUMTHREADS", "2");

        let counter = AtomicUsize::new(0);
        let status = range_for_each(0..100, |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            0
        });

        assert_eq!(status, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert_eq!(stats().worker_count, 2);

        shutdown_pool();
        env::remove_var("HL_NUMTHREADS");
        set_thread_count(0);
    }
}
