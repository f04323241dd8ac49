//! The process-wide customization hooks and the entry points that dispatch
//! through them.
//!
//! Both hooks are plain function pointers stored in atomics: null means the
//! stock runner. Setters replace them with a Release store and every entry
//! point snapshots the current value with an Acquire load. There is no
//! synchronization with calls already in flight, so hooks are configuration
//! to install before any work is submitted.

use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crossbeam_utils::CachePadded;

use super::job::{ParallelForRunnerFn, TaskFn, TaskRunnerFn};

// Read on every task dispatch, so keep the two cells off each other's cache
// line.
static TASK_RUNNER: CachePadded<AtomicPtr<()>> = CachePadded::new(AtomicPtr::new(ptr::null_mut()));
static PARALLEL_FOR_RUNNER: CachePadded<AtomicPtr<()>> =
    CachePadded::new(AtomicPtr::new(ptr::null_mut()));

/// Replace the function used to run every task.
///
/// Installing `default_task_runner` restores the stock behavior.
pub fn set_task_runner(f: TaskRunnerFn) {
    TASK_RUNNER.store(f as *mut (), Ordering::Release);
}

/// Replace the function that runs a whole parallel-for.
///
/// Installing `default_parallel_for_runner` restores the stock behavior.
pub fn set_parallel_for_runner(f: ParallelForRunnerFn) {
    PARALLEL_FOR_RUNNER.store(f as *mut (), Ordering::Release);
}

/// The stock task runner: call the task function directly.
///
/// # Safety
///
/// Same contract as invoking `f` itself: the pointers must be valid for the
/// task's duration.
pub unsafe fn default_task_runner(
    user_context: *mut (),
    f: TaskFn,
    idx: i32,
    closure: *const u8,
) -> i32 {
    f(user_context, idx, closure)
}

/// Run one task through the installed task runner. This is what the worker
/// loop calls for every claimed index.
///
/// # Safety
///
/// See `default_task_runner`.
pub unsafe fn run_task(user_context: *mut (), f: TaskFn, idx: i32, closure: *const u8) -> i32 {
    let hook = TASK_RUNNER.load(Ordering::Acquire);
    if hook.is_null() {
        default_task_runner(user_context, f, idx, closure)
    } else {
        let hook: TaskRunnerFn = mem::transmute(hook);
        hook(user_context, f, idx, closure)
    }
}

/// Submit a parallel-for through the installed runner: invoke
/// `f(user_context, i, closure)` once for each `i` in `min..min + size`,
/// concurrently across the pool, and block until all of them finish.
///
/// Returns zero if every task returned zero, otherwise the status of one of
/// the failing tasks (whichever was recorded last).
///
/// # Safety
///
/// `closure` and `user_context` must stay valid until the call returns, and
/// `f` must be safe to invoke concurrently from multiple threads.
pub unsafe fn submit_parallel_for(
    user_context: *mut (),
    f: TaskFn,
    min: i32,
    size: i32,
    closure: *const u8,
) -> i32 {
    let hook = PARALLEL_FOR_RUNNER.load(Ordering::Acquire);
    if hook.is_null() {
        super::default_parallel_for_runner(user_context, f, min, size, closure)
    } else {
        let hook: ParallelForRunnerFn = mem::transmute(hook);
        hook(user_context, f, min, size, closure)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::for_each::range_for_each;
    use crate::test_util::serial;

    static RUNNER_CALLS: AtomicUsize = AtomicUsize::new(0);

    unsafe fn counting_task_runner(
        user_context: *mut (),
        f: TaskFn,
        idx: i32,
        closure: *const u8,
    ) -> i32 {
        RUNNER_CALLS.fetch_add(1, Ordering::Relaxed);
        default_task_runner(user_context, f, idx, closure)
    }

    unsafe fn serial_parallel_for(
        user_context: *mut (),
        f: TaskFn,
        min: i32,
        size: i32,
        closure: *const u8,
    ) -> i32 {
        let mut status = 0;
        for idx in min..min + size {
            let result = run_task(user_context, f, idx, closure);
            if result != 0 {
                status = result;
            }
        }
        status
    }

    #[test]
    fn custom_task_runner_sees_every_task() {
        let _guard = serial();

        RUNNER_CALLS.store(0, Ordering::SeqCst);
        set_task_runner(counting_task_runner);

        let counter = AtomicUsize::new(0);
        let status = range_for_each(0..64, |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            0
        });

        set_task_runner(default_task_runner);

        assert_eq!(status, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 64);
        assert_eq!(RUNNER_CALLS.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn custom_parallel_for_runner_replaces_the_scheduler() {
        let _guard = serial();

        set_parallel_for_runner(serial_parallel_for);

        let counter = AtomicUsize::new(0);
        let status = range_for_each(0..100, |idx| {
            counter.fetch_add(1, Ordering::Relaxed);
            if idx == 42 {
                9
            } else {
                0
            }
        });

        set_parallel_for_runner(crate::core::default_parallel_for_runner);

        assert_eq!(status, 9);
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }
}
