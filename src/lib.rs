//! A process-wide parallel-for runtime with a fixed worker cohort.
//!
//! What this is:
//! - One job stack shared by the whole process, served newest-first. The
//!   thread that submits a parallel-for always participates in running it,
//!   so a pool of size one needs no worker threads at all.
//! - Nested parallelism: a task may submit its own parallel-for and the
//!   submitting worker becomes that inner job's owner.
//! - A two-tier worker cohort: surplus workers park on a separate condition
//!   variable when jobs are smaller than the pool, so small jobs don't pay
//!   for waking everyone.
//! - Failure is a status code. A non-zero task status is recorded on the
//!   job and returned from the submitting call; nothing is cancelled.
//!
//! The raw entry points ([`submit_parallel_for`]) speak the flat
//! function-pointer-and-closure-bytes ABI and are `unsafe`; the typed
//! layer ([`range_for_each`], [`for_each`]) wraps a borrowed closure for
//! ordinary use:
//!
//! ```
//! let counter = std::sync::atomic::AtomicU32::new(0);
//! let status = corvee::range_for_each(0..100, |_idx| {
//!     counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!     0
//! });
//! assert_eq!(status, 0);
//! assert_eq!(counter.into_inner(), 100);
//! corvee::shutdown_pool();
//! ```

// TODO: surface task panics to the submitter instead of aborting the process.

mod core;
mod for_each;

pub use crate::core::config::{set_thread_count, MAX_THREADS};
pub use crate::core::job::{ParallelForRunnerFn, TaskFn, TaskRunnerFn};
pub use crate::core::runner::{
    default_task_runner, run_task, set_parallel_for_runner, set_task_runner, submit_parallel_for,
};
pub use crate::core::shutdown::shutdown_pool;
pub use crate::core::{default_parallel_for_runner, stats, Stats};
pub use crate::for_each::{for_each, range_for_each};
