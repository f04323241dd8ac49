/// A unit of work: `(user_context, task_index, closure bytes) -> status`.
///
/// Returning zero means the task succeeded; any other value marks a failure
/// and is recorded on the job. The closure pointer must stay valid for the
/// whole parallel-for call that hands it out.
pub type TaskFn = unsafe fn(user_context: *mut (), idx: i32, closure: *const u8) -> i32;

/// Runs one task. Installed process-wide via `set_task_runner`.
pub type TaskRunnerFn = unsafe fn(*mut (), TaskFn, i32, *const u8) -> i32;

/// Runs a whole parallel-for. Installed process-wide via
/// `set_parallel_for_runner`.
pub type ParallelForRunnerFn = unsafe fn(*mut (), TaskFn, i32, i32, *const u8) -> i32;

/// One outstanding parallel-for invocation.
///
/// The record lives on the submitting thread's stack frame. Every other
/// thread only dereferences it while holding the queue mutex, or for the
/// duration of one task execution backed by an `active_workers` increment
/// that keeps the owner from returning.
pub(crate) struct Job {
    pub f: TaskFn,
    pub user_context: *mut (),
    pub closure: *const u8,
    /// Next index to hand out.
    pub next: i32,
    /// One past the last index.
    pub max: i32,
    /// Workers currently inside one of this job's tasks.
    pub active_workers: i32,
    /// Last non-zero task status observed, or zero. Later failures overwrite
    /// earlier ones; the scheduler does not distinguish between multiple
    /// failing tasks.
    pub exit_status: i32,
    /// The older job beneath this one on the stack.
    pub next_job: *mut Job,
}

impl Job {
    /// True while tasks remain to hand out or a worker is still inside one.
    /// The owner may only destroy the record once this is false.
    pub fn running(&self) -> bool {
        self.next < self.max || self.active_workers > 0
    }
}

/// A panic that unwinds out of a task would strand the task's
/// `active_workers` increment and deadlock the job's owner, so the worker
/// loop arms one of these around every task and disarms it on the way out.
pub(crate) struct AbortIfPanic;

impl Drop for AbortIfPanic {
    fn drop(&mut self) {
        eprintln!("task panicked; aborting");
        ::std::process::abort();
    }
}
