//! The work queue and the worker loop.
//!
//! There is exactly one work queue per process. The pool is a system
//! resource: recreating worker threads for every call would dwarf the cost
//! of the work itself, so the queue initializes lazily under its mutex on
//! the first submission and stays up until `shutdown_pool`.
//!
//! Jobs form a LIFO stack of records owned by their submitters' stack
//! frames. Any worker claims tasks from the job on top; there is no
//! stealing between sibling jobs and no fairness beyond stack order.
//!
//! Workers are split into an A team and a B team. The A team picks up
//! tasks; the B team parks on its own condition variable so that small jobs
//! don't pay for waking the whole cohort. A worker that wakes up and finds
//! the A team above its target size moves itself to the B team, and comes
//! back when a job asks for more parallelism.

pub mod config;
pub mod job;
pub mod runner;
pub mod shutdown;

use std::mem;
use std::ptr;
use std::sync::{Condvar, Mutex};
use std::thread;

use self::job::{AbortIfPanic, Job, TaskFn};

/// Everything the scheduler mutates. All fields are protected by the queue
/// mutex; tasks themselves always run outside it.
pub(crate) struct State {
    /// Top of the job stack, or null.
    jobs: *mut Job,
    /// Workers currently eligible to pick up tasks: waiting on
    /// `wakeup_a_team` or inside a task. The submitting thread counts too.
    a_team_size: i32,
    /// Where `a_team_size` should settle. Set at each submission.
    target_a_team_size: i32,
    /// Hireling handles, joined at shutdown.
    threads: Vec<thread::JoinHandle<()>>,
    shutdown: bool,
    initialized: bool,
    /// Resolved worker count, counting the submitting thread. Zero until
    /// resolved or overridden; survives shutdown so re-initialization does
    /// not consult the environment again.
    worker_count: i32,
    counters: Counters,
}

// The raw job pointers in the state are only dereferenced under the queue
// mutex, and the stack frames they point into cannot retire while the
// pointers are reachable (the owner is stuck in the worker loop until its
// job stops running).
unsafe impl Send for State {}

impl State {
    const fn new() -> Self {
        State {
            jobs: ptr::null_mut(),
            a_team_size: 0,
            target_a_team_size: 0,
            threads: Vec::new(),
            shutdown: false,
            initialized: false,
            worker_count: 0,
            counters: Counters {
                b_team_parks: 0,
                tasks_run: 0,
            },
        }
    }

    fn running(&self) -> bool {
        !self.shutdown
    }
}

#[derive(Copy, Clone)]
struct Counters {
    b_team_parks: u64,
    tasks_run: u64,
}

/// The process-wide singleton: one mutex, three condition variables.
///
/// The condition variables are deliberately separate. Owners, the A team
/// and the B team wake for different reasons, and broadcasting a shared
/// condvar would wake the wrong cohort.
pub(crate) struct WorkQueue {
    pub state: Mutex<State>,
    /// Broadcast when a job completes.
    pub wakeup_owners: Condvar,
    /// Broadcast when a job is pushed.
    pub wakeup_a_team: Condvar,
    /// Also broadcast on push, when the job wants more workers than the A
    /// team currently has.
    pub wakeup_b_team: Condvar,
}

// Std types here rather than anything swappable: the queue must be a
// const-initialized static.
pub(crate) static WORK_QUEUE: WorkQueue = WorkQueue {
    state: Mutex::new(State::new()),
    wakeup_owners: Condvar::new(),
    wakeup_a_team: Condvar::new(),
    wakeup_b_team: Condvar::new(),
};

/// First-submission setup. Runs with the queue mutex held; the freshly
/// spawned hirelings block on that mutex until the caller releases it.
fn initialize(state: &mut State) {
    state.shutdown = false;
    state.jobs = ptr::null_mut();

    if state.worker_count == 0 {
        state.worker_count = config::resolve_worker_count();
    }
    state.worker_count = config::clamped(state.worker_count);

    let hirelings = (state.worker_count - 1) as usize;
    state.threads = Vec::with_capacity(hirelings);
    for i in 0..hirelings {
        let handle = thread::Builder::new()
            .name(format!("corvee-worker#{}", i))
            .spawn(|| {
                profiling::register_thread!("Worker");

                worker_loop(ptr::null_mut());
            })
            .unwrap();
        state.threads.push(handle);
    }

    // Everyone starts on the A team.
    state.a_team_size = state.worker_count;
    state.target_a_team_size = state.worker_count;

    state.initialized = true;
}

/// The stock parallel-for: push a job onto the stack, wake workers, then
/// participate until the job retires.
///
/// Participation is not an optimization only: the pool may have zero
/// hirelings, in which case the submitting thread executes every task
/// itself. It also keeps latency down for small jobs.
///
/// Returns zero if every task returned zero, otherwise the status of
/// whichever failing task was recorded last.
///
/// # Safety
///
/// `closure` and `user_context` must stay valid until the call returns, and
/// `f` must be safe to invoke concurrently from multiple threads with the
/// indices `min..min + size`.
pub unsafe fn default_parallel_for_runner(
    user_context: *mut (),
    f: TaskFn,
    min: i32,
    size: i32,
    closure: *const u8,
) -> i32 {
    profiling::scope!("parallel_for");

    if size <= 0 {
        // Nothing to hand out. Pushing a record that already looks fully
        // claimed would leave the stack head dangling once we return.
        return 0;
    }

    let mut state = WORK_QUEUE.state.lock().unwrap();

    if !state.initialized {
        initialize(&mut state);
    }

    let worker_count = state.worker_count;

    let mut job = Job {
        f,
        user_context,
        closure,
        next: min,
        max: min + size,
        active_workers: 0,
        exit_status: 0,
        next_job: state.jobs,
    };

    if state.jobs.is_null() && size < worker_count {
        // A small job with no nested parallelism in flight: let the surplus
        // workers move to the B team and sleep until a larger job arrives.
        state.target_a_team_size = size;
    } else {
        state.target_a_team_size = worker_count;
    }

    // Read before the push so the new job's own demand is measured against
    // the workers awake right now.
    let wake_b_team = size > state.a_team_size;

    let job_ptr: *mut Job = &mut job;
    state.jobs = job_ptr;

    drop(state);

    WORK_QUEUE.wakeup_a_team.notify_all();
    if wake_b_team {
        WORK_QUEUE.wakeup_b_team.notify_all();
    }

    worker_loop(job_ptr);

    // No lock needed: the loop above only returns once `running()` is
    // false, so every handed-out task has retired its `active_workers`
    // increment and no other thread will touch the record again.
    job.exit_status
}

/// The loop every thread in the cohort runs.
///
/// An owner (`owned_job` non-null) is the thread that submitted that job;
/// it stays only until its own job retires. A hireling (`owned_job` null)
/// stays for the lifetime of the pool. That predicate is the only
/// behavioral difference between the two roles.
pub(crate) fn worker_loop(owned_job: *mut Job) {
    let mut state = WORK_QUEUE.state.lock().unwrap();

    loop {
        let keep_going = if owned_job.is_null() {
            state.running()
        } else {
            unsafe { (*owned_job).running() }
        };
        if !keep_going {
            break;
        }

        if state.jobs.is_null() {
            if !owned_job.is_null() {
                // All of our tasks are handed out but some are still in
                // flight. Owners must not sleep on the A-team condvar (that
                // one is for hirelings awaiting work); wait for the last
                // worker to announce the job's completion instead.
                state = WORK_QUEUE.wakeup_owners.wait(state).unwrap();
            } else if state.a_team_size <= state.target_a_team_size {
                state = WORK_QUEUE.wakeup_a_team.wait(state).unwrap();
            } else {
                // Surplus worker: park on the B team until a job asks for
                // more parallelism. A spurious wakeup flips the thread back
                // through the A team for one pass, which is benign.
                state.a_team_size -= 1;
                state.counters.b_team_parks += 1;
                state = WORK_QUEUE.wakeup_b_team.wait(state).unwrap();
                state.a_team_size += 1;
            }
            continue;
        }

        // Claim one task from the job on top of the stack.
        let top = state.jobs;
        let (f, user_context, closure, idx) = unsafe {
            let idx = (*top).next;
            (*top).next += 1;
            if (*top).next == (*top).max {
                // Every task is handed out; pop the job. Workers may still
                // be inside its tasks, so the record stays alive through
                // `active_workers`.
                state.jobs = (*top).next_job;
            }
            (*top).active_workers += 1;
            ((*top).f, (*top).user_context, (*top).closure, idx)
        };

        drop(state);

        let abort = AbortIfPanic;
        let result = {
            profiling::scope!("task");
            unsafe { runner::run_task(user_context, f, idx, closure) }
        };
        mem::forget(abort);

        state = WORK_QUEUE.state.lock().unwrap();
        state.counters.tasks_run += 1;

        unsafe {
            if result != 0 {
                (*top).exit_status = result;
            }
            (*top).active_workers -= 1;

            // If that was the job's last outstanding task and it belongs to
            // some other thread, its owner may be asleep; wake it.
            if !(*top).running() && top != owned_job {
                WORK_QUEUE.wakeup_owners.notify_all();
            }
        }
    }
}

/// A snapshot of scheduler state, for debugging and tests.
#[derive(Copy, Clone, Debug, Default)]
pub struct Stats {
    pub initialized: bool,
    /// Pool size, counting the submitting thread.
    pub worker_count: i32,
    pub a_team_size: i32,
    pub target_a_team_size: i32,
    /// Times a surplus worker parked itself on the B team.
    pub b_team_parks: u64,
    pub tasks_run: u64,
}

/// Get some stats for debugging purposes.
pub fn stats() -> Stats {
    let state = WORK_QUEUE.state.lock().unwrap();
    Stats {
        initialized: state.initialized,
        worker_count: state.worker_count,
        a_team_size: state.a_team_size,
        target_a_team_size: state.target_a_team_size,
        b_team_parks: state.counters.b_team_parks,
        tasks_run: state.counters.tasks_run,
    }
}
