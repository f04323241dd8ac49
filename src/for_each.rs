//! Typed closure front-ends over the raw parallel-for entry point.
//!
//! The raw entry point speaks in function pointers and opaque closure
//! bytes. These helpers erase a borrowed Rust closure into that shape with
//! a monomorphized trampoline, which is sound because the call does not
//! return until every task has finished — the borrow outlives all uses.

use std::ops::Range;
use std::ptr;

use crate::core::runner::submit_parallel_for;

/// Invoke `f` once for each index in `range`, concurrently across the pool.
///
/// Blocks until every invocation has finished, including any the closure
/// submits recursively. Returns zero if every invocation returned zero,
/// otherwise the status of one of the failing invocations.
pub fn range_for_each<F>(range: Range<i32>, f: F) -> i32
where
    F: Fn(i32) -> i32 + Sync,
{
    assert!(range.end >= range.start);

    unsafe {
        submit_parallel_for(
            ptr::null_mut(),
            closure_task::<F>,
            range.start,
            range.end - range.start,
            &f as *const F as *const u8,
        )
    }
}

unsafe fn closure_task<F>(_user_context: *mut (), idx: i32, closure: *const u8) -> i32
where
    F: Fn(i32) -> i32 + Sync,
{
    let f = &*(closure as *const F);
    f(idx)
}

/// Invoke `f` once for each item of `items`, concurrently across the pool.
///
/// Each task gets exclusive access to its item. Blocks until every
/// invocation has finished; same status aggregation as `range_for_each`.
pub fn for_each<T, F>(items: &mut [T], f: F) -> i32
where
    T: Send,
    F: Fn(&mut T) -> i32 + Sync,
{
    assert!(items.len() <= i32::MAX as usize);

    let shared = SliceForEach {
        base: items.as_mut_ptr(),
        f: &f,
    };

    unsafe {
        submit_parallel_for(
            ptr::null_mut(),
            slice_task::<T, F>,
            0,
            items.len() as i32,
            &shared as *const SliceForEach<T, F> as *const u8,
        )
    }
}

struct SliceForEach<T, F> {
    base: *mut T,
    f: *const F,
}

unsafe fn slice_task<T, F>(_user_context: *mut (), idx: i32, closure: *const u8) -> i32
where
    T: Send,
    F: Fn(&mut T) -> i32 + Sync,
{
    let shared = &*(closure as *const SliceForEach<T, F>);
    // Each index is handed out exactly once, so this is the only live
    // reference to the item.
    let item = &mut *shared.base.add(idx as usize);
    (*shared.f)(item)
}
