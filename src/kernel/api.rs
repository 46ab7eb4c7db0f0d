/*
 * Public thread-kernel surface (spec.md §6's thread table).
 *
 * Every entry point here takes the kernel lock just long enough to
 * mutate shared state, then drops it before calling into the HAL
 * (`pend_switch`/`yield_now`) so exception handlers never deadlock
 * against the same spinlock.
 */

use crate::config::DEFAULT_STACK0_SIZE;
use crate::error::{KernelError, KernelResult};
use crate::kernel::tcb::{ThreadEntry, ThreadId, ThreadState};
use crate::kernel::{exit_current, kernel_thread_exit_addr, with_kernel};

/// Creates a thread from caller-supplied storage (`stack` must outlive
/// the thread; callers typically hand in a `'static mut [u8; N]`).
/// Lower `priority` values run first (spec.md §4.3).
pub fn spawn(
    entry: fn(usize),
    arg: usize,
    priority: u8,
    stack: &'static mut [u8],
) -> KernelResult<ThreadId> {
    let kill_addr = kernel_thread_exit_addr();
    with_kernel(|k, _hal| unsafe {
        k.table.spawn(
            ThreadEntry { entry, arg },
            priority,
            stack,
            false,
            kill_addr,
        )
    })
}

/// Creates a thread using a HAL-allocated stack of `stack_size` bytes
/// (falls back to `DEFAULT_STACK0_SIZE` if zero). Returns
/// `KernelError::ResourceExhausted` if the board has no allocator
/// configured (spec.md §6: stack allocation is an external collaborator).
pub fn spawn_with_allocated_stack(
    entry: fn(usize),
    arg: usize,
    priority: u8,
    stack_size: usize,
) -> KernelResult<ThreadId> {
    let size = if stack_size == 0 {
        DEFAULT_STACK0_SIZE
    } else {
        stack_size
    };
    let kill_addr = kernel_thread_exit_addr();
    with_kernel(|k, hal| {
        let stack = hal.alloc_stack(size).ok_or(KernelError::ResourceExhausted)?;
        unsafe {
            k.table
                .spawn(ThreadEntry { entry, arg }, priority, stack, true, kill_addr)
        }
    })
}

/// Kills another thread (or, if `tid` is the caller, itself). Killing a
/// suspended or blocked thread releases no waiter-queue entry it may
/// hold; that is swept the next time the owning primitive's waiter list
/// is walked (spec.md §5's "a killed waiter is simply skipped").
pub fn kill(tid: ThreadId) -> KernelResult<()> {
    if tid == crate::kernel::current_id() {
        exit_current();
        return Ok(());
    }
    with_kernel(|k, _hal| k.table.kill(tid))?;
    request_switch();
    Ok(())
}

pub fn suspend(tid: ThreadId) -> KernelResult<()> {
    let r = with_kernel(|k, _hal| k.table.suspend(tid));
    if r.is_ok() && tid == crate::kernel::current_id() {
        crate::kernel::hal().yield_now();
    }
    r
}

pub fn resume(tid: ThreadId) -> KernelResult<()> {
    with_kernel(|k, hal| {
        let r = k.table.resume(tid);
        if r.is_ok() {
            let cur_prio = k.table.get(k.scheduler.current).map(|t| t.priority).unwrap_or(255);
            let new_prio = k.table.get(tid).map(|t| t.priority).unwrap_or(255);
            if new_prio < cur_prio {
                hal.pend_switch();
            }
        }
        r
    })
}

pub fn current_id() -> ThreadId {
    crate::kernel::current_id()
}

/// Puts the calling thread to sleep for at least `ms` milliseconds. Does
/// not return until the sleep has elapsed and the thread is rescheduled.
pub fn sleep_ms(ms: u64) {
    with_kernel(|k, hal| {
        let now = hal.millis();
        k.scheduler
            .block_current(&mut k.table, ThreadState::Sleeping, Some(ms), now);
        if let Some(tcb) = k.table.get_mut(crate::kernel::current_id()) {
            tcb.interval_ms = 0;
        }
    });
    crate::kernel::hal().yield_now();
}

/// Sleeps until the next multiple of `interval_ms` since this thread's
/// last periodic wake, not `interval_ms` from now (spec.md §3:
/// `wakeup_at_ms = previous_wake + interval_ms` after each run). The
/// first call in a periodic loop has no previous wake to anchor to, so
/// it falls back to `now + interval_ms`; every call after that is
/// drift-free against the original schedule rather than against however
/// late the thread got around to calling this again.
pub fn sleep_periodic_ms(interval_ms: u64) {
    with_kernel(|k, hal| {
        let now = hal.millis();
        let tid = crate::kernel::current_id();
        let base = k
            .table
            .get(tid)
            .filter(|t| t.interval_ms == interval_ms && t.wakeup_at_ms != 0)
            .map(|t| t.wakeup_at_ms)
            .unwrap_or(now);
        k.scheduler
            .block_current(&mut k.table, ThreadState::Sleeping, Some(interval_ms), now);
        if let Some(tcb) = k.table.get_mut(tid) {
            tcb.interval_ms = interval_ms;
            tcb.wakeup_at_ms = base + interval_ms;
        }
    });
    crate::kernel::hal().yield_now();
}

/// Voluntarily gives up the remainder of the current time slice.
pub fn yield_now() {
    with_kernel(|_k, hal| hal.yield_now());
}

fn request_switch() {
    with_kernel(|_k, hal| hal.pend_switch());
}
