/*
 * Per-thread 32-bit signal mask (spec.md §5.3 / `OSSignalKernel.cpp`):
 * each thread carries its own `signal_flags`/`signal_wait_mask` in its
 * TCB rather than pointing at a shared object, so these are free
 * functions addressed by `ThreadId` instead of a `Signal` type with
 * multiple instances.
 *
 * No-lost-wakeup: a `send` that arrives before the target calls `wait`
 * is latched in `signal_flags` and observed the moment `wait` checks
 * the mask, never discarded.
 */

use crate::error::BlockingResult;
use crate::kernel::tcb::{ThreadId, ThreadState, WakeReason};

enum Decision {
    Ready(u32),
    Blocked,
}

fn wait_decision(
    table: &mut crate::kernel::thread_table::ThreadTable,
    scheduler: &mut crate::kernel::scheduler::Scheduler,
    current: ThreadId,
    mask: u32,
    timeout_ms: Option<u64>,
    now_ms: u64,
) -> Decision {
    let tcb = match table.get_mut(current) {
        Some(t) => t,
        None => return Decision::Blocked,
    };
    tcb.signal_wait_mask = mask;
    let ready = tcb.signal_flags & mask;
    if ready != 0 {
        Decision::Ready(ready)
    } else {
        let blocked = if timeout_ms.is_some() {
            ThreadState::BlockedSignalTimeout
        } else {
            ThreadState::BlockedSignal
        };
        scheduler.block_current(table, blocked, timeout_ms, now_ms);
        Decision::Blocked
    }
}

/// Pure decision: latches `bits` into `target`'s flags and, if `target`
/// is blocked in `wait` with a matching mask, wakes it. Returns whether
/// a wake happened (so the real wrapper knows whether to `pend_switch`).
fn send_decision(table: &mut crate::kernel::thread_table::ThreadTable, target: ThreadId, bits: u32) -> bool {
    let tcb = match table.get_mut(target) {
        Some(t) => t,
        None => return false,
    };
    tcb.signal_flags |= bits;
    let is_signal_wait = matches!(
        tcb.state,
        ThreadState::BlockedSignal | ThreadState::BlockedSignalTimeout
    );
    if is_signal_wait && (tcb.signal_flags & tcb.signal_wait_mask) != 0 {
        tcb.state = ThreadState::Running;
        tcb.wake_reason = WakeReason::Granted;
        tcb.wakeup_at_ms = 0;
        true
    } else {
        false
    }
}

/// Blocks until any bit in `mask` is set, or `timeout_ms` elapses.
/// Returns the bits that satisfied the wait (a subset of `mask`). If
/// `clear_on_wake`, those bits are cleared from the thread's flags
/// before returning.
pub fn wait(mask: u32, timeout_ms: Option<u64>, clear_on_wake: bool) -> BlockingResult<u32> {
    loop {
        let decision = crate::kernel::with_kernel(|k, hal| {
            let current = k.scheduler.current;
            let now = hal.millis();
            wait_decision(&mut k.table, &mut k.scheduler, current, mask, timeout_ms, now)
        });

        match decision {
            Decision::Ready(bits) => {
                if clear_on_wake {
                    crate::kernel::with_kernel(|k, _hal| {
                        let tid = k.scheduler.current;
                        if let Some(tcb) = k.table.get_mut(tid) {
                            tcb.signal_flags &= !bits;
                        }
                    });
                }
                return BlockingResult::Ok(bits);
            }
            Decision::Blocked => {
                crate::kernel::hal().yield_now();
                let (reason, bits) = crate::kernel::with_kernel(|k, _hal| {
                    let tid = k.scheduler.current;
                    let tcb = k.table.get(tid);
                    (
                        tcb.map(|t| t.wake_reason).unwrap_or(WakeReason::None),
                        tcb.map(|t| t.signal_flags & mask).unwrap_or(0),
                    )
                });
                match reason {
                    WakeReason::TimedOut => return BlockingResult::Timeout,
                    _ => {
                        if bits != 0 {
                            if clear_on_wake {
                                crate::kernel::with_kernel(|k, _hal| {
                                    let tid = k.scheduler.current;
                                    if let Some(tcb) = k.table.get_mut(tid) {
                                        tcb.signal_flags &= !bits;
                                    }
                                });
                            }
                            return BlockingResult::Ok(bits);
                        }
                    }
                }
            }
        }
    }
}

/// Convenience wrapper that waits forever (no timeout).
pub fn wait_forever(mask: u32, clear_on_wake: bool) -> u32 {
    match wait(mask, None, clear_on_wake) {
        BlockingResult::Ok(bits) => bits,
        _ => 0,
    }
}

/// Sets `bits` on `target`'s signal flags, waking it if it's currently
/// blocked in `wait` with a mask that overlaps.
pub fn send(target: ThreadId, bits: u32) {
    crate::kernel::with_kernel(|k, hal| {
        let woke = send_decision(&mut k.table, target, bits);
        if woke {
            let woken_prio = k.table.get(target).map(|t| t.priority).unwrap_or(255);
            let cur_prio = k
                .table
                .get(k.scheduler.current)
                .map(|t| t.priority)
                .unwrap_or(255);
            if woken_prio < cur_prio {
                hal.pend_switch();
            }
        }
    });
}

/// Clears `bits` on `target`'s flags without blocking (spec.md §6's
/// `signal_clear(tid, bit)`).
pub fn signal_clear(target: ThreadId, bits: u32) {
    crate::kernel::with_kernel(|k, _hal| {
        if let Some(tcb) = k.table.get_mut(target) {
            tcb.signal_flags &= !bits;
        }
    });
}

/// Returns the overlap between `mask` and `target`'s current flags,
/// without consuming them (spec.md §6's `checkbits(tid, bit)`).
pub fn checkbits(target: ThreadId, mask: u32) -> u32 {
    crate::kernel::with_kernel(|k, _hal| {
        k.table.get(target).map(|t| t.signal_flags & mask).unwrap_or(0)
    })
}

/// Clears `bits` from the calling thread's own flags without blocking.
pub fn clear(bits: u32) {
    signal_clear(crate::kernel::current_id(), bits);
}

/// Returns the calling thread's current flags without consuming them.
pub fn peek() -> u32 {
    checkbits(crate::kernel::current_id(), u32::MAX)
}
