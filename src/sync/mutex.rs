/*
 * Re-entrant, owner-tracked mutex (spec.md §5.1 / `os_mutx.h`): ownership
 * is keyed by thread id rather than by a token the caller holds, the
 * same lock/lock/unlock/unlock nesting `os_mutx.h` supports, and waiters
 * are granted strictly FIFO.
 */

use crate::error::{BlockingResult, KernelError, KernelResult};
use crate::kernel::tcb::{ThreadId, ThreadState, WakeReason};
use crate::sync::waitq::WaitQueue;

enum Decision {
    Acquired,
    Blocked,
}

struct MutexState {
    owner: Option<ThreadId>,
    depth: u32,
    waiters: WaitQueue,
}

pub struct Mutex {
    inner: spin::Mutex<MutexState>,
}

impl Mutex {
    pub const fn new() -> Self {
        Mutex {
            inner: spin::Mutex::new(MutexState {
                owner: None,
                depth: 0,
                waiters: WaitQueue::new(),
            }),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.inner.lock().owner.is_some()
    }

    pub fn owner(&self) -> Option<ThreadId> {
        self.inner.lock().owner
    }

    /// Pure decision: attempts to acquire `state` on behalf of
    /// `current`, or enqueues it as a waiter and blocks it. Takes the
    /// table/scheduler directly so it can run under `#[test]` without a
    /// real HAL.
    fn try_acquire_or_block(
        state: &mut MutexState,
        table: &mut crate::kernel::thread_table::ThreadTable,
        scheduler: &mut crate::kernel::scheduler::Scheduler,
        current: ThreadId,
        timeout_ms: Option<u64>,
        now_ms: u64,
    ) -> Decision {
        match state.owner {
            None => {
                state.owner = Some(current);
                state.depth = 1;
                Decision::Acquired
            }
            Some(o) if o == current => {
                state.depth += 1;
                Decision::Acquired
            }
            Some(_) => {
                let _ = state.waiters.push(current);
                let blocked = if timeout_ms.is_some() {
                    ThreadState::BlockedMutexTimeout
                } else {
                    ThreadState::BlockedMutex
                };
                scheduler.block_current(table, blocked, timeout_ms, now_ms);
                Decision::Blocked
            }
        }
    }

    /// Pure decision: releases one level of ownership, returning the
    /// thread (if any) that was just handed ownership so the caller can
    /// wake it.
    fn release(
        state: &mut MutexState,
        table: &crate::kernel::thread_table::ThreadTable,
        current: ThreadId,
    ) -> KernelResult<Option<ThreadId>> {
        if state.owner != Some(current) {
            return Err(KernelError::NotOwner);
        }
        state.depth -= 1;
        if state.depth > 0 {
            return Ok(None);
        }
        state.owner = None;
        match state.waiters.pop_live(table) {
            Some(next) => {
                state.owner = Some(next);
                state.depth = 1;
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }

    /// Blocking acquire. `timeout_ms = None` waits forever.
    pub fn lock(&self, timeout_ms: Option<u64>) -> BlockingResult<()> {
        loop {
            let decision = crate::kernel::with_kernel(|k, hal| {
                let current = k.scheduler.current;
                let now = hal.millis();
                let mut state = self.inner.lock();
                Self::try_acquire_or_block(
                    &mut state,
                    &mut k.table,
                    &mut k.scheduler,
                    current,
                    timeout_ms,
                    now,
                )
            });

            match decision {
                Decision::Acquired => return BlockingResult::Ok(()),
                Decision::Blocked => {
                    crate::kernel::hal().yield_now();
                    let reason = crate::kernel::with_kernel(|k, _hal| {
                        let tid = k.scheduler.current;
                        k.table
                            .get(tid)
                            .map(|t| t.wake_reason)
                            .unwrap_or(WakeReason::None)
                    });
                    if reason == WakeReason::TimedOut {
                        let mut state = self.inner.lock();
                        state.waiters.remove(crate::kernel::current_id());
                        return BlockingResult::Timeout;
                    }
                }
            }
        }
    }

    pub fn try_lock(&self) -> KernelResult<()> {
        let current = crate::kernel::current_id();
        let mut state = self.inner.lock();
        match state.owner {
            None => {
                state.owner = Some(current);
                state.depth = 1;
                Ok(())
            }
            Some(o) if o == current => {
                state.depth += 1;
                Ok(())
            }
            Some(_) => Err(KernelError::Timeout),
        }
    }

    /// Releases one level of ownership. Returns `KernelError::NotOwner`
    /// if the caller doesn't currently hold it (spec.md §5.1).
    pub fn unlock(&self) -> KernelResult<()> {
        let current = crate::kernel::current_id();
        let woken = crate::kernel::with_kernel(|k, hal| -> KernelResult<Option<ThreadId>> {
            let mut state = self.inner.lock();
            let woken = Self::release(&mut state, &k.table, current)?;
            if let Some(tid) = woken {
                if let Some(tcb) = k.table.get_mut(tid) {
                    tcb.state = ThreadState::Running;
                    tcb.wake_reason = WakeReason::Granted;
                    tcb.wakeup_at_ms = 0;
                }
                let woken_prio = k.table.get(tid).map(|t| t.priority).unwrap_or(255);
                let cur_prio = k.table.get(current).map(|t| t.priority).unwrap_or(255);
                if woken_prio < cur_prio {
                    hal.pend_switch();
                }
            }
            Ok(woken)
        })?;
        let _ = woken;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::scheduler::Scheduler;
    use crate::kernel::thread_table::ThreadTable;

    fn make_running(table: &mut ThreadTable, slot: usize, priority: u8) {
        let tcb = &mut table.threads[slot];
        tcb.state = ThreadState::Running;
        tcb.priority = priority;
    }

    #[test]
    fn reentrant_lock_nests_and_unwinds() {
        let mtx = Mutex::new();
        let mut table = ThreadTable::new();
        let mut scheduler = Scheduler::new();
        make_running(&mut table, 0, 10);
        let tid0 = ThreadId(0);

        let mut state = mtx.inner.lock();
        assert!(matches!(
            Mutex::try_acquire_or_block(&mut state, &mut table, &mut scheduler, tid0, None, 0),
            Decision::Acquired
        ));
        assert!(matches!(
            Mutex::try_acquire_or_block(&mut state, &mut table, &mut scheduler, tid0, None, 0),
            Decision::Acquired
        ));
        assert_eq!(state.depth, 2);
        drop(state);

        let mut state = mtx.inner.lock();
        assert_eq!(Mutex::release(&mut state, &table, tid0), Ok(None));
        assert_eq!(state.depth, 1);
        assert_eq!(Mutex::release(&mut state, &table, tid0), Ok(None));
        assert_eq!(state.owner, None);
    }

    #[test]
    fn contended_lock_blocks_and_hands_off_fifo() {
        let mtx = Mutex::new();
        let mut table = ThreadTable::new();
        let mut scheduler = Scheduler::new();
        make_running(&mut table, 0, 10);
        make_running(&mut table, 1, 10);
        make_running(&mut table, 2, 10);
        let (t0, t1, t2) = (ThreadId(0), ThreadId(1), ThreadId(2));

        {
            let mut state = mtx.inner.lock();
            assert!(matches!(
                Mutex::try_acquire_or_block(&mut state, &mut table, &mut scheduler, t0, None, 0),
                Decision::Acquired
            ));
        }

        scheduler.current = t1;
        {
            let mut state = mtx.inner.lock();
            assert!(matches!(
                Mutex::try_acquire_or_block(&mut state, &mut table, &mut scheduler, t1, None, 0),
                Decision::Blocked
            ));
        }
        assert_eq!(table.threads[1].state, ThreadState::BlockedMutex);

        scheduler.current = t2;
        {
            let mut state = mtx.inner.lock();
            assert!(matches!(
                Mutex::try_acquire_or_block(&mut state, &mut table, &mut scheduler, t2, Some(50), 10),
                Decision::Blocked
            ));
        }
        assert_eq!(table.threads[2].state, ThreadState::BlockedMutexTimeout);

        // t0 releases: t1 (first in FIFO) should be handed ownership.
        let mut state = mtx.inner.lock();
        let woken = Mutex::release(&mut state, &table, t0).unwrap();
        assert_eq!(woken, Some(t1));
        assert_eq!(state.owner, Some(t1));
        assert_eq!(state.depth, 1);
    }

    #[test]
    fn blocked_mutex_waiter_times_out_and_is_removed_from_waiters() {
        use crate::kernel::scheduler::Scheduler as Sched;

        let mtx = Mutex::new();
        let mut table = ThreadTable::new();
        let mut scheduler = Scheduler::new();
        make_running(&mut table, 0, 10);
        make_running(&mut table, 1, 10);
        let (t0, t1) = (ThreadId(0), ThreadId(1));

        {
            let mut state = mtx.inner.lock();
            assert!(matches!(
                Mutex::try_acquire_or_block(&mut state, &mut table, &mut scheduler, t0, None, 0),
                Decision::Acquired
            ));
        }

        scheduler.current = t1;
        {
            let mut state = mtx.inner.lock();
            assert!(matches!(
                Mutex::try_acquire_or_block(&mut state, &mut table, &mut scheduler, t1, Some(20), 0),
                Decision::Blocked
            ));
        }
        assert_eq!(table.threads[1].state, ThreadState::BlockedMutexTimeout);

        // t0 never releases; the deadline passes and the scheduler's
        // unblock pass fires the timeout instead of a mutex hand-off.
        assert_eq!(Sched::unblock_expired(&mut table, 20), 1);
        assert_eq!(table.threads[1].state, ThreadState::Running);
        assert_eq!(table.threads[1].wake_reason, WakeReason::TimedOut);

        // The timed-out waiter must be dropped from the FIFO so a later
        // release doesn't hand ownership to a thread that already gave up.
        let mut state = mtx.inner.lock();
        state.waiters.remove(t1);
        drop(state);

        let mut state = mtx.inner.lock();
        let woken = Mutex::release(&mut state, &table, t0).unwrap();
        assert_eq!(woken, None);
        assert_eq!(state.owner, None);
    }

    #[test]
    fn unlock_by_non_owner_is_rejected() {
        let mtx = Mutex::new();
        let table = ThreadTable::new();
        let mut state = mtx.inner.lock();
        assert_eq!(
            Mutex::release(&mut state, &table, ThreadId(3)),
            Err(KernelError::NotOwner)
        );
    }
}
