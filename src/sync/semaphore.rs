/*
 * Counting semaphore (spec.md §5.2): FIFO waiters, `give` either hands
 * the unit straight to the longest-waiting blocked thread or increments
 * the count, saturating at the configured maximum rather than
 * overflowing (spec.md §5.2's "give past the ceiling is a no-op, not an
 * error").
 */

use crate::error::BlockingResult;
use crate::kernel::tcb::{ThreadId, ThreadState, WakeReason};
use crate::sync::waitq::WaitQueue;

enum Decision {
    Acquired,
    Blocked,
}

struct SemState {
    count: u32,
    waiters: WaitQueue,
}

pub struct Semaphore {
    inner: spin::Mutex<SemState>,
    max: u32,
}

impl Semaphore {
    pub const fn new(initial: u32, max: u32) -> Self {
        Semaphore {
            inner: spin::Mutex::new(SemState {
                count: initial,
                waiters: WaitQueue::new(),
            }),
            max,
        }
    }

    pub fn count(&self) -> u32 {
        self.inner.lock().count
    }

    fn try_take_or_block(
        state: &mut SemState,
        table: &mut crate::kernel::thread_table::ThreadTable,
        scheduler: &mut crate::kernel::scheduler::Scheduler,
        current: ThreadId,
        timeout_ms: Option<u64>,
        now_ms: u64,
    ) -> Decision {
        if state.count > 0 {
            state.count -= 1;
            Decision::Acquired
        } else {
            let _ = state.waiters.push(current);
            let blocked = if timeout_ms.is_some() {
                ThreadState::BlockedSemaphoreTimeout
            } else {
                ThreadState::BlockedSemaphore
            };
            scheduler.block_current(table, blocked, timeout_ms, now_ms);
            Decision::Blocked
        }
    }

    /// Pure decision: hands the unit to the next live waiter if one
    /// exists, otherwise increments the saturating count. Returns the
    /// woken thread, if any.
    fn give_decision(
        state: &mut SemState,
        table: &crate::kernel::thread_table::ThreadTable,
        max: u32,
    ) -> Option<ThreadId> {
        match state.waiters.pop_live(table) {
            Some(tid) => Some(tid),
            None => {
                state.count = (state.count + 1).min(max.max(1));
                None
            }
        }
    }

    pub fn take(&self, timeout_ms: Option<u64>) -> BlockingResult<()> {
        loop {
            let decision = crate::kernel::with_kernel(|k, hal| {
                let current = k.scheduler.current;
                let now = hal.millis();
                let mut state = self.inner.lock();
                Self::try_take_or_block(
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

    pub fn try_take(&self) -> bool {
        let mut state = self.inner.lock();
        if state.count > 0 {
            state.count -= 1;
            true
        } else {
            false
        }
    }

    pub fn give(&self) {
        crate::kernel::with_kernel(|k, hal| {
            let mut state = self.inner.lock();
            if let Some(tid) = Self::give_decision(&mut state, &k.table, self.max) {
                drop(state);
                if let Some(tcb) = k.table.get_mut(tid) {
                    tcb.state = ThreadState::Running;
                    tcb.wake_reason = WakeReason::Granted;
                    tcb.wakeup_at_ms = 0;
                }
                let woken_prio = k.table.get(tid).map(|t| t.priority).unwrap_or(255);
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
    fn take_without_units_blocks_then_give_wakes_fifo_waiter() {
        let sem = Semaphore::new(0, 4);
        let mut table = ThreadTable::new();
        let mut scheduler = Scheduler::new();
        make_running(&mut table, 0, 10);
        make_running(&mut table, 1, 10);
        let (t0, t1) = (ThreadId(0), ThreadId(1));

        scheduler.current = t0;
        {
            let mut state = sem.inner.lock();
            assert!(matches!(
                Semaphore::try_take_or_block(&mut state, &mut table, &mut scheduler, t0, None, 0),
                Decision::Blocked
            ));
        }
        assert_eq!(table.threads[0].state, ThreadState::BlockedSemaphore);

        scheduler.current = t1;
        {
            let mut state = sem.inner.lock();
            assert!(matches!(
                Semaphore::try_take_or_block(&mut state, &mut table, &mut scheduler, t1, None, 0),
                Decision::Blocked
            ));
        }

        // One give hands the unit straight to t0 (first in FIFO), not t1,
        // and does not touch the saturating count.
        let mut state = sem.inner.lock();
        let woken = Semaphore::give_decision(&mut state, &table, sem.max);
        assert_eq!(woken, Some(t0));
        assert_eq!(state.count, 0);
    }

    #[test]
    fn give_past_ceiling_saturates() {
        let sem = Semaphore::new(0, 2);
        let table = ThreadTable::new();
        let mut state = sem.inner.lock();
        for _ in 0..5 {
            Semaphore::give_decision(&mut state, &table, sem.max);
        }
        assert_eq!(state.count, 2);
    }

    #[test]
    fn take_with_units_available_succeeds_immediately() {
        let sem = Semaphore::new(1, 1);
        let mut table = ThreadTable::new();
        let mut scheduler = Scheduler::new();
        make_running(&mut table, 0, 10);
        let mut state = sem.inner.lock();
        assert!(matches!(
            Semaphore::try_take_or_block(&mut state, &mut table, &mut scheduler, ThreadId(0), None, 0),
            Decision::Acquired
        ));
        assert_eq!(state.count, 0);
    }
}
