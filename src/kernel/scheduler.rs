/*
 * Scheduling decisions.
 *
 * Kept as "pure" functions over `&mut ThreadTable` plus an explicit
 * `now_ms`/`current` — no HAL, no global state — the same separation
 * `bbrown1867-rucos-rs`'s `Kernel<I, T, N>` uses between deciding what
 * should run next and actually switching to it. That's what lets the
 * unblock/reap/select passes run under plain `#[test]` with a
 * hand-built `ThreadTable`, no target hardware required.
 */

use crate::config::MAX_THREADS;
use crate::kernel::tcb::{ThreadId, ThreadState, WakeReason};
use crate::kernel::thread_table::ThreadTable;

pub struct Scheduler {
    pub current: ThreadId,
}

impl Scheduler {
    pub const fn new() -> Self {
        Scheduler {
            current: ThreadId::MAIN,
        }
    }

    /// Moves any `Sleeping`/`*Timeout` thread whose deadline has passed
    /// back to `Running`, recording `WakeReason::TimedOut` for the
    /// blocking-call wrappers that resume it (spec.md §4.3 item 1).
    /// Returns the number of threads unblocked.
    pub fn unblock_expired(table: &mut ThreadTable, now_ms: u64) -> usize {
        let mut woken = 0;
        for tcb in table.threads.iter_mut() {
            let expired = tcb.wakeup_at_ms != 0 && now_ms >= tcb.wakeup_at_ms;
            if !expired {
                continue;
            }
            match tcb.state {
                ThreadState::Sleeping => {
                    tcb.state = ThreadState::Running;
                    // A periodic sleeper's `wakeup_at_ms` is its own
                    // `previous_wake` for the next `sleep_periodic_ms`
                    // call (spec.md §3) — only a one-shot `sleep_ms`
                    // clears it here.
                    if tcb.interval_ms == 0 {
                        tcb.wakeup_at_ms = 0;
                    }
                    woken += 1;
                }
                s if s.has_timeout() => {
                    tcb.state = ThreadState::Running;
                    tcb.wakeup_at_ms = 0;
                    tcb.wake_reason = WakeReason::TimedOut;
                    woken += 1;
                }
                _ => {}
            }
        }
        woken
    }

    /// First-fit-from-after-current scan across priority classes: picks
    /// the lowest-numbered priority value among all `Running` slots,
    /// then round-robins among ties starting one slot after whichever
    /// slot is currently selected (spec.md §4.3 item 3). Falls back to
    /// the main thread (always present, never reaped) if nothing else
    /// is runnable.
    pub fn select_next(table: &ThreadTable, current: ThreadId) -> ThreadId {
        let start = current.index();
        let mut best: Option<(u8, usize)> = None;

        for offset in 1..=MAX_THREADS {
            let idx = (start + offset) % MAX_THREADS;
            let tcb = &table.threads[idx];
            if tcb.state != ThreadState::Running {
                continue;
            }
            match best {
                Some((best_prio, _)) if tcb.priority >= best_prio => {}
                _ => best = Some((tcb.priority, idx)),
            }
        }

        match best {
            Some((_, idx)) => ThreadId(idx as u8),
            None => ThreadId::MAIN,
        }
    }

    /// Runs the unblock and reap passes and decides whether a context
    /// switch is warranted: either the current thread is no longer
    /// `Running` (blocked/ended/suspended), or `select_next` picked
    /// someone else — which also fires for an equal-priority peer, since
    /// spec.md §5 guarantees equal-priority runnable threads are served
    /// round-robin even if neither ever yields voluntarily.
    pub fn on_tick(
        &mut self,
        table: &mut ThreadTable,
        hal: &dyn crate::hal::Hal,
        now_ms: u64,
    ) -> bool {
        Self::unblock_expired(table, now_ms);
        table.reap(hal);

        if let Some(tcb) = table.get_mut(self.current) {
            if tcb.state == ThreadState::Running {
                tcb.ticks_budget = tcb.ticks_budget.saturating_sub(1);
            }
        }

        let current_runnable = table
            .get(self.current)
            .map(|t| t.state == ThreadState::Running)
            .unwrap_or(false);

        if !current_runnable {
            return true;
        }

        Self::select_next(table, self.current) != self.current
    }

    /// A voluntary yield never needs the unblock/reap passes to justify
    /// switching away — any other `Running` thread is reason enough.
    pub fn on_yield(&mut self, table: &ThreadTable) -> bool {
        Self::select_next(table, self.current) != self.current
    }

    pub fn block_current(&self, table: &mut ThreadTable, state: ThreadState, timeout_ms: Option<u64>, now_ms: u64) {
        if let Some(tcb) = table.get_mut(self.current) {
            tcb.state = state;
            tcb.wake_reason = WakeReason::None;
            tcb.wakeup_at_ms = timeout_ms.map(|t| now_ms + t).unwrap_or(0);
        }
    }
}
