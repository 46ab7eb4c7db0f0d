/*
 * FIFO waiter queue shared by the mutex and semaphore (spec.md §5:
 * "waiters are granted in the order they blocked"). A fixed-capacity
 * `heapless::Deque` rather than an intrusive list, matching the
 * teacher's preference for `heapless` containers over hand-rolled
 * linked structures.
 */

use heapless::Deque;

use crate::config::MAX_THREADS;
use crate::kernel::tcb::ThreadId;
use crate::kernel::thread_table::ThreadTable;

pub struct WaitQueue {
    waiters: Deque<ThreadId, MAX_THREADS>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        WaitQueue {
            waiters: Deque::new(),
        }
    }

    /// Enqueues `tid`. Returns `Err(())` if the queue is saturated,
    /// which cannot happen in practice since it can hold at most
    /// `MAX_THREADS` entries and each thread can only wait on one
    /// primitive at a time.
    pub fn push(&mut self, tid: ThreadId) -> Result<(), ()> {
        self.waiters.push_back(tid).map_err(|_| ())
    }

    /// Pops the next waiter that's still actually alive and still in a
    /// blocked state (a waiter may have been killed while queued,
    /// spec.md §5's "a killed waiter is simply skipped").
    pub fn pop_live(&mut self, table: &ThreadTable) -> Option<ThreadId> {
        while let Some(tid) = self.waiters.pop_front() {
            if let Some(tcb) = table.get(tid) {
                if tcb.state.is_blocked() {
                    return Some(tid);
                }
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    pub fn remove(&mut self, tid: ThreadId) {
        let mut tmp = Deque::<ThreadId, MAX_THREADS>::new();
        while let Some(w) = self.waiters.pop_front() {
            if w != tid {
                let _ = tmp.push_back(w);
            }
        }
        while let Some(w) = tmp.pop_front() {
            let _ = self.waiters.push_back(w);
        }
    }
}
