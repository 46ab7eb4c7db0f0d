/*
 * Test-only HAL: a virtual millisecond clock plus counters for the
 * events a real board would raise (PendSV requests, SVC traps, fatal
 * faults). Used so the scheduler/sync-primitive/FSM logic can be
 * exercised under `std` without target hardware.
 *
 * Tests drive time explicitly with `MockHal::advance`, then call the
 * kernel's "pure decision" entry points (`kernel::on_tick`,
 * `Scheduler::select_next`, ...) directly rather than relying on a real
 * PendSV-driven context switch, which this HAL does not attempt to
 * emulate — see SPEC_FULL.md's Testing section.
 */

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::hal::Hal;

#[derive(Default)]
pub struct MockHal {
    millis: AtomicU64,
    pend_count: AtomicUsize,
    yield_count: AtomicUsize,
}

impl MockHal {
    pub const fn new() -> Self {
        Self {
            millis: AtomicU64::new(0),
            pend_count: AtomicUsize::new(0),
            yield_count: AtomicUsize::new(0),
        }
    }

    pub fn advance(&self, ms: u64) -> u64 {
        self.millis.fetch_add(ms, Ordering::SeqCst) + ms
    }

    pub fn pend_count(&self) -> usize {
        self.pend_count.load(Ordering::SeqCst)
    }
}

impl Hal for MockHal {
    fn millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }

    fn install(&self) {}

    fn pend_switch(&self) {
        self.pend_count.fetch_add(1, Ordering::SeqCst);
    }

    fn yield_now(&self) {
        self.yield_count.fetch_add(1, Ordering::SeqCst);
    }

    fn debug_write(&self, s: &str) {
        std::eprint!("{s}");
    }
}
