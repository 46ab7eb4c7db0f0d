/*
 * Kernel singleton and the free functions the HAL's exception handlers
 * call into (spec.md §4: thread table + context switcher + scheduler,
 * wired together behind one lock). Mirrors how both reference ports
 * keep a single global task/kernel struct behind a critical section
 * rather than passing it around explicitly.
 */

pub mod api;
pub mod scheduler;
pub mod tcb;
pub mod thread_table;

use spin::{Mutex, Once};

use crate::hal::Hal;
use crate::kernel::scheduler::Scheduler;
use crate::kernel::tcb::ThreadId;
use crate::kernel::thread_table::ThreadTable;

pub struct Kernel {
    pub table: ThreadTable,
    pub scheduler: Scheduler,
}

impl Kernel {
    const fn new() -> Self {
        Kernel {
            table: ThreadTable::new(),
            scheduler: Scheduler::new(),
        }
    }
}

static KERNEL: Mutex<Kernel> = Mutex::new(Kernel::new());
static HAL: Once<&'static dyn Hal> = Once::new();

pub(crate) fn hal() -> &'static dyn Hal {
    *HAL.get().expect("kernel::init was never called")
}

/// One-time kernel bring-up: records the board's `Hal`, bootstraps the
/// main thread from the currently-running stack, and installs the tick
/// timer / exception traps. Must run before any other kernel API call.
pub fn init(board_hal: &'static dyn Hal, main_stack_size: usize) {
    HAL.call_once(|| board_hal);
    KERNEL.lock().table.init_main_thread(main_stack_size);
    board_hal.install();
}

/// Called from the SysTick handler. Returns whether PendSV should be
/// requested.
pub fn on_tick(now_ms: u64) -> bool {
    let mut k = KERNEL.lock();
    let h = hal();
    k.scheduler.on_tick(&mut k.table, h, now_ms)
}

/// Called from the SVC yield trap. The HAL always raises PendSV right
/// after this regardless of the return value — if nothing else is
/// runnable, PendSV restores the same thread, which is harmless.
pub fn on_yield() {
    let mut k = KERNEL.lock();
    let _ = k.scheduler.on_yield(&k.table);
}

/// Called from the naked PendSV handler via `context_switch`. Performs
/// the actual stack-pointer handoff: stores the outgoing thread's stack
/// pointer, selects the next `Running` thread, and returns its stack
/// pointer. This is the only place that mutates `scheduler.current`.
pub fn switch_stacks(outgoing_sp: u32) -> u32 {
    let mut k = KERNEL.lock();
    let current = k.scheduler.current;
    if let Some(tcb) = k.table.get_mut(current) {
        tcb.sp = outgoing_sp as *mut u8;
    }
    let next = scheduler::Scheduler::select_next(&k.table, current);
    k.scheduler.current = next;
    match k.table.get_mut(next) {
        Some(tcb) => {
            if next != current {
                tcb.ticks_budget = crate::config::THREAD_TICK_QUANTUM;
            }
            tcb.sp as u32
        }
        None => hal().fatal_fault("no runnable thread"),
    }
}

/// Address used as the sentinel return address for every spawned
/// thread's initial stack frame (spec.md §4.1: a thread whose entry
/// function returns is killed, not left to run off the end of its
/// stack).
#[no_mangle]
extern "C" fn kernel_thread_exit() -> ! {
    exit_current();
    loop {
        core::hint::spin_loop();
    }
}

pub(crate) fn kernel_thread_exit_addr() -> usize {
    kernel_thread_exit as usize
}

pub(crate) fn exit_current() {
    let mut k = KERNEL.lock();
    let current = k.scheduler.current;
    let _ = k.table.kill(current);
    drop(k);
    hal().yield_now();
}

pub(crate) fn current_id() -> ThreadId {
    KERNEL.lock().scheduler.current
}

pub(crate) fn with_kernel<R>(f: impl FnOnce(&mut Kernel, &'static dyn Hal) -> R) -> R {
    let mut k = KERNEL.lock();
    let h = hal();
    f(&mut k, h)
}
