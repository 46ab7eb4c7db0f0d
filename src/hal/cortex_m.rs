/*
 * Cortex-M HAL backend.
 *
 * Register-save layout and the PendSV save/restore sequence are grounded
 * on two reference RTOS ports: `bbrown1867/rucos-rs`'s `cortex-m/src/lib.rs`
 * (conditional FPU save via the EXC_RETURN bit-4 test) and
 * `AoligeiY/ucosiii-rs`'s `port/cortex_m4/mod.rs` (splitting the naked
 * asm save/restore from a `#[no_mangle]` Rust function that asks the
 * scheduler for the next stack pointer). The per-thread register block
 * itself (`r4-r11`, FPU `s0-s31`, `fpscr`, `lr`) matches
 * `OSThreadKernel.h`'s `software_stack_t`.
 */

use core::arch::{asm, naked_asm};
use core::sync::atomic::{AtomicU64, Ordering};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};

use crate::config::SVC_YIELD;
use crate::hal::Hal;
use crate::kernel;

/// Milliseconds elapsed since boot, advanced by the SysTick handler.
static MILLIS: AtomicU64 = AtomicU64::new(0);

/// The real HAL. Zero-sized: all state lives in kernel-global statics so
/// that the SysTick/PendSV/SVC exception handlers (which cannot carry a
/// `self` parameter) can reach it.
pub struct CortexMHal;

impl Hal for CortexMHal {
    fn millis(&self) -> u64 {
        MILLIS.load(Ordering::Relaxed)
    }

    fn install(&self) {
        // SAFETY: called once from `kernel::init`, before interrupts are
        // unmasked, by the thread that owns the core peripherals.
        unsafe {
            let mut p = cortex_m::Peripherals::steal();
            p.SYST.set_clock_source(SystClkSource::Core);
            p.SYST
                .set_reload(core::cmp::max(crate::config::DEFAULT_TICK_QUANTUM_US, 1));
            p.SYST.clear_current();
            p.SYST.enable_interrupt();
            p.SYST.enable_counter();

            // PendSV and SVC run at the lowest priority so a tick or yield
            // request never preempts a still-in-progress interrupt.
            p.SCB.set_priority(SystemHandler::PendSV, 0xFF);
        }
    }

    fn pend_switch(&self) {
        SCB::set_pendsv();
    }

    fn yield_now(&self) {
        unsafe { asm!("svc {0}", const SVC_YIELD) };
    }

    fn debug_write(&self, s: &str) {
        // Out of scope: wiring this to a real UART is a board concern.
        // Left as a semihosting-free no-op placeholder so the kernel
        // never depends on a transport it doesn't own.
        let _ = s;
    }
}

/// SysTick handler: advances the millisecond clock and runs the
/// scheduler's unblock/reap/select pass. Requests PendSV if the
/// outgoing thread isn't the thread that should run next.
#[no_mangle]
pub extern "C" fn SysTick() {
    let now = MILLIS.fetch_add(
        (crate::config::DEFAULT_TICK_QUANTUM_US / 1000).max(1) as u64,
        Ordering::Relaxed,
    ) + 1;

    critical_section::with(|_| {
        if kernel::on_tick(now) {
            SCB::set_pendsv();
        }
    });
}

/// SVC handler: the yield trap. `svc #SVC_YIELD` runs the same decision
/// pass as the tick ISR and falls straight into the PendSV path — the
/// single code path spec.md §4.2 requires for both triggers.
#[no_mangle]
pub extern "C" fn SVCall() {
    critical_section::with(|_| {
        kernel::on_yield();
    });
    SCB::set_pendsv();
}

/// Called from the naked `PendSV` handler with the outgoing thread's
/// stack pointer (or a sentinel on the very first switch). Returns the
/// incoming thread's stack pointer. This is the *only* place
/// `Tcb::saved_registers`/`Tcb::sp` are read by anything other than the
/// owning thread.
#[no_mangle]
extern "C" fn context_switch(outgoing_sp: u32) -> u32 {
    critical_section::with(|_| kernel::switch_stacks(outgoing_sp))
}

/// PendSV exception handler: the kernel's single register-save/restore
/// path (spec.md §4.2 — "there is only one code path that does register
/// save/restore"). Both the tick ISR and the SVC yield trap fall through
/// to this handler via `SCB::set_pendsv()`.
///
/// Saves r4-r11, LR, and (conditionally, per `EXC_RETURN` bit 4) the FPU
/// registers s16-s31 onto the outgoing thread's own stack, asks
/// `context_switch` for the next stack pointer, and restores the mirror
/// image for the incoming thread.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid     i",
        "mrs       r0, psp",
        "mov       r1, lr",
        "tst       r14, #0x10",
        "it        eq",
        "vstmdbeq  r0!, {{s16-s31}}",
        "stmdb     r0!, {{r4-r11, r14}}",
        "push      {{r1}}",
        "bl        context_switch",
        "pop       {{r1}}",
        "ldmia     r0!, {{r4-r11, r14}}",
        "tst       r14, #0x10",
        "it        eq",
        "vldmiaeq  r0!, {{s16-s31}}",
        "msr       psp, r0",
        "cpsie     i",
        "bx        r1",
    );
}
