/*
 * Fixed thread table and stack-frame bootstrap.
 *
 * No dynamic growth (spec.md §3/§4.1): `spawn` does a first-fit linear
 * scan over `MAX_THREADS` slots. The initial register frame layout is
 * grounded in `AoligeiY-ucosiii-rs`'s `os_task_stk_init` and
 * `bbrown1867-rucos-rs`'s `create`: both lay out the *hardware-stacked*
 * frame (r0-r3, r12, LR, PC, xPSR) beneath a *software-stacked* frame
 * (r4-r11, EXC_RETURN) so the very first PendSV restore and the ongoing
 * ones use the exact same `ldmia sp!, {r4-r11, lr}` sequence.
 */

use crate::config::{MAX_THREADS, THREAD_TICK_QUANTUM};
use crate::error::{KernelError, KernelResult};
use crate::kernel::tcb::{Tcb, ThreadArray, ThreadEntry, ThreadId, ThreadState};

/// EXC_RETURN value requesting return to Thread mode using PSP, no FPU
/// state stacked (FPCA clear). Matches both reference ports.
const EXC_RETURN_NO_FPU: u32 = 0xFFFF_FFFD;

/// Thumb bit set in xPSR so the initial exception return doesn't fault.
const XPSR_THUMB: u32 = 0x0100_0000;

pub struct ThreadTable {
    pub threads: ThreadArray,
}

impl ThreadTable {
    pub const fn new() -> Self {
        ThreadTable {
            threads: crate::kernel::tcb::new_thread_array(),
        }
    }

    /// Bootstraps slot 0 from the currently-active stack (spec.md §3:
    /// "`0` is reserved for the main/loop thread bootstrapped from the
    /// startup stack"). `stack_size` is used only for the overflow
    /// canary check, never for allocation/deallocation.
    pub fn init_main_thread(&mut self, stack_size: usize) {
        let tcb = &mut self.threads[0];
        tcb.reset();
        tcb.state = ThreadState::Running;
        tcb.owns_stack = false;
        tcb.stack_size = stack_size;
        tcb.priority = 128;
        tcb.ticks_budget = THREAD_TICK_QUANTUM;
    }

    /// First-fit scan for an `EMPTY` slot and TCB initialization. Lays
    /// out the initial stack frame so that when the context switcher
    /// first restores this TCB, execution begins at `entry.entry` with
    /// `entry.arg` in the first integer register and a sentinel return
    /// address pointing at `kill_self` (spec.md §4.1).
    ///
    /// # Safety
    /// `stack` must be a region the kernel now owns exclusively for the
    /// lifetime of the thread (or until it is freed via `owns_stack`).
    pub unsafe fn spawn(
        &mut self,
        entry: ThreadEntry,
        priority: u8,
        stack: &'static mut [u8],
        owns_stack: bool,
        kill_self_addr: usize,
    ) -> KernelResult<ThreadId> {
        let slot = self
            .threads
            .iter()
            .position(|t| t.state == ThreadState::Empty)
            .ok_or(KernelError::ResourceExhausted)?;

        let stack_base = stack.as_mut_ptr();
        let stack_size = stack.len();
        let sp = unsafe { init_stack_frame(stack, entry, kill_self_addr) };

        let tcb = &mut self.threads[slot];
        tcb.reset();
        tcb.state = ThreadState::Running;
        tcb.stack_base = stack_base;
        tcb.stack_size = stack_size;
        tcb.owns_stack = owns_stack;
        tcb.priority = priority;
        tcb.ticks_budget = THREAD_TICK_QUANTUM;
        tcb.sp = sp;
        tcb.entry = Some(entry);

        Ok(ThreadId(slot as u8))
    }

    pub fn get(&self, tid: ThreadId) -> Option<&Tcb> {
        self.threads.get(tid.index())
    }

    pub fn get_mut(&mut self, tid: ThreadId) -> Option<&mut Tcb> {
        self.threads.get_mut(tid.index())
    }

    pub fn exists(&self, tid: ThreadId) -> bool {
        self.get(tid)
            .map(|t| t.state != ThreadState::Empty)
            .unwrap_or(false)
    }

    /// Transitions `tid` to `Ending`. Reclamation (freeing the owned
    /// stack, zeroing the TCB) happens in the scheduler's reap pass, not
    /// here, because a thread killing *itself* is still executing on its
    /// own stack (spec.md §4.1).
    pub fn kill(&mut self, tid: ThreadId) -> KernelResult<()> {
        let tcb = self.get_mut(tid).ok_or(KernelError::NotFound)?;
        if tcb.state == ThreadState::Empty {
            return Err(KernelError::NotFound);
        }
        tcb.state = ThreadState::Ending;
        Ok(())
    }

    pub fn suspend(&mut self, tid: ThreadId) -> KernelResult<()> {
        let tcb = self.get_mut(tid).ok_or(KernelError::NotFound)?;
        if tcb.state == ThreadState::Empty {
            return Err(KernelError::NotFound);
        }
        tcb.state = ThreadState::Suspended;
        Ok(())
    }

    pub fn resume(&mut self, tid: ThreadId) -> KernelResult<()> {
        let tcb = self.get_mut(tid).ok_or(KernelError::NotFound)?;
        if tcb.state == ThreadState::Empty {
            return Err(KernelError::NotFound);
        }
        if tcb.state == ThreadState::Suspended {
            tcb.state = ThreadState::Running;
        }
        Ok(())
    }

    /// Frees stacks owned by `Ending` threads and reclaims their slots.
    /// Called once per scheduler pass (spec.md §4.3 item 2).
    pub fn reap(&mut self, hal: &dyn crate::hal::Hal) {
        for tcb in self.threads.iter_mut() {
            if tcb.state == ThreadState::Ending {
                if tcb.owns_stack && !tcb.stack_base.is_null() {
                    hal.free_stack(tcb.stack_base, tcb.stack_size);
                }
                tcb.reset();
            }
        }
    }

    pub fn iter_slots(&self) -> impl Iterator<Item = ThreadId> + '_ {
        (0..MAX_THREADS).map(|i| ThreadId(i as u8))
    }
}

/// Builds the initial stack frame for a not-yet-run thread.
///
/// # Safety
/// `stack` must be valid, writable, and at least large enough to hold
/// the frame (17 words); callers are expected to size stacks well above
/// that floor.
unsafe fn init_stack_frame(
    stack: &mut [u8],
    entry: ThreadEntry,
    kill_self_addr: usize,
) -> *mut u8 {
    let top = (stack.as_mut_ptr() as usize + stack.len()) & !0x7;
    // 17 words: r4-r11 (8), EXC_RETURN, r0-r3, r12, lr, pc, xpsr.
    let frame = (top - 17 * 4) as *mut u32;

    let words: [u32; 17] = [
        0x0404_0404, // r4
        0x0505_0505, // r5
        0x0606_0606, // r6
        0x0707_0707, // r7
        0x0808_0808, // r8
        0x0909_0909, // r9
        0x1010_1010, // r10
        0x1111_1111, // r11
        EXC_RETURN_NO_FPU,
        entry.arg as u32,       // r0: thread argument
        0x0101_0101,            // r1
        0x0202_0202,            // r2
        0x0303_0303,            // r3
        0x1212_1212,            // r12
        kill_self_addr as u32,  // lr: sentinel return address -> kill_self
        entry.entry as usize as u32, // pc
        XPSR_THUMB,             // xpsr
    ];

    unsafe {
        for (i, w) in words.iter().enumerate() {
            frame.add(i).write_volatile(*w);
        }
    }

    frame as *mut u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockHal;

    static mut STACK_A: [u8; 256] = [0; 256];
    static mut STACK_B: [u8; 256] = [0; 256];

    fn dummy_entry(_arg: usize) {}

    #[test]
    fn spawn_picks_first_empty_slot_and_marks_it_running() {
        let mut table = ThreadTable::new();
        table.init_main_thread(512);

        let stack: &'static mut [u8] = unsafe { &mut *core::ptr::addr_of_mut!(STACK_A) };
        let tid = unsafe {
            table
                .spawn(
                    ThreadEntry {
                        entry: dummy_entry,
                        arg: 7,
                    },
                    20,
                    stack,
                    false,
                    dummy_entry as usize,
                )
                .unwrap()
        };

        assert_eq!(tid, ThreadId(1));
        assert_eq!(table.threads[1].state, ThreadState::Running);
        assert_eq!(table.threads[1].priority, 20);
        assert!(!table.threads[1].sp.is_null());
    }

    #[test]
    fn kill_defers_reclamation_to_reap() {
        let mut table = ThreadTable::new();
        table.init_main_thread(512);
        let stack: &'static mut [u8] = unsafe { &mut *core::ptr::addr_of_mut!(STACK_B) };
        let tid = unsafe {
            table
                .spawn(
                    ThreadEntry {
                        entry: dummy_entry,
                        arg: 0,
                    },
                    20,
                    stack,
                    true,
                    dummy_entry as usize,
                )
                .unwrap()
        };

        table.kill(tid).unwrap();
        assert_eq!(table.threads[tid.index()].state, ThreadState::Ending);

        let hal = MockHal::new();
        table.reap(&hal);
        assert_eq!(table.threads[tid.index()].state, ThreadState::Empty);
    }

    #[test]
    fn suspend_and_resume_round_trip() {
        let mut table = ThreadTable::new();
        table.init_main_thread(512);
        table.suspend(ThreadId::MAIN).unwrap();
        assert_eq!(table.threads[0].state, ThreadState::Suspended);
        table.resume(ThreadId::MAIN).unwrap();
        assert_eq!(table.threads[0].state, ThreadState::Running);
    }

    #[test]
    fn operating_on_an_empty_slot_is_not_found() {
        let mut table = ThreadTable::new();
        assert_eq!(table.kill(ThreadId(3)), Err(KernelError::NotFound));
        assert_eq!(table.suspend(ThreadId(3)), Err(KernelError::NotFound));
    }
}
