/*
 * Thread Control Block.
 *
 * Field-for-field mirror of spec.md §3's TCB attribute list and
 * `OSThreadKernel.h`'s `thread_t`. `saved_registers`/`sp` are written only
 * by the context switcher (spec.md §4.2) — every other field here is
 * ordinary kernel-owned bookkeeping state.
 */

use crate::config::MAX_THREADS;

/// Thread id: a slot index into the fixed thread table. `0` is always the
/// main/loop thread bootstrapped from the startup stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u8);

impl ThreadId {
    pub const MAIN: ThreadId = ThreadId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "tid({})", self.0)
    }
}

/// Mirrors spec.md's thread state diagram exactly (spec.md §3, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Empty,
    /// "Runnable": either actually executing or merely eligible. Which
    /// slot is *actually* executing is tracked separately by the
    /// scheduler's `current` field, not by this variant.
    Running,
    Ended,
    Ending,
    Suspended,
    Sleeping,
    BlockedSemaphore,
    BlockedSemaphoreTimeout,
    BlockedMutex,
    BlockedMutexTimeout,
    BlockedSignal,
    BlockedSignalTimeout,
    BlockedQueue,
}

impl ThreadState {
    pub fn is_blocked(self) -> bool {
        matches!(
            self,
            ThreadState::BlockedSemaphore
                | ThreadState::BlockedSemaphoreTimeout
                | ThreadState::BlockedMutex
                | ThreadState::BlockedMutexTimeout
                | ThreadState::BlockedSignal
                | ThreadState::BlockedSignalTimeout
                | ThreadState::BlockedQueue
        )
    }

    pub fn has_timeout(self) -> bool {
        matches!(
            self,
            ThreadState::BlockedSemaphoreTimeout
                | ThreadState::BlockedMutexTimeout
                | ThreadState::BlockedSignalTimeout
        )
    }
}

/// Outcome recorded for a thread that just woke from a blocking call, so
/// that the blocking wrapper (e.g. `Mutex::lock`) knows whether to report
/// success or `KernelError::Timeout` once it resumes after the context
/// switch that put it to sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// Not currently blocked / nothing to report yet.
    None,
    Granted,
    TimedOut,
}

/// Register-save area, matching `OSThreadKernel.h`'s `software_stack_t`:
/// callee-saved integer registers r4-r11, LR, the full FPU bank s0-s31,
/// and FPSCR. Written only by the context switcher (spec.md §4.2).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SavedRegisters {
    pub r4_r11: [u32; 8],
    pub lr: u32,
    pub s0_s31: [u32; 32],
    pub fpscr: u32,
}

impl SavedRegisters {
    pub const fn zeroed() -> Self {
        SavedRegisters {
            r4_r11: [0; 8],
            lr: 0,
            s0_s31: [0; 32],
            fpscr: 0,
        }
    }
}

/// Function pointer + argument for a thread entry point. A typed
/// newtype rather than a raw `fn(*mut ())` so the capability never
/// crosses the public API as an untyped pointer (spec.md §9's
/// "function-pointer callbacks... avoid leaking raw untyped pointers").
#[derive(Clone, Copy)]
pub struct ThreadEntry {
    pub entry: fn(usize),
    pub arg: usize,
}

pub struct Tcb {
    pub state: ThreadState,
    pub stack_base: *mut u8,
    pub stack_size: usize,
    pub owns_stack: bool,

    pub saved_registers: SavedRegisters,
    pub sp: *mut u8,

    pub ticks_budget: u32,
    pub priority: u8,

    pub wakeup_at_ms: u64,
    pub interval_ms: u64,

    pub signal_flags: u32,
    pub signal_wait_mask: u32,
    pub signal_clear_on_wake: bool,

    pub mutex_waiting_on: Option<u8>,
    pub wake_reason: WakeReason,

    pub entry: Option<ThreadEntry>,
}

impl Tcb {
    pub const fn empty() -> Self {
        Tcb {
            state: ThreadState::Empty,
            stack_base: core::ptr::null_mut(),
            stack_size: 0,
            owns_stack: false,
            saved_registers: SavedRegisters::zeroed(),
            sp: core::ptr::null_mut(),
            ticks_budget: 0,
            priority: 255,
            wakeup_at_ms: 0,
            interval_ms: 0,
            signal_flags: 0,
            signal_wait_mask: 0,
            signal_clear_on_wake: false,
            mutex_waiting_on: None,
            wake_reason: WakeReason::None,
            entry: None,
        }
    }

    /// Resets every field to the "freshly reclaimed" state. Signal bits
    /// set on an EMPTY/uncreated thread are discarded, not queued
    /// (spec.md §3's invariant), so this clears `signal_flags` too.
    pub fn reset(&mut self) {
        *self = Tcb::empty();
    }
}

pub type ThreadArray = [Tcb; MAX_THREADS];

pub const fn new_thread_array() -> ThreadArray {
    // `Tcb` has no `Copy`/`Default` impl we want to rely on for an array
    // repeat expression with non-trivial fields, so build it element by
    // element via a const fn array initializer.
    [const { Tcb::empty() }; MAX_THREADS]
}
