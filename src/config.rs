/*
 * Kernel-wide compile-time configuration.
 *
 * Mirrors the `#ifndef OS_EXTERN_MAX_THREADS` / `DEFAULT_TICK_MICROSECONDS`
 * style overrides from the original threading library: plain `pub const`s a
 * board crate can fork if its RAM budget needs a different thread count.
 */

/// Fixed size of the thread table. No dynamic growth; slot 0 is reserved
/// for the bootstrapped main/loop thread.
pub const MAX_THREADS: usize = 24;

/// Default tick quantum, in microseconds.
pub const DEFAULT_TICK_QUANTUM_US: u32 = 100;

/// Number of ticks a thread is given before its `ticks_budget` is spent
/// (spec.md §3's `ticks_budget` field). Reset whenever a thread is
/// (re)selected to run; decremented once per tick while it is `Running`.
pub const THREAD_TICK_QUANTUM: u32 = 10;

/// Default stack size reserved for thread 0's overflow canary check.
pub const DEFAULT_STACK0_SIZE: usize = 768;

/// SVC immediate used for the voluntary yield trap (spec.md §4.2: a
/// single code path handles both the tick ISR and the yield trap, so
/// there is only one SVC number to raise).
pub const SVC_YIELD: u8 = 33;

/// Reserved thread id meaning "no such thread".
pub const NO_THREAD: i32 = -1;

/// Reserved thread id of the main/loop thread bootstrapped from the
/// startup stack.
pub const MAIN_THREAD: usize = 0;
