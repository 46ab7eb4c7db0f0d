/*
 * Kernel error model.
 *
 * Every fallible kernel entry point returns a `Result`/`BlockingResult`
 * built from `KernelError` rather than panicking. The FSM distinguishes
 * "event not bound in current state" from "event index out of range" as
 * two distinct `InvalidArgument` payload reasons rather than collapsing
 * both to one code, per spec.md §7.
 */

use core::fmt;

/// The five error kinds a kernel API can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Out-of-range thread id, state index, event index, or null handle.
    InvalidArgument,
    /// Thread table full, no free FSM slot, or stack allocation failure.
    ResourceExhausted,
    /// `unlock` called by a thread that is not the current owner.
    NotOwner,
    /// A blocking call's deadline elapsed before its condition was met.
    Timeout,
    /// `suspend`/`resume`/`kill` targeted an `EMPTY` slot.
    NotFound,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KernelError::InvalidArgument => "invalid argument",
            KernelError::ResourceExhausted => "resource exhausted",
            KernelError::NotOwner => "not owner",
            KernelError::Timeout => "timeout",
            KernelError::NotFound => "not found",
        };
        f.write_str(s)
    }
}

pub type KernelResult<T> = Result<T, KernelError>;

/// Tri-state result returned by suspending primitive calls
/// (`mutex.lock`, `semaphore.take`, `signal.wait*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingResult<T> {
    Ok(T),
    Timeout,
    Err(KernelError),
}

impl<T> BlockingResult<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, BlockingResult::Ok(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BlockingResult::Timeout)
    }

    /// Panics (test-only convenience) if this wasn't `Ok`.
    #[cfg(test)]
    pub fn unwrap(self) -> T {
        match self {
            BlockingResult::Ok(v) => v,
            BlockingResult::Timeout => panic!("BlockingResult::unwrap on Timeout"),
            BlockingResult::Err(e) => panic!("BlockingResult::unwrap on Err({e})"),
        }
    }
}
