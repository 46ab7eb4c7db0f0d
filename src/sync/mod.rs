/*
 * Blocking synchronization primitives (spec.md §5): a re-entrant mutex,
 * a counting semaphore, and the per-thread signal mask. Each is split
 * into a "pure decision" half, operating directly on a `ThreadTable`
 * and an explicit `now_ms`, and a thin blocking wrapper that drives the
 * real kernel singleton + `Hal::yield_now`. The split is the same one
 * `bbrown1867-rucos-rs` uses for its scheduler core, applied here to
 * the primitives so their FIFO/timeout/wake logic is host-testable.
 */

pub mod mutex;
pub mod semaphore;
pub mod signal;

pub(crate) mod waitq;
