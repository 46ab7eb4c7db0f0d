/*
 * Bounded single-producer/single-consumer event queue (spec.md §6,
 * grounded in `EventQueue.cpp`). The original pops a default-constructed
 * element when empty instead of signaling "nothing here"; `pop` here
 * returns `Option<T>` instead, one of the documented fixes carried over
 * from the original source (SPEC_FULL.md's EventQueue supplement).
 */

use heapless::spsc::{Consumer, Producer, Queue};

pub struct EventQueue<T, const N: usize> {
    queue: Queue<T, N>,
}

impl<T, const N: usize> EventQueue<T, N> {
    pub const fn new() -> Self {
        EventQueue {
            queue: Queue::new(),
        }
    }

    /// Splits into a producer/consumer pair. Matches `heapless::spsc`'s
    /// own split, which is the only way to get a `Producer`/`Consumer`
    /// out of a `Queue` (spec.md's "single producer, single consumer").
    pub fn split(&mut self) -> (EventProducer<'_, T, N>, EventConsumer<'_, T, N>) {
        let (p, c) = self.queue.split();
        (EventProducer { inner: p }, EventConsumer { inner: c })
    }

    pub fn capacity(&self) -> usize {
        N - 1
    }
}

pub struct EventProducer<'q, T, const N: usize> {
    inner: Producer<'q, T, N>,
}

impl<'q, T, const N: usize> EventProducer<'q, T, N> {
    /// Pushes an event. Returns the event back if the queue is full
    /// (spec.md: "full is reported to the caller, not dropped silently").
    pub fn push(&mut self, value: T) -> Result<(), T> {
        self.inner.enqueue(value)
    }

    pub fn is_full(&self) -> bool {
        !self.inner.ready()
    }
}

pub struct EventConsumer<'q, T, const N: usize> {
    inner: Consumer<'q, T, N>,
}

impl<'q, T, const N: usize> EventConsumer<'q, T, N> {
    /// Pops the oldest event, or `None` if the queue is empty.
    pub fn pop(&mut self) -> Option<T> {
        self.inner.dequeue()
    }

    pub fn is_empty(&self) -> bool {
        !self.inner.ready()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let mut q: EventQueue<u32, 4> = EventQueue::new();
        let (mut p, mut c) = q.split();
        p.push(1).unwrap();
        p.push(2).unwrap();
        p.push(3).unwrap();
        assert_eq!(c.pop(), Some(1));
        assert_eq!(c.pop(), Some(2));
        assert_eq!(c.pop(), Some(3));
        assert_eq!(c.pop(), None);
    }

    #[test]
    fn pop_on_empty_queue_returns_none_not_a_default_value() {
        let mut q: EventQueue<u32, 4> = EventQueue::new();
        let (_p, mut c) = q.split();
        assert_eq!(c.pop(), None);
    }

    #[test]
    fn push_past_capacity_returns_the_value_back() {
        let mut q: EventQueue<u32, 2> = EventQueue::new();
        let (mut p, _c) = q.split();
        p.push(10).unwrap();
        assert_eq!(p.push(20), Err(20));
    }

    #[test]
    fn sixteen_pushes_against_capacity_eight_yield_exactly_eight_overflows_in_push_order() {
        // Capacity 8 needs N=9 (heapless::spsc reserves one slot).
        let mut q: EventQueue<u32, 9> = EventQueue::new();
        assert_eq!(q.capacity(), 8);
        let (mut p, mut c) = q.split();

        let mut overflow_count = 0;
        for item in 1..=16u32 {
            if p.push(item).is_err() {
                overflow_count += 1;
            }
        }
        assert_eq!(overflow_count, 8);

        for expected in 1..=8u32 {
            assert_eq!(c.pop(), Some(expected));
        }
        assert_eq!(c.pop(), None);
    }
}
