//! Blocking priority queue shared between threads.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use unpi_frame::Priority;

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Entry<T> {
    priority: Priority,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: the most urgent, oldest entry must compare greatest.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct State<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

/// Priority queue that pops [`Priority::Urgent`] items before
/// [`Priority::Normal`] ones and is FIFO among equal priorities.
pub struct PriorityQueue<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
            ready: Condvar::new(),
        }
    }

    /// Enqueue an item and wake one waiter.
    pub fn push(&self, priority: Priority, item: T) {
        let mut state = lock(&self.state);
        let seq = state.next_seq;
        state.next_seq = state.next_seq.wrapping_add(1);
        state.heap.push(Entry {
            priority,
            seq,
            item,
        });
        drop(state);
        self.ready.notify_one();
    }

    /// Dequeue the next item, waiting up to `timeout` (forever when `None`).
    pub fn pop(&self, timeout: Option<Duration>) -> Option<T> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut state = lock(&self.state);
        loop {
            if let Some(entry) = state.heap.pop() {
                return Some(entry.item);
            }
            state = match deadline {
                None => self
                    .ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    self.ready
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Dequeue the next item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        lock(&self.state).heap.pop().map(|entry| entry.item)
    }

    /// Drop every queued item, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut state = lock(&self.state);
        let dropped = state.heap.len();
        state.heap.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        lock(&self.state).heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
