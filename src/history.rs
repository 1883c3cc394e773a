//! Bounded, lock-guarded probe history.
//!
//! Each monitored host owns one [`ResultBuffer`]. The probe task appends to it
//! and the render loop reads it; both go through the same mutex, so a reader
//! never observes a buffer halfway through an append or a resize.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Smallest capacity a history buffer may have.
pub const MIN_CAPACITY: usize = 5;

/// Capacity a new host starts with, before the first render sizes it.
pub const DEFAULT_HISTORY: usize = MIN_CAPACITY;

/// Outcome of a single probe tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// A reply arrived; round-trip (or connect) time in milliseconds.
    Reply(f64),
    /// No reply within the interval.
    Lost,
}

impl Sample {
    /// Latency in milliseconds, if the probe succeeded.
    pub fn latency_ms(self) -> Option<f64> {
        match self {
            Self::Reply(ms) => Some(ms),
            Self::Lost => None,
        }
    }

    pub fn is_reply(self) -> bool {
        matches!(self, Self::Reply(_))
    }
}

#[derive(Debug)]
struct Ring {
    samples: VecDeque<Sample>,
    capacity: usize,
}

/// Fixed-capacity ring of the most recent samples, resizable at runtime.
///
/// Invariants: `len() <= capacity()` and `capacity() >= MIN_CAPACITY`.
#[derive(Debug)]
pub struct ResultBuffer {
    inner: Mutex<Ring>,
}

impl ResultBuffer {
    /// Create an empty buffer. `capacity` is clamped to [`MIN_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            inner: Mutex::new(Ring {
                samples: VecDeque::with_capacity(capacity),
                capacity,
            }),
        }
    }

    // A panic while holding the lock cannot leave the ring half-updated:
    // every mutation is a single push, pop or swap.
    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a sample, evicting the oldest one when full.
    pub fn append(&self, sample: Sample) {
        let mut ring = self.lock();
        if ring.samples.len() == ring.capacity {
            ring.samples.pop_front();
        }
        ring.samples.push_back(sample);
    }

    /// Change the capacity, keeping the most recent samples that still fit.
    ///
    /// Values below [`MIN_CAPACITY`] are raised to it. Resizing to the
    /// current capacity does nothing.
    pub fn resize(&self, capacity: usize) {
        let capacity = capacity.max(MIN_CAPACITY);
        let mut ring = self.lock();
        if ring.capacity == capacity {
            return;
        }

        let keep = ring.samples.len().min(capacity);
        let skip = ring.samples.len() - keep;
        let mut samples = VecDeque::with_capacity(capacity);
        samples.extend(ring.samples.iter().skip(skip).copied());

        ring.samples = samples;
        ring.capacity = capacity;
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().samples.is_empty()
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.lock().samples.iter().copied().collect()
    }

    /// Run `f` over the samples (oldest first) while holding the lock.
    pub fn with_samples<R>(&self, f: impl FnOnce(&VecDeque<Sample>) -> R) -> R {
        let ring = self.lock();
        f(&ring.samples)
    }
}

impl Default for ResultBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}
