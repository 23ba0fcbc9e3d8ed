//! Request id generator
//!
//! Recovery and event-recovery requests draw ids from one shared sequence,
//! so the two id spaces never overlap within a manager's lifetime. The
//! sequence starts at a random 32-bit value to make collisions with ids of
//! a previous process run unlikely.

use std::sync::atomic::{AtomicU32, Ordering};

use types::ids::RequestId;

/// Lock-free monotonic request id sequence.
#[derive(Debug)]
pub struct RequestIdGenerator {
    value: AtomicU32,
    increment: u32,
}

impl RequestIdGenerator {
    /// Sequence seeded with a random value.
    pub fn new(increment: u32) -> Self {
        Self::with_seed(rand::random::<u32>(), increment)
    }

    pub fn with_seed(seed: u32, increment: u32) -> Self {
        Self {
            value: AtomicU32::new(seed),
            increment,
        }
    }

    /// Advance the sequence and return the new value. Wraps at 2^32.
    pub fn next(&self) -> RequestId {
        let previous = self.value.fetch_add(self.increment, Ordering::SeqCst);
        RequestId::new(previous.wrapping_add(self.increment))
    }

    pub fn increment(&self) -> u32 {
        self.increment
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}


// ── Property-Based Tests ────────────────────────────────────────────
