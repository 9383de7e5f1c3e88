//! Record id allocation

use std::sync::atomic::{AtomicU32, Ordering};

/// Monotonic id source shared by every producer of one store
///
/// Ids start at 1 and are handed out exactly once each. The counter is
/// owned by whoever owns the store (usually a hub) rather than living in a
/// global, so tests can reset it.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: AtomicU32,
}

impl IdAllocator {
    /// Create an allocator whose first id will be 1
    pub const fn new() -> Self {
        Self {
            last: AtomicU32::new(0),
        }
    }

    /// Create an allocator that continues after `last`
    pub const fn starting_after(last: u32) -> Self {
        Self {
            last: AtomicU32::new(last),
        }
    }

    /// Take the next id
    pub fn next_id(&self) -> u32 {
        self.last.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Last id handed out (0 if none)
    pub fn current(&self) -> u32 {
        self.last.load(Ordering::SeqCst)
    }

    /// Restart from 1
    pub fn reset(&self) {
        self.reset_to(0);
    }

    /// Continue after `last`
    pub fn reset_to(&self, last: u32) {
        self.last.store(last, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequential_ids() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.current(), 2);
    }

    #[test]
    fn test_reset() {
        let ids = IdAllocator::starting_after(41);
        assert_eq!(ids.next_id(), 42);
        ids.reset();
        assert_eq!(ids.current(), 0);
        assert_eq!(ids.next_id(), 1);
        ids.reset_to(100);
        assert_eq!(ids.next_id(), 101);
    }

    #[test]
    fn test_concurrent_ids_are_unique_and_contiguous() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1_000;

        let ids = Arc::new(IdAllocator::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || (0..PER_THREAD).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "id {id} handed out twice");
            }
        }

        let total = (THREADS * PER_THREAD) as u32;
        assert_eq!(seen.len() as u32, total);
        assert!((1..=total).all(|id| seen.contains(&id)));
    }
}
