//! The evaluation depth guard.
//!
//! One counter serves one top-level evaluation; lazy values created
//! during that evaluation capture the same counter so later accesses
//! keep counting from a consistent baseline. Entry and exit are paired
//! through a drop guard, so early returns and error propagation cannot
//! leave the counter incremented.

use std::sync::atomic::{AtomicUsize, Ordering};

pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug)]
pub struct DepthCounter {
    current: AtomicUsize,
    max: usize,
}

impl DepthCounter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max: max.max(1),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    /// Enters one evaluation level, at minimum `baseline`. Returns
    /// `None` when the configured maximum would be exceeded; the caller
    /// reports the depth-overflow error value instead of recursing.
    pub fn enter(&self, baseline: usize) -> Option<DepthScope<'_>> {
        let previous = self.current();
        let next = (previous + 1).max(baseline);
        if next > self.max {
            return None;
        }
        self.current.store(next, Ordering::Relaxed);
        Some(DepthScope {
            counter: self,
            previous,
        })
    }
}

impl Default for DepthCounter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

pub struct DepthScope<'a> {
    counter: &'a DepthCounter,
    previous: usize,
}

impl Drop for DepthScope<'_> {
    fn drop(&mut self) {
        self.counter.current.store(self.previous, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_and_drop_restore_previous_depth() {
        let counter = DepthCounter::new(4);
        {
            let _outer = counter.enter(0).unwrap();
            assert_eq!(counter.current(), 1);
            {
                let _inner = counter.enter(0).unwrap();
                assert_eq!(counter.current(), 2);
            }
            assert_eq!(counter.current(), 1);
        }
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn baseline_lifts_recorded_depth() {
        let counter = DepthCounter::new(10);
        let scope = counter.enter(5).unwrap();
        assert_eq!(counter.current(), 5);
        drop(scope);
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn exceeding_the_limit_refuses_entry_without_corrupting_state() {
        let counter = DepthCounter::new(2);
        let _a = counter.enter(0).unwrap();
        let _b = counter.enter(0).unwrap();
        assert!(counter.enter(0).is_none());
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn early_exit_keeps_accounting_intact() {
        let counter = DepthCounter::new(3);
        fn recurse(counter: &DepthCounter) -> bool {
            match counter.enter(0) {
                Some(_scope) => recurse(counter),
                None => false,
            }
        }
        assert!(!recurse(&counter));
        assert_eq!(counter.current(), 0);
    }
}
