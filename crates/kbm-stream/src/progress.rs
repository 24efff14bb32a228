use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Resumable position in the candidate query.
///
/// The offset goes up when a candidate is taken from the stream and down
/// when a candidate is confirmed merged (or cleaned up as a self-merge),
/// because such entities drop out of the query results and the next run's
/// offsets shift by one. Under several workers a candidate can be counted
/// before an earlier one finishes, so the offset is a conservative
/// high-water mark rather than an exact count of finished work.
#[derive(Debug)]
pub struct ProgressTracker {
    offset: AtomicU64,
    batch_size: u64,
}

impl ProgressTracker {
    pub fn new(start: u64, batch_size: u64) -> Self {
        Self {
            offset: AtomicU64::new(start),
            batch_size: batch_size.max(1),
        }
    }

    /// A candidate was taken from the stream.
    pub fn on_dequeue(&self) -> u64 {
        self.offset.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// A candidate disappeared from the query results.
    pub fn on_success(&self) -> u64 {
        let prev = self
            .offset
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |o| Some(o.saturating_sub(1)))
            .unwrap_or(0);
        prev.saturating_sub(1)
    }

    pub fn current(&self) -> u64 {
        self.offset.load(Ordering::SeqCst)
    }

    /// Current offset rounded down to the batch boundary.
    pub fn resume_offset(&self) -> u64 {
        let current = self.current();
        current - current % self.batch_size
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }
}

impl fmt::Display for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "current offset: {} (use {})",
            self.current(),
            self.resume_offset()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn dequeue_and_success_balance() {
        let p = ProgressTracker::new(10, 50);
        assert_eq!(p.on_dequeue(), 11);
        assert_eq!(p.on_dequeue(), 12);
        assert_eq!(p.on_success(), 11);
        assert_eq!(p.current(), 11);
    }

    #[test]
    fn resume_offset_rounds_down() {
        let p = ProgressTracker::new(0, 50);
        for _ in 0..123 {
            p.on_dequeue();
        }
        assert_eq!(p.current(), 123);
        assert_eq!(p.resume_offset(), 100);
        assert_eq!(p.to_string(), "current offset: 123 (use 100)");
    }

    #[test]
    fn success_never_underflows() {
        let p = ProgressTracker::new(0, 50);
        assert_eq!(p.on_success(), 0);
        assert_eq!(p.current(), 0);
    }

    #[test]
    fn zero_batch_size_is_treated_as_one() {
        let p = ProgressTracker::new(7, 0);
        assert_eq!(p.resume_offset(), 7);
    }

    #[test]
    fn concurrent_updates_are_counted() {
        let p = Arc::new(ProgressTracker::new(0, 50));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let p = Arc::clone(&p);
                thread::spawn(move || {
                    for _ in 0..100 {
                        p.on_dequeue();
                    }
                    for _ in 0..40 {
                        p.on_success();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(p.current(), 240);
    }
}
