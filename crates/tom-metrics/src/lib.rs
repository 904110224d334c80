//! Statistics primitives for the ToM ordering stack.
//!
//! [`Counter`] counts events, [`Watermark`] remembers the highest value
//! ever reported. Both are lock-free and serialize as a plain `u64`, so a
//! stats struct built from them can be dumped as JSON without locking the
//! code paths that update it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing event counter.
///
/// Uses [`Ordering::Relaxed`]: values are statistics, not synchronization.
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Counter({})", self.get())
    }
}

impl serde::Serialize for Counter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.get())
    }
}

/// High-water mark: only ever moves up.
///
/// `observe` with a value below the current mark is a no-op, so concurrent
/// reporters never lose the maximum.
pub struct Watermark(AtomicU64);

impl Watermark {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Raise the mark to `value` if it is higher. Returns the previous mark.
    pub fn observe(&self, value: u64) -> u64 {
        self.0.fetch_max(value, Ordering::Relaxed)
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Watermark({})", self.get())
    }
}

impl serde::Serialize for Watermark {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counter_counts() {
        let c = Counter::new();
        assert_eq!(c.get(), 0);
        c.inc();
        c.inc_by(4);
        assert_eq!(c.get(), 5);
    }

    #[test]
    fn watermark_never_goes_down() {
        let w = Watermark::default();
        assert_eq!(w.observe(7), 0);
        assert_eq!(w.observe(3), 7);
        assert_eq!(w.get(), 7);
        w.observe(9);
        assert_eq!(w.get(), 9);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let c = Arc::new(Counter::new());
        let w = Arc::new(Watermark::new());
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let c = c.clone();
                let w = w.clone();
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        c.inc();
                        w.observe(t * 1000 + i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.get(), 4000);
        assert_eq!(w.get(), 3999);
    }

    #[test]
    fn serializes_as_plain_numbers() {
        #[derive(serde::Serialize)]
        struct Stats {
            sent: Counter,
            peak: Watermark,
        }
        let stats = Stats {
            sent: Counter::new(),
            peak: Watermark::new(),
        };
        stats.sent.inc_by(3);
        stats.peak.observe(12);
        let json = serde_json::to_string(&stats).unwrap();
        assert_eq!(json, r#"{"sent":3,"peak":12}"#);
    }
}
