//! In-memory histogram of scrape durations (fetch + parse + record).

use std::sync::Mutex;
use std::time::Duration;

/// Shared scrape timings. Worker records, API reads. Values in milliseconds.
pub struct ScrapeTimings {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl ScrapeTimings {
    /// Tracks 1ms to 10min, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 600_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record(&self, d: Duration) {
        let ms = d.as_millis().clamp(1, 600_000) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(ms);
        }
    }

    /// Return (p50_ms, p95_ms, p99_ms). None if no samples.
    pub fn percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        let Ok(h) = self.inner.lock() else {
            return (None, None, None);
        };
        if h.len() == 0 {
            return (None, None, None);
        }
        (
            Some(h.value_at_quantile(0.5)),
            Some(h.value_at_quantile(0.95)),
            Some(h.value_at_quantile(0.99)),
        )
    }

    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }
}

impl Default for ScrapeTimings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_percentiles() {
        let timings = ScrapeTimings::new();
        assert_eq!(timings.percentiles(), (None, None, None));
        assert_eq!(timings.len(), 0);
    }

    #[test]
    fn records_millis() {
        let timings = ScrapeTimings::new();
        for ms in [100, 200, 300, 400, 5_000] {
            timings.record(Duration::from_millis(ms));
        }
        timings.record(Duration::from_micros(10));
        assert_eq!(timings.len(), 6);
        let (p50, _, p99) = timings.percentiles();
        assert!(p50.unwrap() >= 199 && p50.unwrap() <= 301, "p50={p50:?}");
        assert!(p99.unwrap() >= 4_990, "p99={p99:?}");
    }
}
