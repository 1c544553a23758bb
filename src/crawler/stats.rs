// src/crawler/stats.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every worker of one crawler run.
#[derive(Debug, Default)]
pub struct CrawlStats {
    candidates_probed: AtomicU64,
    symbols_validated: AtomicU64,
    snapshots_stored: AtomicU64,
    network_failures: AtomicU64,
    retries_recovered: AtomicU64,
    symbols_removed: AtomicU64,
    unexpected_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub candidates_probed: u64,
    pub symbols_validated: u64,
    pub snapshots_stored: u64,
    pub network_failures: u64,
    pub retries_recovered: u64,
    pub symbols_removed: u64,
    pub unexpected_errors: u64,
}

impl CrawlStats {
    pub fn record_probe(&self) {
        self.candidates_probed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validated(&self) {
        self.symbols_validated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot(&self) {
        self.snapshots_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_failure(&self) {
        self.network_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry_recovered(&self) {
        self.retries_recovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removed(&self) {
        self.symbols_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unexpected(&self) {
        self.unexpected_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            candidates_probed: self.candidates_probed.load(Ordering::Relaxed),
            symbols_validated: self.symbols_validated.load(Ordering::Relaxed),
            snapshots_stored: self.snapshots_stored.load(Ordering::Relaxed),
            network_failures: self.network_failures.load(Ordering::Relaxed),
            retries_recovered: self.retries_recovered.load(Ordering::Relaxed),
            symbols_removed: self.symbols_removed.load(Ordering::Relaxed),
            unexpected_errors: self.unexpected_errors.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "probed={} validated={} snapshots={} network_failures={} recovered={} removed={} unexpected={}",
            self.candidates_probed,
            self.symbols_validated,
            self.snapshots_stored,
            self.network_failures,
            self.retries_recovered,
            self.symbols_removed,
            self.unexpected_errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn counts_from_many_threads() {
        let stats = Arc::new(CrawlStats::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..250 {
                        stats.record_probe();
                    }
                    stats.record_validated();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let summary = stats.summary();
        assert_eq!(summary.candidates_probed, 1000);
        assert_eq!(summary.symbols_validated, 4);
        assert_eq!(summary.snapshots_stored, 0);
    }

    #[test]
    fn summary_display_lists_every_counter() {
        let stats = CrawlStats::default();
        stats.record_removed();
        let text = stats.summary().to_string();
        assert!(text.contains("removed=1"));
        assert!(text.starts_with("probed=0"));
    }
}
