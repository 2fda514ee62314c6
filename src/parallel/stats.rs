//! Run-wide statistics shared by all workers

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

/// Aggregate totals across completed jobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    pub files_processed: u64,
    pub source_bytes_total: u64,
    pub output_bytes_total: u64,
}

impl RunStatistics {
    /// Get compression ratio (source bytes / output bytes)
    pub fn compression_ratio(&self) -> f64 {
        if self.output_bytes_total == 0 {
            return 1.0;
        }
        self.source_bytes_total as f64 / self.output_bytes_total as f64
    }

    /// Get size reduction percentage
    pub fn size_reduction(&self) -> f64 {
        if self.source_bytes_total == 0 {
            return 0.0;
        }
        let reduction = self.source_bytes_total.saturating_sub(self.output_bytes_total);
        (reduction as f64 / self.source_bytes_total as f64) * 100.0
    }
}

/// Serializes statistics updates coming from concurrent workers
#[derive(Debug)]
pub struct StatisticsAggregator {
    total_jobs: usize,
    totals: Mutex<RunStatistics>,
}

impl StatisticsAggregator {
    pub fn new(total_jobs: usize) -> Self {
        Self {
            total_jobs,
            totals: Mutex::new(RunStatistics::default()),
        }
    }

    pub fn total_jobs(&self) -> usize {
        self.total_jobs
    }

    /// Add one job result as a single unit and return the totals right after it
    pub fn record(&self, source_bytes: u64, output_bytes: u64) -> RunStatistics {
        let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        debug_assert!(
            totals.files_processed < self.total_jobs as u64,
            "more completions than jobs"
        );
        totals.files_processed += 1;
        totals.source_bytes_total = totals.source_bytes_total.saturating_add(source_bytes);
        totals.output_bytes_total = totals.output_bytes_total.saturating_add(output_bytes);
        *totals
    }

    /// Current totals
    pub fn snapshot(&self) -> RunStatistics {
        *self.totals.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_record_accumulates() {
        let stats = StatisticsAggregator::new(2);
        let after_first = stats.record(1000, 400);
        assert_eq!(after_first.files_processed, 1);

        let after_second = stats.record(3000, 600);
        assert_eq!(after_second, RunStatistics {
            files_processed: 2,
            source_bytes_total: 4000,
            output_bytes_total: 1000,
        });
        assert_eq!(stats.snapshot(), after_second);
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 500;

        let stats = Arc::new(StatisticsAggregator::new((THREADS * PER_THREAD) as usize));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        stats.record(3, 2);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let totals = stats.snapshot();
        assert_eq!(totals.files_processed, THREADS * PER_THREAD);
        assert_eq!(totals.source_bytes_total, 3 * THREADS * PER_THREAD);
        assert_eq!(totals.output_bytes_total, 2 * THREADS * PER_THREAD);
    }

    #[test]
    fn test_ratios() {
        let totals = RunStatistics {
            files_processed: 10,
            source_bytes_total: 10_000_000,
            output_bytes_total: 5_000_000,
        };
        assert_eq!(totals.compression_ratio(), 2.0);
        assert_eq!(totals.size_reduction(), 50.0);
        assert_eq!(RunStatistics::default().size_reduction(), 0.0);
    }
}
