//! Cross-thread stress helpers.
//!
//! Every thread opens its own handle. Writers serialize on the store's
//! writer slot; readers run alongside and check that they never observe a
//! half-applied transaction.

use crate::fixtures::add_person;
use objdb_core::Store;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Committed write transactions.
    pub commits: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Reads that saw a person without its dog (must be zero).
    pub torn_reads: usize,
    /// Reads performed.
    pub reads: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Commits: {}", self.commits);
        println!("Reads: {}", self.reads);
        println!("Failed: {}", self.failed_ops);
        println!("Torn reads: {}", self.torn_reads);
        println!("Duration: {:?}", self.duration);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of writer threads.
    pub writers: usize,
    /// Number of reader threads.
    pub readers: usize,
    /// Write transactions per writer.
    pub writes_per_thread: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            writers: 4,
            readers: 2,
            writes_per_thread: 50,
        }
    }
}

/// Runs concurrent writers and readers against `store`.
///
/// Each write transaction creates a dog and a person linked to it. Readers
/// repeatedly count persons with a null dog; any hit means a reader saw a
/// partial transaction.
pub fn stress_writers_and_readers(store: &Store, config: &StressConfig) -> StressTestResult {
    let commits = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let torn = Arc::new(AtomicUsize::new(0));
    let reads = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));
    let start = Instant::now();

    let readers: Vec<_> = (0..config.readers)
        .map(|_| {
            let store = store.clone();
            let torn = Arc::clone(&torn);
            let reads = Arc::clone(&reads);
            let failed = Arc::clone(&failed);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let h = store.handle();
                while !done.load(Ordering::SeqCst) {
                    match h.query("Person").and_then(|q| q.is_null("dog")).and_then(|q| q.count()) {
                        Ok(0) => {}
                        Ok(_) => {
                            torn.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    reads.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    let writers: Vec<_> = (0..config.writers)
        .map(|t| {
            let store = store.clone();
            let commits = Arc::clone(&commits);
            let failed = Arc::clone(&failed);
            let writes = config.writes_per_thread;
            thread::spawn(move || {
                let h = store.handle();
                for i in 0..writes {
                    let result = h.write(|h| {
                        let dog = h.create("Dog")?;
                        h.set(dog, "name", format!("dog {t}/{i}"))?;
                        add_person(h, &format!("Person {t}/{i}"), i as i64, None)
                            .and_then(|person| h.set(person, "dog", dog))
                    });
                    match result {
                        Ok(()) => commits.fetch_add(1, Ordering::SeqCst),
                        Err(_) => failed.fetch_add(1, Ordering::SeqCst),
                    };
                }
            })
        })
        .collect();

    for writer in writers {
        if writer.join().is_err() {
            failed.fetch_add(1, Ordering::SeqCst);
        }
    }
    done.store(true, Ordering::SeqCst);
    for reader in readers {
        if reader.join().is_err() {
            failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    StressTestResult {
        commits: commits.load(Ordering::SeqCst),
        failed_ops: failed.load(Ordering::SeqCst),
        torn_reads: torn.load(Ordering::SeqCst),
        reads: reads.load(Ordering::SeqCst),
        duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestStore;

    #[test]
    fn small_stress_run_is_consistent() {
        let store = TestStore::memory();
        let config = StressConfig {
            writers: 3,
            readers: 2,
            writes_per_thread: 20,
        };
        let result = stress_writers_and_readers(&store, &config);

        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.torn_reads, 0);
        assert_eq!(result.commits, 60);
        let h = store.handle();
        assert_eq!(h.count("Person").unwrap(), 60);
        assert_eq!(store.committed_seq().as_u64(), 60);
    }
}
