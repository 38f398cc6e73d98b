//! `ParallelDriver`: runs N independent jobs under a bounded worker
//! pool, preserving **result** ordering rather than completion ordering.
//! Pipelines are synchronous blocking work — each spawns a blocking
//! `ffmpeg` subprocess rather than awaiting one — so this is a plain
//! OS-thread pool rather than an async executor.

use crate::error::TetoResult;
use std::collections::VecDeque;
use std::sync::Mutex;

pub struct ParallelDriver {
    max_workers: usize,
}

impl ParallelDriver {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Run every job, returning a `Vec<TetoResult<T>>` whose i-th entry
    /// corresponds to the i-th job regardless of which finished first.
    /// Partial failures do not stop the others.
    pub fn run<T, F>(&self, jobs: Vec<F>) -> Vec<TetoResult<T>>
    where
        F: FnOnce() -> TetoResult<T> + Send,
        T: Send,
    {
        let n = jobs.len();
        if n == 0 {
            return Vec::new();
        }
        let workers = self.max_workers.min(n);

        let queue: Mutex<VecDeque<(usize, F)>> =
            Mutex::new(jobs.into_iter().enumerate().collect());
        let results: Mutex<Vec<Option<TetoResult<T>>>> = Mutex::new((0..n).map(|_| None).collect());

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let next = queue.lock().unwrap().pop_front();
                    let Some((idx, job)) = next else { break };
                    let outcome = job();
                    results.lock().unwrap()[idx] = Some(outcome);
                });
            }
        });

        results
            .into_inner()
            .unwrap()
            .into_iter()
            .map(|r| r.expect("every queued index is written exactly once"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TetoError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_preserves_result_order_regardless_of_completion_order() {
        let driver = ParallelDriver::new(3);
        let jobs: Vec<Box<dyn FnOnce() -> TetoResult<usize> + Send>> = vec![
            Box::new(|| {
                std::thread::sleep(Duration::from_millis(30));
                Ok(1)
            }),
            Box::new(|| Ok(2)),
            Box::new(|| Ok(3)),
        ];
        let results = driver.run(jobs);
        let values: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_partial_failure_lets_others_complete() {
        let driver = ParallelDriver::new(4);
        let completed = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<Box<dyn FnOnce() -> TetoResult<usize> + Send>> = (0..4)
            .map(|i| {
                let completed = completed.clone();
                Box::new(move || -> TetoResult<usize> {
                    completed.fetch_add(1, Ordering::SeqCst);
                    if i == 1 {
                        Err(TetoError::EncoderIo("boom".into()))
                    } else {
                        Ok(i)
                    }
                }) as Box<dyn FnOnce() -> TetoResult<usize> + Send>
            })
            .collect();
        let results = driver.run(jobs);
        assert_eq!(completed.load(Ordering::SeqCst), 4);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
        assert!(results[3].is_ok());
    }

    #[test]
    fn test_empty_jobs_returns_empty() {
        let driver = ParallelDriver::new(4);
        let jobs: Vec<Box<dyn FnOnce() -> TetoResult<usize> + Send>> = vec![];
        assert!(driver.run(jobs).is_empty());
    }

    #[test]
    fn test_worker_count_never_exceeds_job_count() {
        let driver = ParallelDriver::new(100);
        let jobs: Vec<Box<dyn FnOnce() -> TetoResult<usize> + Send>> =
            vec![Box::new(|| Ok(1))];
        let results = driver.run(jobs);
        assert_eq!(results.len(), 1);
        assert_eq!(*results[0].as_ref().unwrap(), 1);
    }
}
