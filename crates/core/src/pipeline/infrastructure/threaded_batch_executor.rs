pub type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Runs independent jobs (one per video) on a fixed pool of worker threads.
///
/// Layout: `main → job queue → N workers → result queue → main`
///
/// Each job owns all of its state, so workers share nothing but the
/// queues. Results come back in job order regardless of completion order.
pub struct ThreadedBatchExecutor {
    workers: usize,
}

impl ThreadedBatchExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn execute<J, T, F>(&self, jobs: Vec<J>, run: F) -> Vec<Result<T, SendError>>
    where
        J: Send,
        T: Send,
        F: Fn(J) -> Result<T, SendError> + Sync,
    {
        let total = jobs.len();
        if total == 0 {
            return Vec::new();
        }

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, J)>();
        let (result_tx, result_rx) =
            crossbeam_channel::unbounded::<(usize, Result<T, SendError>)>();
        for job in jobs.into_iter().enumerate() {
            if job_tx.send(job).is_err() {
                break;
            }
        }
        drop(job_tx);

        let run = &run;
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.workers.min(total))
                .map(|_| {
                    let job_rx = job_rx.clone();
                    let result_tx = result_tx.clone();
                    scope.spawn(move || {
                        for (index, job) in job_rx {
                            if result_tx.send((index, run(job))).is_err() {
                                break;
                            }
                        }
                    })
                })
                .collect();

            for handle in handles {
                if handle.join().is_err() {
                    log::error!("Batch worker thread panicked");
                }
            }
        });
        drop(result_tx);

        let mut results: Vec<Option<Result<T, SendError>>> = (0..total).map(|_| None).collect();
        for (index, result) in result_rx {
            results[index] = Some(result);
        }
        results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err("Worker thread panicked".into())))
            .collect()
    }
}

impl Default for ThreadedBatchExecutor {
    fn default() -> Self {
        Self::new(1)
    }
}
