use std::sync::Arc;

use anyhow::Error;

use crate::{
    catalog::{Job, JobQueue},
    cfg::Config,
    probe::Prober,
    stat::RecordStat,
};

/// Top-level driver: replays the request catalog against the target
/// forever, one bounded worker pool per pass.
pub struct Engine<S> {
    cfg: Config,
    stat: Arc<S>,
}

impl<S> Engine<S>
where
    S: RecordStat + 'static,
{
    pub fn new(cfg: Config, stat: Arc<S>) -> Self {
        Self { cfg, stat }
    }

    /// Runs the engine: fill, drain, pause, repeat indefinitely.
    pub async fn run(self) -> Result<(), Error> {
        log::info!(
            "starting: {} catalog entries, {} workers, {:?} interval",
            self.cfg.catalog.len(),
            self.cfg.workers,
            self.cfg.interval
        );

        for run in 1u64.. {
            log::info!("run [{run}] started");
            self.run_once().await;
            self.stat.on_run_done(run);
            log::info!("run [{run}] done");

            if !self.cfg.interval.is_zero() {
                tokio::time::sleep(self.cfg.interval).await;
            }
        }

        Ok(())
    }

    /// Executes one full catalog pass.
    ///
    /// Fills a fresh job queue from the catalog, spawns exactly
    /// `workers` pool workers and returns only after every submitted
    /// job has been executed. Jobs of the next pass are never submitted
    /// while this one still has workers in flight.
    pub async fn run_once(&self) {
        let queue = Arc::new(JobQueue::new(self.cfg.catalog.jobs()));

        let num_workers = self.cfg.workers.get();
        let mut workers = Vec::with_capacity(num_workers);
        for idx in 1..=num_workers {
            let worker = Worker {
                idx,
                prober: Prober::new(&self.cfg.base, self.cfg.auth.as_ref()),
                queue: queue.clone(),
                stat: self.stat.clone(),
            };

            workers.push(tokio::spawn(worker.run()));
        }

        for worker in workers {
            worker.await.expect("no worker panics");
        }
    }
}

/// One pool worker: pulls jobs from the shared queue until it is
/// exhausted, executing and recording each in turn.
struct Worker<S> {
    idx: usize,
    prober: Prober,
    queue: Arc<JobQueue>,
    stat: Arc<S>,
}

impl<S> Worker<S>
where
    S: RecordStat,
{
    async fn run(mut self) {
        log::debug!("worker [{}] started", self.idx);

        let queue = self.queue.clone();
        while let Some(job) = queue.next() {
            log::debug!("worker [{}] took job '{}'", self.idx, job.name);
            self.execute(job).await;
            log::debug!("worker [{}] finished job '{}'", self.idx, job.name);
        }
    }

    /// Executes a single job.
    ///
    /// Failures are contained here: they are logged and counted, and
    /// never abort the worker, the pool or the run.
    async fn execute(&mut self, job: &Job) {
        match self.prober.execute(&job.path).await {
            Ok(out) => {
                if let Some(connect) = out.connect {
                    log::debug!("connected to {} in {connect:?}", out.target);
                }
                log::info!("request '{}' completed with {} in {:?}", job.name, out.code, out.total);

                self.stat.on_probe(&job.name, out.code, out.total);
            }
            Err(err) => {
                log::error!("failed to execute job '{}': {err}", job.name);

                self.stat.on_failure(&job.name);
            }
        }
    }
}
