//! Cadence-driven background loops for the time-triggered jobs.

use super::cadence::Cadence;
use super::recurring::Scheduler;
use super::reporting::ReportingJob;
use super::retention::RetentionJob;
use crate::clock::Clock;
use crate::error::Result;
use crate::logging::log_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A job that runs on a cadence. Each run is self-contained and idempotent.
#[async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run(&self, now: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
impl ScheduledJob for Scheduler {
    fn name(&self) -> &'static str {
        "task_generation"
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<()> {
        self.run_once(now).await.map(|_| ())
    }
}

#[async_trait]
impl ScheduledJob for RetentionJob {
    fn name(&self) -> &'static str {
        "retention"
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<()> {
        self.run_once(now).await.map(|_| ())
    }
}

#[async_trait]
impl ScheduledJob for ReportingJob {
    fn name(&self) -> &'static str {
        "reporting"
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<()> {
        self.run_once(now).await.map(|_| ())
    }
}

/// Spawns one loop per job; every loop exits when the shutdown flag flips.
#[derive(Clone)]
pub struct CadenceRunner {
    clock: Arc<dyn Clock>,
    shutdown: watch::Receiver<bool>,
}

impl std::fmt::Debug for CadenceRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CadenceRunner")
            .field("shutdown", &*self.shutdown.borrow())
            .finish()
    }
}

impl CadenceRunner {
    pub fn new(clock: Arc<dyn Clock>, shutdown: watch::Receiver<bool>) -> Self {
        Self { clock, shutdown }
    }

    pub fn spawn(&self, job: Arc<dyn ScheduledJob>, cadence: Cadence) -> JoinHandle<()> {
        let clock = self.clock.clone();
        let mut shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            info!(job = job.name(), cadence = ?cadence, "⏰ SCHEDULER: Job loop started");
            loop {
                if *shutdown.borrow() {
                    break;
                }

                let now = clock.now();
                let next = cadence.next_after(now);
                let wait = (next - now).to_std().unwrap_or_default();
                debug!(job = job.name(), next_run = %next, "Sleeping until next run");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        if let Err(e) = job.run(clock.now()).await {
                            log_error(job.name(), "run", &e.to_string(), None);
                        }
                    }
                    changed = shutdown.changed() => {
                        // A dropped sender also means shutdown
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!(job = job.name(), "⏰ SCHEDULER: Job loop stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingJob(Arc<AtomicUsize>);

    #[async_trait]
    impl ScheduledJob for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self, _now: DateTime<Utc>) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_loop_runs_until_shutdown() {
        let (tx, rx) = watch::channel(false);
        let runs = Arc::new(AtomicUsize::new(0));
        let runner = CadenceRunner::new(Arc::new(SystemClock), rx);

        let handle = runner.spawn(
            Arc::new(CountingJob(runs.clone())),
            Cadence::Interval { seconds: 1 },
        );
        tokio::time::sleep(Duration::from_millis(1_300)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop should stop on shutdown")
            .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pending_run_is_abandoned_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let runs = Arc::new(AtomicUsize::new(0));
        let runner = CadenceRunner::new(Arc::new(SystemClock), rx);

        let handle = runner.spawn(Arc::new(CountingJob(runs.clone())), Cadence::daily(3, 0));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop should stop on shutdown")
            .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
