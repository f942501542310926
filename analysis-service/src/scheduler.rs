// Cycle Scheduler
// Fires a job on a fixed cadence with at most one run in flight per instance.
// A tick that lands while the previous run is still going is dropped, not queued.
// A started run is never cancelled: stopping waits for it to finish.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Zero-argument unit of work run once per tick
#[async_trait]
pub trait CycleJob: Send + Sync {
    async fn run(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Started,
    Skipped,
}

#[derive(Debug, Default)]
struct SchedulerStats {
    cycles_started: AtomicU64,
    cycles_completed: AtomicU64,
    ticks_skipped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub ticks_skipped: u64,
}

impl SchedulerStats {
    fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Clears the in-flight flag when the run ends, including by panic
struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Task of the run started by the latest accepted tick
type CurrentRun = Arc<Mutex<Option<JoinHandle<()>>>>;

pub struct CycleScheduler {
    name: String,
    cadence: Duration,
    job: Arc<dyn CycleJob>,
    in_flight: Arc<AtomicBool>,
    current: CurrentRun,
    stats: Arc<SchedulerStats>,
}

impl CycleScheduler {
    pub fn new(name: impl Into<String>, cadence: Duration, job: Arc<dyn CycleJob>) -> Self {
        Self {
            name: name.into(),
            cadence,
            job,
            in_flight: Arc::new(AtomicBool::new(false)),
            current: Arc::new(Mutex::new(None)),
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> SchedulerSnapshot {
        self.stats.snapshot()
    }

    /// Handle one tick: start the job on its own task unless a run is in flight
    pub fn tick(&self) -> TickOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.stats.ticks_skipped.fetch_add(1, Ordering::Relaxed);
            warn!(scheduler = %self.name, "Previous cycle still running, tick skipped");
            return TickOutcome::Skipped;
        }

        let guard = InFlightGuard {
            flag: Arc::clone(&self.in_flight),
        };
        let cycle = self.stats.cycles_started.fetch_add(1, Ordering::Relaxed) + 1;
        let job = Arc::clone(&self.job);
        let stats = Arc::clone(&self.stats);
        let name = self.name.clone();

        let run = tokio::spawn(async move {
            let _guard = guard;
            let started = Instant::now();
            info!(scheduler = %name, cycle, "Cycle started");
            job.run().await;
            stats.cycles_completed.fetch_add(1, Ordering::Relaxed);
            info!(
                scheduler = %name,
                cycle,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Cycle finished"
            );
        });
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(run);

        TickOutcome::Started
    }

    /// Wait for the run in flight, if any, to finish
    pub async fn finish_current(&self) {
        await_current(&self.name, &self.current).await;
    }

    /// Start ticking. The first tick fires immediately.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let name = self.name.clone();
        let stats = Arc::clone(&self.stats);
        let current = Arc::clone(&self.current);

        let task = tokio::spawn(async move {
            let mut ticker = interval(self.cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(scheduler = %self.name, cadence_secs = self.cadence.as_secs_f64(), "Scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!(scheduler = %self.name, "Scheduler stopped");
        });

        SchedulerHandle {
            name,
            stats,
            shutdown: shutdown_tx,
            task,
            current,
        }
    }
}

async fn await_current(name: &str, current: &Mutex<Option<JoinHandle<()>>>) {
    let run = current.lock().unwrap_or_else(|e| e.into_inner()).take();
    if let Some(run) = run {
        if let Err(e) = run.await {
            warn!(scheduler = %name, "Cycle task ended abnormally: {}", e);
        }
    }
}

/// Running scheduler. Stopping ends the ticking; a cycle already in flight runs to completion.
pub struct SchedulerHandle {
    name: String,
    stats: Arc<SchedulerStats>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    current: CurrentRun,
}

impl SchedulerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> SchedulerSnapshot {
        self.stats.snapshot()
    }

    /// Stop ticking, then wait for the cycle in flight before taking the final snapshot
    pub async fn stop(self) -> SchedulerSnapshot {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(scheduler = %self.name, "Scheduler task ended abnormally: {}", e);
        }
        await_current(&self.name, &self.current).await;
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    struct Gate {
        runs: AtomicUsize,
        release: Notify,
    }

    #[async_trait]
    impl CycleJob for Gate {
        async fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
        }
    }

    struct Slow {
        delay: Duration,
        active: AtomicUsize,
        max_active: AtomicUsize,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl CycleJob for Slow {
        async fn run(&self) {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn slow(delay: Duration) -> Arc<Slow> {
        Arc::new(Slow {
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
        })
    }

    async fn wait_idle(scheduler: &CycleScheduler) {
        for _ in 0..200 {
            if !scheduler.is_running() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("scheduler never went idle");
    }

    #[tokio::test]
    async fn test_tick_while_running_is_dropped() {
        let job = Arc::new(Gate {
            runs: AtomicUsize::new(0),
            release: Notify::new(),
        });
        let scheduler = CycleScheduler::new("test", Duration::from_secs(60), job.clone());

        assert_eq!(scheduler.tick(), TickOutcome::Started);
        assert_eq!(scheduler.tick(), TickOutcome::Skipped);
        assert_eq!(scheduler.tick(), TickOutcome::Skipped);
        assert!(scheduler.is_running());

        job.release.notify_one();
        wait_idle(&scheduler).await;

        assert_eq!(scheduler.tick(), TickOutcome::Started);
        job.release.notify_one();
        wait_idle(&scheduler).await;

        assert_eq!(job.runs.load(Ordering::SeqCst), 2);
        let stats = scheduler.stats();
        assert_eq!(stats.cycles_started, 2);
        assert_eq!(stats.cycles_completed, 2);
        assert_eq!(stats.ticks_skipped, 2);
    }

    #[tokio::test]
    async fn test_spawned_scheduler_ticks_on_cadence() {
        let job = slow(Duration::from_millis(1));
        let handle = CycleScheduler::new("fast", Duration::from_millis(20), job.clone()).spawn();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let stats = handle.stop().await;

        assert!(stats.cycles_started >= 3, "started {}", stats.cycles_started);
        assert_eq!(stats.ticks_skipped, 0);
    }

    #[tokio::test]
    async fn test_slow_job_never_overlaps() {
        let job = slow(Duration::from_millis(70));
        let handle = CycleScheduler::new("slow", Duration::from_millis(20), job.clone()).spawn();

        tokio::time::sleep(Duration::from_millis(250)).await;
        let stats = handle.stop().await;

        assert_eq!(job.max_active.load(Ordering::SeqCst), 1);
        assert!(stats.ticks_skipped > 0);
        assert!(stats.cycles_started >= 2);
    }

    #[tokio::test]
    async fn test_stop_waits_for_cycle_in_flight() {
        let job = slow(Duration::from_millis(300));
        let handle = CycleScheduler::new("draining", Duration::from_secs(60), job.clone()).spawn();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let stats = handle.stop().await;

        assert_eq!(stats.cycles_started, 1);
        assert_eq!(stats.cycles_completed, stats.cycles_started);
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_finish_current_after_tick() {
        let job = slow(Duration::from_millis(50));
        let scheduler = CycleScheduler::new("manual", Duration::from_secs(60), job.clone());

        assert_eq!(scheduler.tick(), TickOutcome::Started);
        scheduler.finish_current().await;
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.stats().cycles_completed, 1);

        // nothing in flight
        scheduler.finish_current().await;
    }

    #[tokio::test]
    async fn test_panicking_job_releases_guard() {
        struct Boom;

        #[async_trait]
        impl CycleJob for Boom {
            async fn run(&self) {
                panic!("boom");
            }
        }

        let scheduler = CycleScheduler::new("boom", Duration::from_secs(60), Arc::new(Boom));
        assert_eq!(scheduler.tick(), TickOutcome::Started);
        wait_idle(&scheduler).await;
        assert_eq!(scheduler.tick(), TickOutcome::Started);
        wait_idle(&scheduler).await;
        assert_eq!(scheduler.stats().cycles_completed, 0);
    }
}
