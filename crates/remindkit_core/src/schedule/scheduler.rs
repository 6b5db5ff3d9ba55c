//! Foreground scheduler owning the poll loop lifecycle.
//!
//! # Responsibility
//! - Drive a `DeliveryCoordinator` on a fixed interval from a worker thread.
//! - Provide explicit `start`/`stop` instead of an ambient global timer.
//!
//! # Invariants
//! - The first tick runs immediately after `start`.
//! - A failed tick is logged and retried on the next interval.
//! - `stop` (or drop) ends the loop before returning; no tick runs afterwards.
//! - The latest successful `PollReport` stays readable by the host, so a
//!   permission-blocked tick can be surfaced while the loop keeps running.

use crate::notify::Notifier;
use crate::repo::reminder_repo::ReminderStore;
use crate::schedule::clock::Clock;
use crate::schedule::coordinator::{DeliveryCoordinator, PollReport};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const SCHEDULER_THREAD_NAME: &str = "remindkit-scheduler";

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug)]
pub enum SchedulerError {
    InvalidInterval(Duration),
    Spawn(std::io::Error),
    WorkerPanicked,
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInterval(value) => {
                write!(f, "poll interval must be greater than zero, got {value:?}")
            }
            Self::Spawn(err) => write!(f, "failed to spawn scheduler thread: {err}"),
            Self::WorkerPanicked => write!(f, "scheduler thread panicked"),
        }
    }
}

impl Error for SchedulerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

/// Running poll loop around one coordinator.
pub struct ReminderScheduler<S, N> {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<DeliveryCoordinator<S, N>>>,
    ticks: Arc<AtomicU64>,
    last_report: Arc<Mutex<Option<PollReport>>>,
    poll_interval: Duration,
}

impl<S, N> ReminderScheduler<S, N>
where
    S: ReminderStore + Send + 'static,
    N: Notifier + Send + 'static,
{
    /// Moves `coordinator` onto a worker thread and starts polling.
    ///
    /// # Errors
    /// - `InvalidInterval` when `poll_interval` is zero.
    /// - `Spawn` when the OS refuses to create the thread.
    pub fn start<C>(
        coordinator: DeliveryCoordinator<S, N>,
        clock: C,
        poll_interval: Duration,
    ) -> SchedulerResult<Self>
    where
        C: Clock + Send + 'static,
    {
        if poll_interval.is_zero() {
            return Err(SchedulerError::InvalidInterval(poll_interval));
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let ticks = Arc::new(AtomicU64::new(0));
        let worker_ticks = Arc::clone(&ticks);
        let last_report = Arc::new(Mutex::new(None));
        let worker_report = Arc::clone(&last_report);
        let mut coordinator = coordinator;

        let handle = thread::Builder::new()
            .name(SCHEDULER_THREAD_NAME.to_string())
            .spawn(move || {
                loop {
                    match coordinator.poll(&clock) {
                        Ok(report) => *lock_report(&worker_report) = Some(report),
                        Err(err) => error!(
                            "event=scheduler_tick module=schedule status=error error={}",
                            err
                        ),
                    }
                    worker_ticks.fetch_add(1, Ordering::SeqCst);

                    match stop_rx.recv_timeout(poll_interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                coordinator
            })
            .map_err(SchedulerError::Spawn)?;

        info!(
            "event=scheduler_start module=schedule status=ok interval_ms={}",
            poll_interval.as_millis()
        );
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            ticks,
            last_report,
            poll_interval,
        })
    }

    /// Stops the loop and hands the coordinator back.
    pub fn stop(mut self) -> SchedulerResult<DeliveryCoordinator<S, N>> {
        let coordinator = self.shutdown()?;
        info!(
            "event=scheduler_stop module=schedule status=ok ticks={}",
            self.ticks()
        );
        coordinator.ok_or(SchedulerError::WorkerPanicked)
    }
}

impl<S, N> ReminderScheduler<S, N> {
    /// Completed ticks since `start`.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Report of the most recent successful tick.
    pub fn last_report(&self) -> Option<PollReport> {
        lock_report(&self.last_report).clone()
    }

    /// Whether the most recent successful tick was skipped for missing permission.
    pub fn permission_blocked(&self) -> bool {
        lock_report(&self.last_report)
            .as_ref()
            .is_some_and(|report| report.permission_blocked)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn shutdown(&mut self) -> SchedulerResult<Option<DeliveryCoordinator<S, N>>> {
        if let Some(stop_tx) = self.stop_tx.take() {
            // The worker may already be gone; a closed channel also stops it.
            let _ = stop_tx.send(());
        }
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map(Some)
                .map_err(|_| SchedulerError::WorkerPanicked),
            None => Ok(None),
        }
    }
}

fn lock_report(slot: &Mutex<Option<PollReport>>) -> MutexGuard<'_, Option<PollReport>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<S, N> Drop for ReminderScheduler<S, N> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(err) = self.shutdown() {
                error!("event=scheduler_stop module=schedule status=error error={err}");
            }
        }
    }
}
