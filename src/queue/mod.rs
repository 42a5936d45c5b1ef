//! # Print Queue
//!
//! Orders print jobs by priority, hands them to an [`Executor`] and retries
//! failed attempts.
//!
//! ## Ordering
//!
//! Pending jobs are kept in descending priority. A new job goes after every
//! job of equal or higher priority, so each priority band is FIFO. Jobs put
//! back after a failed attempt keep their original priority.
//!
//! ## Dispatch
//!
//! While the queue is not paused, fewer than `concurrency` jobs are in
//! flight and a pending job is eligible, the head job is started in its own
//! task. A job whose `target` already has a job in flight is skipped (it
//! keeps its place) so one link never runs two payloads at once.
//!
//! ## Retry
//!
//! A failed attempt with attempts left makes the job `PENDING` again, but it
//! only re-enters the dispatch order after `retry_delay_ms`. Once a job has
//! used all its attempts it becomes `FAILED` and `job-failed` fires once.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bleprint::queue::{JobOptions, LinkExecutor, PrintQueue, QueueConfig};
//! use bleprint::transport::{AdaptiveWriter, RfcommLink};
//!
//! # async fn run() -> Result<(), bleprint::BleprintError> {
//! let executor = LinkExecutor::new(Arc::new(RfcommLink::new()), "/dev/rfcomm0", AdaptiveWriter::default());
//! let queue = PrintQueue::new(QueueConfig::default(), executor);
//! queue.add(b"\x1b@Hello\n".to_vec(), JobOptions::priority(10))?;
//! queue.wait_idle().await;
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod executor;
pub mod job;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::error::{BleprintError, QueueError};

pub use events::{EventBus, QueueEvent, SubscriptionId};
pub use executor::{Executor, LinkExecutor};
pub use job::{JobId, JobOptions, JobSnapshot, JobStatus};

use job::PrintJob;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of live (non-terminal) jobs
    pub max_size: usize,
    /// Attempts per job unless the job sets its own
    pub default_retries: u32,
    pub retry_delay_ms: u64,
    /// Dispatch automatically on add and resume
    pub auto_process: bool,
    pub concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            default_retries: 3,
            retry_delay_ms: 1000,
            auto_process: true,
            concurrency: 1,
        }
    }
}

/// Job counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    /// Pending jobs sitting out their retry delay
    pub waiting_retry: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Default)]
struct State {
    jobs: HashMap<JobId, PrintJob>,
    pending: VecDeque<JobId>,
    waiting: HashSet<JobId>,
    busy_targets: HashSet<String>,
    in_flight: usize,
    next_seq: u64,
    paused: bool,
    disposed: bool,
    /// Set by a manual `process()`; keeps dispatch going until idle
    draining: bool,
}

impl State {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.waiting.is_empty() && self.in_flight == 0
    }

    fn live_jobs(&self) -> usize {
        self.jobs.values().filter(|j| !j.status.is_terminal()).count()
    }

    fn insert_pending(&mut self, id: JobId, priority: i32) {
        let jobs = &self.jobs;
        let position = self
            .pending
            .iter()
            .position(|other| jobs.get(other).is_some_and(|j| j.priority < priority))
            .unwrap_or(self.pending.len());
        self.pending.insert(position, id);
    }

    /// Index of the first pending job whose target is free.
    fn next_eligible(&self) -> Option<usize> {
        self.pending.iter().position(|id| {
            self.jobs
                .get(id)
                .and_then(|j| j.target.as_ref())
                .is_none_or(|target| !self.busy_targets.contains(target))
        })
    }

    fn cancel(&mut self, id: JobId) -> Result<JobSnapshot, QueueError> {
        let job = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        if job.status != JobStatus::Pending {
            return Err(QueueError::NotPending { status: job.status });
        }
        job.finish(JobStatus::Cancelled);
        let snapshot = job.snapshot();
        self.pending.retain(|other| *other != id);
        self.waiting.remove(&id);
        Ok(snapshot)
    }
}

struct Shared {
    config: QueueConfig,
    executor: Arc<dyn Executor>,
    state: Mutex<State>,
    events: EventBus,
    idle: Notify,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit_all(&self, events: Vec<QueueEvent>) {
        for event in &events {
            self.events.emit(event);
        }
    }

    /// Call after any change that may have emptied the queue. Must run with
    /// the state locked; the returned event is emitted after unlocking.
    fn settle(&self, state: &mut State, events: &mut Vec<QueueEvent>) {
        if state.is_idle() {
            state.draining = false;
            events.push(QueueEvent::QueueEmpty);
            self.idle.notify_waiters();
        }
    }
}

/// Priority print queue. Cheap to clone; clones share the same queue.
///
/// Dispatch spawns tokio tasks, so `add`, `resume` and `process` must be
/// called from within a tokio runtime.
#[derive(Clone)]
pub struct PrintQueue {
    shared: Arc<Shared>,
}

impl PrintQueue {
    pub fn new<E: Executor>(config: QueueConfig, executor: E) -> Self {
        Self::with_shared_executor(config, Arc::new(executor))
    }

    pub fn with_shared_executor(config: QueueConfig, executor: Arc<dyn Executor>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                executor,
                state: Mutex::new(State::default()),
                events: EventBus::new(),
                idle: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    /// Enqueue a payload. Fails when the queue holds `max_size` live jobs or
    /// has been disposed.
    pub fn add(&self, payload: impl Into<Arc<[u8]>>, options: JobOptions) -> Result<JobId, QueueError> {
        let snapshot = {
            let mut state = self.shared.state();
            if state.disposed {
                return Err(QueueError::Disposed);
            }
            let capacity = self.shared.config.max_size;
            if state.live_jobs() >= capacity {
                return Err(QueueError::Full { capacity });
            }

            let seq = state.next_seq;
            state.next_seq += 1;
            let job = PrintJob::new(seq, payload.into(), options, self.shared.config.default_retries);
            let (id, priority) = (job.id, job.priority);
            let snapshot = job.snapshot();
            state.jobs.insert(id, job);
            state.insert_pending(id, priority);
            snapshot
        };

        info!(job = %snapshot.id, priority = snapshot.priority, bytes = snapshot.payload_len, "job added");
        let id = snapshot.id;
        self.shared.events.emit(&QueueEvent::JobAdded(snapshot));

        if self.shared.config.auto_process {
            dispatch(&self.shared);
        }
        Ok(id)
    }

    /// Cancel a pending job, reporting why when it cannot be cancelled.
    pub fn try_cancel(&self, id: JobId) -> Result<(), QueueError> {
        let mut events = Vec::new();
        {
            let mut state = self.shared.state();
            let snapshot = state.cancel(id)?;
            info!(job = %id, "job cancelled");
            events.push(QueueEvent::JobCancelled(snapshot));
            self.shared.settle(&mut state, &mut events);
        }
        self.shared.emit_all(events);
        Ok(())
    }

    /// `true` if the job was pending and is now cancelled.
    pub fn cancel(&self, id: JobId) -> bool {
        self.try_cancel(id).is_ok()
    }

    /// Cancel every pending job, including those waiting to retry. Jobs in
    /// flight are left alone. Returns how many were cancelled.
    pub fn clear(&self) -> usize {
        let mut events = Vec::new();
        {
            let mut state = self.shared.state();
            let ids: Vec<JobId> = state
                .pending
                .iter()
                .chain(state.waiting.iter())
                .copied()
                .collect();
            for id in ids {
                if let Ok(snapshot) = state.cancel(id) {
                    events.push(QueueEvent::JobCancelled(snapshot));
                }
            }
            if !events.is_empty() {
                self.shared.settle(&mut state, &mut events);
            }
        }
        let cancelled = events
            .iter()
            .filter(|e| matches!(e, QueueEvent::JobCancelled(_)))
            .count();
        if cancelled > 0 {
            info!(cancelled, "queue cleared");
        }
        self.shared.emit_all(events);
        cancelled
    }

    pub fn pause(&self) {
        let changed = {
            let mut state = self.shared.state();
            !std::mem::replace(&mut state.paused, true)
        };
        if changed {
            info!("queue paused");
            self.shared.events.emit(&QueueEvent::QueuePaused);
        }
    }

    pub fn resume(&self) {
        let changed = {
            let mut state = self.shared.state();
            std::mem::replace(&mut state.paused, false)
        };
        if changed {
            info!("queue resumed");
            self.shared.events.emit(&QueueEvent::QueueResumed);
        }
        if self.shared.config.auto_process {
            dispatch(&self.shared);
        }
    }

    /// Start dispatching. Only needed when `auto_process` is off; once
    /// started, dispatch continues until the queue is idle.
    pub fn process(&self) {
        self.shared.state().draining = true;
        dispatch(&self.shared);
    }

    /// Cancel all pending jobs and refuse further work. Jobs in flight run
    /// to completion but are not retried.
    pub fn dispose(&self) {
        self.shared.state().disposed = true;
        self.clear();
        debug!("queue disposed");
    }

    pub fn get(&self, id: JobId) -> Option<JobSnapshot> {
        self.shared.state().jobs.get(&id).map(PrintJob::snapshot)
    }

    /// All known jobs in the order they were added.
    pub fn jobs(&self) -> Vec<JobSnapshot> {
        let state = self.shared.state();
        let mut jobs: Vec<&PrintJob> = state.jobs.values().collect();
        jobs.sort_by_key(|j| j.seq);
        jobs.into_iter().map(PrintJob::snapshot).collect()
    }

    /// Ids of jobs waiting for dispatch, in dispatch order.
    pub fn pending_order(&self) -> Vec<JobId> {
        self.shared.state().pending.iter().copied().collect()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.shared.state();
        let mut stats = QueueStats {
            waiting_retry: state.waiting.len(),
            ..QueueStats::default()
        };
        for job in state.jobs.values() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::InProgress => stats.in_progress += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Number of live (non-terminal) jobs.
    pub fn len(&self) -> usize {
        self.shared.state().live_jobs()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_paused(&self) -> bool {
        self.shared.state().paused
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state().disposed
    }

    /// Drop finished jobs from history. Returns how many were removed.
    pub fn prune_finished(&self) -> usize {
        let mut state = self.shared.state();
        let before = state.jobs.len();
        state.jobs.retain(|_, job| !job.status.is_terminal());
        before - state.jobs.len()
    }

    /// Resolve once nothing is pending, waiting to retry or in flight.
    ///
    /// Never resolves while a paused queue still holds pending jobs.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.shared.state().is_idle() {
                return;
            }
            notified.await;
        }
    }
}

/// Start as many eligible jobs as the concurrency limit allows.
fn dispatch(shared: &Arc<Shared>) {
    let started: Vec<JobSnapshot> = {
        let mut state = shared.state();
        let limit = shared.config.concurrency.max(1);
        let mut started = Vec::new();
        while !state.paused && !state.disposed && state.in_flight < limit {
            let Some(index) = state.next_eligible() else {
                break;
            };
            let Some(id) = state.pending.remove(index) else {
                break;
            };
            let Some(job) = state.jobs.get_mut(&id) else {
                continue;
            };
            job.status = JobStatus::InProgress;
            job.attempts += 1;
            job.started_at = Some(Utc::now());
            let snapshot = job.snapshot();
            if let Some(target) = &snapshot.target {
                state.busy_targets.insert(target.clone());
            }
            state.in_flight += 1;
            started.push(snapshot);
        }
        started
    };

    for snapshot in started {
        info!(job = %snapshot.id, attempt = snapshot.attempts, "job started");
        shared.events.emit(&QueueEvent::JobStarted(snapshot.clone()));
        tokio::spawn(run_job(Arc::clone(shared), snapshot));
    }
}

async fn run_job(shared: Arc<Shared>, snapshot: JobSnapshot) {
    let executor = Arc::clone(&shared.executor);
    let job = snapshot.clone();
    // The executor runs in its own task so a panic fails the attempt
    // instead of leaving the job stuck in progress.
    let outcome = match tokio::spawn(async move { executor.execute(&job).await }).await {
        Ok(result) => result,
        Err(join) => Err(BleprintError::Aborted(join.to_string())),
    };
    finish(&shared, snapshot, outcome);
}

fn finish(shared: &Arc<Shared>, attempt: JobSnapshot, outcome: Result<(), BleprintError>) {
    let id = attempt.id;
    let mut events = Vec::new();
    let mut retry_after = None;
    let keep_dispatching = {
        let mut state = shared.state();
        state.in_flight = state.in_flight.saturating_sub(1);
        if let Some(target) = &attempt.target {
            state.busy_targets.remove(target);
        }
        let disposed = state.disposed;

        if let Some(job) = state.jobs.get_mut(&id) {
            match outcome {
                Ok(()) => {
                    job.finish(JobStatus::Completed);
                    info!(job = %id, attempts = job.attempts, "job completed");
                    events.push(QueueEvent::JobCompleted(job.snapshot()));
                }
                Err(err) => {
                    job.last_error = Some(err.to_string());
                    if job.attempts < job.max_attempts && !disposed {
                        job.status = JobStatus::Pending;
                        warn!(
                            job = %id,
                            attempt = job.attempts,
                            max = job.max_attempts,
                            error = %err,
                            "job attempt failed, will retry"
                        );
                        retry_after = Some(Duration::from_millis(shared.config.retry_delay_ms));
                    } else {
                        job.finish(JobStatus::Failed);
                        error!(job = %id, attempts = job.attempts, error = %err, "job failed");
                        events.push(QueueEvent::JobFailed(job.snapshot()));
                    }
                }
            }
        }
        if retry_after.is_some() {
            state.waiting.insert(id);
        }

        shared.settle(&mut state, &mut events);
        shared.config.auto_process || state.draining
    };

    shared.emit_all(events);

    if let Some(delay) = retry_after {
        tokio::spawn(requeue_after(Arc::clone(shared), id, delay));
    }
    if keep_dispatching {
        dispatch(shared);
    }
}

async fn requeue_after(shared: Arc<Shared>, id: JobId, delay: Duration) {
    tokio::time::sleep(delay).await;
    let keep_dispatching = {
        let mut state = shared.state();
        if !state.waiting.remove(&id) {
            // cancelled while waiting
            return;
        }
        match state.jobs.get(&id).map(|j| (j.status, j.priority)) {
            Some((JobStatus::Pending, priority)) if !state.disposed => {
                state.insert_pending(id, priority);
                debug!(job = %id, "job requeued");
            }
            _ => {}
        }
        shared.config.auto_process || state.draining
    };
    if keep_dispatching {
        dispatch(&shared);
    }
}
