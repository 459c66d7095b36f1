//! Job Monitor Registry
//!
//! Owns one polling task per job key. Each task probes the provider on a
//! fixed interval, broadcasts the result to the job's subscriber group and
//! removes itself on a terminal status or once its consecutive-failure budget
//! is spent. Subscriber count never stops a task.
//!
//! Every delivery happens while holding the registry lock and only after
//! checking that the task's entry is still present. `stop_all` takes the same
//! lock, so once it returns no task can deliver again, and it closes the
//! registry to new monitors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::models::job::{JobKey, JobStatus};
use crate::models::message::ServerMessage;
use crate::services::fanout::{ConnectionId, SubscriptionHub};
use crate::services::prober::{ProbeError, StatusProber};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// Consecutive probe failures after which polling stops.
    pub max_failures: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_failures: DEFAULT_MAX_FAILURES,
        }
    }
}

/// Bookkeeping for one active polling task. Dropped together with the task.
#[derive(Debug)]
pub struct PollState {
    pub job_key: JobKey,
    pub consecutive_failures: u32,
    loop_id: u64,
    task: AbortHandle,
}

/// Result of a `start_monitoring` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStart {
    /// A new polling task was created.
    Started,
    /// A task already existed; the requester gets a one-off snapshot.
    AlreadyActive,
    /// The registry was stopped for shutdown; nothing was started.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Terminal,
    Budget,
}

impl StopReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::Budget => "budget",
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    polls: HashMap<JobKey, PollState>,
    next_loop_id: u64,
    /// Set by `stop_all`; no new monitors are accepted afterwards.
    closed: bool,
}

/// Registry of active job monitors. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MonitorRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    prober: Arc<dyn StatusProber>,
    hub: Arc<SubscriptionHub>,
    config: MonitorConfig,
}

impl MonitorRegistry {
    pub fn new(prober: Arc<dyn StatusProber>, hub: Arc<SubscriptionHub>, config: MonitorConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner::default())),
            prober,
            hub,
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> MonitorConfig {
        self.config
    }

    /// Ensure a polling task exists for `key`.
    ///
    /// If one is already running, `requester` alone receives an immediate
    /// status snapshot instead of waiting for the next tick.
    pub fn start_monitoring(&self, key: &JobKey, requester: ConnectionId) -> MonitorStart {
        let mut inner = self.lock();

        if inner.closed {
            tracing::warn!(job_key = %key, conn_id = %requester, "Registry closed, not starting polling");
            return MonitorStart::Closed;
        }

        let running = inner.polls.get(key).map(|p| p.loop_id);
        if let Some(loop_id) = running {
            drop(inner);
            tracing::info!(job_key = %key, conn_id = %requester, "Polling already active, sending snapshot");
            self.spawn_snapshot(key.clone(), requester, loop_id);
            return MonitorStart::AlreadyActive;
        }

        inner.next_loop_id += 1;
        let loop_id = inner.next_loop_id;
        let task = tokio::spawn(self.clone().run_poll_loop(key.clone(), loop_id));

        inner.polls.insert(
            key.clone(),
            PollState {
                job_key: key.clone(),
                consecutive_failures: 0,
                loop_id,
                task: task.abort_handle(),
            },
        );

        metrics::counter!("translation_monitors_started_total").increment(1);
        metrics::gauge!("translation_active_monitors").set(inner.polls.len() as f64);
        tracing::info!(
            job_key = %key,
            conn_id = %requester,
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "Starting polling"
        );

        MonitorStart::Started
    }

    /// Cancel every polling task, forget all state and refuse new monitors.
    /// Safe with no tasks and safe to repeat.
    pub fn stop_all(&self) -> usize {
        let mut inner = self.lock();
        inner.closed = true;

        let count = inner.polls.len();
        for (key, poll) in inner.polls.drain() {
            poll.task.abort();
            tracing::info!(job_key = %key, "Stopped polling");
        }

        if count > 0 {
            metrics::counter!("translation_monitors_stopped_total", "reason" => "shutdown")
                .increment(count as u64);
        }
        metrics::gauge!("translation_active_monitors").set(0.0);
        tracing::info!(count, "Cleaned up active polling tasks");
        count
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn is_active(&self, key: &JobKey) -> bool {
        self.lock().polls.contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.lock().polls.len()
    }

    /// Current consecutive-failure count of an active monitor.
    pub fn failure_count(&self, key: &JobKey) -> Option<u32> {
        self.lock().polls.get(key).map(|p| p.consecutive_failures)
    }

    async fn run_poll_loop(self, key: JobKey, loop_id: u64) {
        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let outcome = self.prober.probe(&key).await;
            metrics::counter!("translation_polls_total").increment(1);

            if !self.apply_tick(&key, loop_id, outcome) {
                break;
            }
        }

        tracing::debug!(job_key = %key, "Polling task exited");
    }

    /// Record one probe outcome and broadcast it. Returns whether polling
    /// should continue.
    fn apply_tick(&self, key: &JobKey, loop_id: u64, outcome: Result<JobStatus, ProbeError>) -> bool {
        let mut inner = self.lock();
        let Some(poll) = inner.polls.get_mut(key).filter(|p| p.loop_id == loop_id) else {
            return false;
        };

        let stop = match outcome {
            Ok(status) => {
                poll.consecutive_failures = 0;
                tracing::debug!(
                    job_key = %key,
                    status = %status.status,
                    progress = %status.progress,
                    "Polled translation status"
                );
                let terminal = status.is_terminal();
                let state = status.status;
                self.hub.broadcast(key, &ServerMessage::status(key, status));

                if terminal {
                    tracing::info!(job_key = %key, status = %state, "Stopping polling, job finished");
                    Some(StopReason::Terminal)
                } else {
                    None
                }
            }
            Err(err) => {
                poll.consecutive_failures += 1;
                let attempt = poll.consecutive_failures;
                metrics::counter!("translation_poll_failures_total", "kind" => err.kind()).increment(1);
                tracing::error!(
                    job_key = %key,
                    attempt,
                    max_attempts = self.config.max_failures,
                    error = %err,
                    "Error polling translation status"
                );
                self.hub
                    .broadcast(key, &ServerMessage::status(key, JobStatus::polling_error(attempt)));

                if attempt >= self.config.max_failures {
                    tracing::error!(job_key = %key, attempt, "Stopping polling after too many consecutive errors");
                    Some(StopReason::Budget)
                } else {
                    None
                }
            }
        };

        match stop {
            Some(reason) => {
                inner.polls.remove(key);
                metrics::counter!("translation_monitors_stopped_total", "reason" => reason.as_str())
                    .increment(1);
                metrics::gauge!("translation_active_monitors").set(inner.polls.len() as f64);
                false
            }
            None => true,
        }
    }

    /// Probe once for a late joiner. The result is only delivered while the
    /// loop that was active at join time still exists, so it can never follow
    /// that loop's final status or a shutdown.
    fn spawn_snapshot(&self, key: JobKey, requester: ConnectionId, loop_id: u64) {
        let registry = self.clone();
        tokio::spawn(async move {
            let outcome = registry.prober.probe(&key).await;

            let inner = registry.lock();
            if !inner.polls.get(&key).is_some_and(|p| p.loop_id == loop_id) {
                tracing::debug!(job_key = %key, conn_id = %requester, "Polling ended, dropping snapshot");
                return;
            }
            match outcome {
                Ok(status) => {
                    if !registry.hub.send_to(requester, ServerMessage::status(&key, status)) {
                        tracing::debug!(job_key = %key, conn_id = %requester, "Snapshot target gone");
                    }
                }
                Err(err) => {
                    tracing::warn!(job_key = %key, conn_id = %requester, error = %err, "Error sending initial status");
                }
            }
        });
    }
}
