//! Scheduler - the public surface: submit, poll, stats, cancel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tracing::{debug, info};

use crate::config::SchedulerConfig;
use crate::domain::{TaskEnvelope, TaskId, TaskType};
use crate::error::{CancelError, StatusError, SubmitError, WaitError};
use crate::exec::Executor;
use crate::observability::QueueStats;
use crate::ports::{Clock, IdGenerator};
use crate::queue::{CancelOutcome, RetentionPolicy, StoreError, TaskSnapshot, TaskStore};
use crate::ratelimit::RateLimiter;
use crate::registry::ToolRegistry;

use super::worker::{self, SchedulerHandle};

/// Shared by the public handle, the dispatcher and every worker.
pub(crate) struct Inner {
    pub(crate) registry: ToolRegistry,
    pub(crate) limiter: RateLimiter,
    pub(crate) store: TaskStore,
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    /// One permit per concurrently running tool.
    pub(crate) slots: Arc<Semaphore>,
    /// Poked on every submission so the dispatcher re-checks the queue.
    pub(crate) submitted: Notify,
    pub(crate) retention: RetentionPolicy,
    pub(crate) maintenance_every: Duration,
}

/// Cheap to clone; all clones share one queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub(crate) fn new(
        config: SchedulerConfig,
        registry: ToolRegistry,
        limiter: RateLimiter,
        executor: Arc<dyn Executor>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                limiter,
                store: TaskStore::new(clock),
                executor,
                ids,
                slots: Arc::new(Semaphore::new(config.max_concurrency)),
                submitted: Notify::new(),
                retention: config.retention.policy(),
                maintenance_every: config.retention.prune_interval(),
            }),
        }
    }

    /// Spawn the dispatcher (and the maintenance loop). Tasks submitted before
    /// this stay `PENDING` until it is called.
    pub fn start(&self) -> SchedulerHandle {
        worker::spawn(Arc::clone(&self.inner))
    }

    /// Validate, rate-limit, and enqueue one task. Never waits for execution.
    pub async fn add_task(
        &self,
        task_type: impl Into<TaskType>,
        user_id: &str,
        payload: serde_json::Value,
    ) -> Result<TaskId, SubmitError> {
        let task_type = task_type.into();
        let tool = self
            .inner
            .registry
            .lookup(&task_type)
            .map_err(|_| SubmitError::UnknownType(task_type.clone()))?;

        tool.prepare(&payload)
            .map_err(|e| SubmitError::InvalidPayload {
                task_type: task_type.clone(),
                message: e.to_string(),
            })?;

        self.inner.limiter.check_and_record(user_id, &task_type)?;

        let task_id = self.inner.ids.generate_task_id();
        let envelope = TaskEnvelope::new(task_id, task_type.clone(), user_id, payload);
        self.inner.store.insert_pending(envelope).await;
        self.inner.submitted.notify_one();

        info!(%task_id, %task_type, user_id, "task accepted");
        Ok(task_id)
    }

    /// Snapshot of one task. Ids that do not parse are simply not found.
    pub async fn get_task_status(&self, task_id: &str) -> Result<TaskSnapshot, StatusError> {
        let not_found = || StatusError::NotFound(task_id.to_string());
        let id: TaskId = task_id.parse().map_err(|_| not_found())?;
        self.inner.store.get(id).await.ok_or_else(not_found)
    }

    pub async fn get_queue_stats(&self) -> QueueStats {
        self.inner.store.stats().await
    }

    /// Pending tasks fail immediately; running ones are stopped through the
    /// executor's kill path and end `FAILED` with kind `cancelled`.
    pub async fn cancel_task(&self, task_id: &str) -> Result<CancelOutcome, CancelError> {
        let id: TaskId = task_id
            .parse()
            .map_err(|_| CancelError::NotFound(task_id.to_string()))?;
        match self.inner.store.cancel(id).await {
            Ok(CancelOutcome::Finished(status)) => Err(CancelError::AlreadyFinished { id, status }),
            Ok(outcome) => {
                info!(task_id = %id, ?outcome, "task cancel requested");
                Ok(outcome)
            }
            Err(StoreError::NotFound(_)) => Err(CancelError::NotFound(task_id.to_string())),
            Err(StoreError::Transition { source, .. }) => Err(CancelError::AlreadyFinished {
                id,
                status: source.from,
            }),
        }
    }

    /// Poll until the task is terminal or `deadline` passes.
    pub async fn wait_for_terminal(
        &self,
        task_id: &str,
        poll_every: Duration,
        deadline: Duration,
    ) -> Result<TaskSnapshot, WaitError> {
        let started = tokio::time::Instant::now();
        loop {
            let snapshot = self.get_task_status(task_id).await?;
            if snapshot.status.is_terminal() {
                return Ok(snapshot);
            }
            let waited = started.elapsed();
            if waited >= deadline {
                debug!(task_id, ?waited, status = ?snapshot.status, "gave up waiting");
                return Err(WaitError::DeadlineElapsed {
                    waited,
                    last: Box::new(snapshot),
                });
            }
            tokio::time::sleep(poll_every.min(deadline - waited)).await;
        }
    }

    pub fn registered_types(&self) -> Vec<TaskType> {
        self.inner.registry.registered_types()
    }
}
