//! In-memory task store.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::record::{TaskRecord, TaskSnapshot, TransitionError};
use super::retention::RetentionPolicy;
use crate::domain::{Finding, ParseStrategy, TaskEnvelope, TaskFailure, TaskId, TaskStatus};
use crate::observability::QueueStats;
use crate::ports::Clock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("task {id}: {source}")]
    Transition {
        id: TaskId,
        #[source]
        source: TransitionError,
    },
}

/// What `cancel` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Was pending; now `FAILED` with kind `cancelled`.
    Cancelled,
    /// Running; its token was triggered and the worker will record the failure.
    Signalled,
    /// Already terminal; nothing changed.
    Finished(TaskStatus),
}

/// A task just moved to `RUNNING`, with the token that stops it.
#[derive(Debug, Clone)]
pub struct Admitted {
    pub envelope: TaskEnvelope,
    pub cancel: CancellationToken,
}

struct StoreState {
    /// All task records (single source of truth).
    records: HashMap<TaskId, TaskRecord>,

    /// Pending queue, FIFO by submission (TaskIds only).
    pending: VecDeque<TaskId>,

    /// One token per running task.
    running: HashMap<TaskId, CancellationToken>,

    /// Terminal records dropped by retention so far.
    evicted: usize,
}

impl StoreState {
    fn record_mut(&mut self, id: TaskId) -> Result<&mut TaskRecord, StoreError> {
        self.records.get_mut(&id).ok_or(StoreError::NotFound(id))
    }

    fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            evicted: self.evicted,
            ..QueueStats::default()
        };
        for record in self.records.values() {
            match record.status() {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

/// All task state behind one mutex.
///
/// Lock scope never spans an `.await` on anything but the lock itself; tool
/// execution happens on a copy of the envelope.
pub struct TaskStore {
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
}

impl TaskStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(StoreState {
                records: HashMap::new(),
                pending: VecDeque::new(),
                running: HashMap::new(),
                evicted: 0,
            }),
            clock,
        }
    }

    /// Add a new `PENDING` record at the back of the queue.
    pub async fn insert_pending(&self, envelope: TaskEnvelope) -> TaskSnapshot {
        let id = envelope.task_id();
        let record = TaskRecord::new(envelope, self.clock.now());
        let snapshot = record.snapshot();

        let mut state = self.state.lock().await;
        state.records.insert(id, record);
        state.pending.push_back(id);
        snapshot
    }

    /// Pop the oldest pending task and mark it `RUNNING`.
    pub async fn admit_next(&self) -> Option<Admitted> {
        let mut state = self.state.lock().await;
        while let Some(id) = state.pending.pop_front() {
            let now = self.clock.now();
            let Some(record) = state.records.get_mut(&id) else {
                continue;
            };
            if record.start(now).is_err() {
                continue;
            }
            let envelope = record.envelope().clone();
            let cancel = CancellationToken::new();
            state.running.insert(id, cancel.clone());
            return Some(Admitted { envelope, cancel });
        }
        None
    }

    pub async fn complete(
        &self,
        id: TaskId,
        findings: Vec<Finding>,
        strategy: ParseStrategy,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state
            .record_mut(id)?
            .complete(findings, strategy, now)
            .map_err(|source| StoreError::Transition { id, source })?;
        state.running.remove(&id);
        Ok(())
    }

    pub async fn fail(&self, id: TaskId, failure: TaskFailure) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state
            .record_mut(id)?
            .fail(failure, now)
            .map_err(|source| StoreError::Transition { id, source })?;
        state.running.remove(&id);
        Ok(())
    }

    /// Pending: fail it right here. Running: trigger its token.
    pub async fn cancel(&self, id: TaskId) -> Result<CancelOutcome, StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let record = state.record_mut(id)?;
        match record.status() {
            TaskStatus::Pending => {
                record
                    .fail(TaskFailure::cancelled("cancelled before it started"), now)
                    .map_err(|source| StoreError::Transition { id, source })?;
                state.pending.retain(|p| *p != id);
                Ok(CancelOutcome::Cancelled)
            }
            TaskStatus::Running => {
                if let Some(token) = state.running.get(&id) {
                    token.cancel();
                }
                Ok(CancelOutcome::Signalled)
            }
            status => Ok(CancelOutcome::Finished(status)),
        }
    }

    /// Trigger every running task's token. Returns how many were signalled.
    pub async fn cancel_running(&self) -> usize {
        let state = self.state.lock().await;
        for token in state.running.values() {
            token.cancel();
        }
        state.running.len()
    }

    pub async fn get(&self, id: TaskId) -> Option<TaskSnapshot> {
        let state = self.state.lock().await;
        state.records.get(&id).map(TaskRecord::snapshot)
    }

    pub async fn stats(&self) -> QueueStats {
        self.state.lock().await.stats()
    }

    /// Evict terminal records per `policy`. Returns how many were evicted.
    pub async fn prune(&self, policy: &RetentionPolicy) -> usize {
        if policy.is_keep_forever() {
            return 0;
        }
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let mut terminal: Vec<_> = state
            .records
            .iter()
            .filter_map(|(id, r)| r.completed_at().map(|at| (at, *id)))
            .collect();
        // 古い順
        terminal.sort();

        let mut doomed = Vec::new();
        if let Some(ttl) = policy.ttl.and_then(|t| chrono::Duration::from_std(t).ok()) {
            doomed.extend(
                terminal
                    .iter()
                    .take_while(|(at, _)| now - *at >= ttl)
                    .map(|(_, id)| *id),
            );
        }
        if let Some(max) = policy.max_terminal {
            let excess = terminal.len().saturating_sub(max);
            if excess > doomed.len() {
                doomed = terminal[..excess].iter().map(|(_, id)| *id).collect();
            }
        }

        for id in &doomed {
            state.records.remove(id);
        }
        state.evicted += doomed.len();
        if !doomed.is_empty() {
            debug!(evicted = doomed.len(), "pruned terminal task records");
        }
        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;
    use crate::ports::ManualClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::time::Duration;

    fn setup() -> (Arc<ManualClock>, TaskStore) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        ));
        (clock.clone(), TaskStore::new(clock))
    }

    fn envelope() -> TaskEnvelope {
        TaskEnvelope::new(
            TaskId::generate(),
            TaskType::new(TaskType::EMAIL_ENUMERATION),
            "alice",
            json!({ "email": "alice@example.com" }),
        )
    }

    async fn finished(store: &TaskStore, clock: &ManualClock) -> TaskId {
        let id = store.insert_pending(envelope()).await.id;
        let admitted = store.admit_next().await.unwrap();
        assert_eq!(admitted.envelope.task_id(), id);
        store.complete(id, vec![], ParseStrategy::Grammar).await.unwrap();
        clock.advance(chrono::Duration::seconds(10));
        id
    }

    #[tokio::test]
    async fn admission_is_fifo() {
        let (_clock, store) = setup();
        let ids: Vec<_> = submit_n(&store, 3).await;

        for expected in ids {
            let admitted = store.admit_next().await.unwrap();
            assert_eq!(admitted.envelope.task_id(), expected);
        }
        assert!(store.admit_next().await.is_none());
    }

    async fn submit_n(store: &TaskStore, n: usize) -> Vec<TaskId> {
        let mut ids = Vec::new();
        for _ in 0..n {
            ids.push(store.insert_pending(envelope()).await.id);
        }
        ids
    }

    #[tokio::test]
    async fn stats_track_every_state() {
        let (_clock, store) = setup();
        let ids = submit_n(&store, 4).await;

        store.admit_next().await.unwrap();
        store.admit_next().await.unwrap();
        store.admit_next().await.unwrap();
        store
            .complete(ids[0], vec![Finding::found("github.com")], ParseStrategy::Grammar)
            .await
            .unwrap();
        store
            .fail(ids[1], TaskFailure::timeout("too slow"))
            .await
            .unwrap();

        let stats = store.stats().await;
        assert_eq!(
            stats,
            QueueStats {
                pending: 1,
                running: 1,
                completed: 1,
                failed: 1,
                evicted: 0,
            }
        );
        assert_eq!(stats.total(), 4);
    }

    #[tokio::test]
    async fn cancel_pending_removes_from_queue() {
        let (_clock, store) = setup();
        let ids = submit_n(&store, 2).await;

        assert_eq!(store.cancel(ids[0]).await.unwrap(), CancelOutcome::Cancelled);
        let admitted = store.admit_next().await.unwrap();
        assert_eq!(admitted.envelope.task_id(), ids[1]);
        assert_eq!(
            store.cancel(ids[0]).await.unwrap(),
            CancelOutcome::Finished(TaskStatus::Failed)
        );

        let snap = store.get(ids[0]).await.unwrap();
        assert_eq!(snap.status, TaskStatus::Failed);
        assert_eq!(snap.error.map(|e| e.kind), Some(crate::domain::FailureKind::Cancelled));
    }

    #[tokio::test]
    async fn double_completion_is_refused() {
        let (clock, store) = setup();
        let id = finished(&store, &clock).await;
        let err = store
            .fail(id, TaskFailure::timeout("late"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transition { .. }));
        assert_eq!(store.get(id).await.unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn unknown_ids() {
        let (_clock, store) = setup();
        let id = TaskId::generate();
        assert!(store.get(id).await.is_none());
        assert!(matches!(store.cancel(id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn cancelling_a_running_task_triggers_its_token() {
        let (_clock, store) = setup();
        let ids = submit_n(&store, 2).await;
        let first = store.admit_next().await.unwrap();
        let second = store.admit_next().await.unwrap();

        assert_eq!(store.cancel(ids[0]).await.unwrap(), CancelOutcome::Signalled);
        assert!(first.cancel.is_cancelled());
        assert!(!second.cancel.is_cancelled());
        // the record itself changes only when the worker reports back
        assert_eq!(store.get(ids[0]).await.unwrap().status, TaskStatus::Running);

        assert_eq!(store.cancel_running().await, 2);
        assert!(second.cancel.is_cancelled());

        store
            .fail(ids[0], TaskFailure::cancelled("stopped"))
            .await
            .unwrap();
        assert_eq!(store.cancel_running().await, 1);
    }

    #[tokio::test]
    async fn keep_forever_prunes_nothing() {
        let (clock, store) = setup();
        finished(&store, &clock).await;
        assert_eq!(store.prune(&RetentionPolicy::keep_forever()).await, 0);
        assert_eq!(store.stats().await.completed, 1);
    }

    #[tokio::test]
    async fn ttl_evicts_old_terminal_records_and_counts_them() {
        let (clock, store) = setup();
        let old = finished(&store, &clock).await; // completed at t0, now t0+10
        let young = finished(&store, &clock).await; // completed at t0+10, now t0+20
        store.insert_pending(envelope()).await;

        let policy = RetentionPolicy {
            ttl: Some(Duration::from_secs(15)),
            max_terminal: None,
        };
        assert_eq!(store.prune(&policy).await, 1);
        assert!(store.get(old).await.is_none());
        assert!(store.get(young).await.is_some());

        let stats = store.stats().await;
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.total(), 3);
    }

    #[tokio::test]
    async fn max_terminal_keeps_newest() {
        let (clock, store) = setup();
        let a = finished(&store, &clock).await;
        let b = finished(&store, &clock).await;
        let c = finished(&store, &clock).await;

        let policy = RetentionPolicy {
            ttl: None,
            max_terminal: Some(1),
        };
        assert_eq!(store.prune(&policy).await, 2);
        assert!(store.get(a).await.is_none());
        assert!(store.get(b).await.is_none());
        assert!(store.get(c).await.is_some());
    }
}
