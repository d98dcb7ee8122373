//! Dispatcher + workers.
//!
//! One dispatcher loop owns admission: take a free slot, then pop the oldest
//! pending task and hand both to a worker task. The slot (an owned semaphore
//! permit) lives as long as the worker, so at most `max_concurrency` tools
//! run at once.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{OwnedSemaphorePermit, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::domain::{FailureKind, TaskEnvelope, TaskFailure};
use crate::parser::ParseReport;
use crate::queue::Admitted;

use super::scheduler::Inner;

/// Running dispatcher.
/// - `shutdown_and_join()` stops admitting and waits for running tools.
/// - `abort_and_join()` additionally cancels them.
pub struct SchedulerHandle {
    inner: Arc<Inner>,
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    workers: TaskTracker,
}

impl SchedulerHandle {
    /// Stop admitting new tasks. Running tools keep going.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop admitting and wait for every running tool to finish.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
        self.workers.close();
        self.workers.wait().await;
    }

    /// Stop admitting, cancel running tools, and wait for them to record it.
    pub async fn abort_and_join(self) {
        self.request_shutdown();
        let cancelled = self.inner.store.cancel_running().await;
        if cancelled > 0 {
            info!(cancelled, "cancelling running tasks for shutdown");
        }
        self.shutdown_and_join().await;
    }
}

pub(crate) fn spawn(inner: Arc<Inner>) -> SchedulerHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = TaskTracker::new();

    let dispatcher = tokio::spawn(dispatch_loop(
        Arc::clone(&inner),
        shutdown_rx.clone(),
        workers.clone(),
    ));
    let maintenance = tokio::spawn(maintenance_loop(Arc::clone(&inner), shutdown_rx));

    SchedulerHandle {
        inner,
        shutdown_tx,
        joins: vec![dispatcher, maintenance],
        workers,
    }
}

async fn dispatch_loop(
    inner: Arc<Inner>,
    mut shutdown_rx: watch::Receiver<bool>,
    workers: TaskTracker,
) {
    info!(
        max_concurrency = inner.slots.available_permits(),
        "dispatcher started"
    );
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // 先に枠を確保してから取り出す (FIFO を崩さない)
        let permit = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            permit = Arc::clone(&inner.slots).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let admitted = loop {
            if let Some(admitted) = inner.store.admit_next().await {
                break Some(admitted);
            }
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break None;
                    }
                }
                _ = inner.submitted.notified() => {}
            }
        };
        let Some(admitted) = admitted else {
            break;
        };

        workers.spawn(run_worker(Arc::clone(&inner), admitted, permit));
    }
    debug!("dispatcher stopped");
}

/// Periodic retention pruning and rate-limit window cleanup.
async fn maintenance_loop(inner: Arc<Inner>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(inner.maintenance_every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let evicted = inner.store.prune(&inner.retention).await;
                let purged = inner.limiter.purge_expired();
                if evicted > 0 || purged > 0 {
                    debug!(evicted, purged, "maintenance pass");
                }
            }
        }
    }
}

async fn run_worker(inner: Arc<Inner>, admitted: Admitted, _permit: OwnedSemaphorePermit) {
    let Admitted { envelope, cancel } = admitted;
    let task_id = envelope.task_id();
    let task_type = envelope.task_type().clone();
    info!(%task_id, %task_type, user_id = envelope.user_id(), "task started");

    let outcome = AssertUnwindSafe(execute(&inner, &envelope, &cancel))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            Err(TaskFailure::spawn_failure(
                "executor panicked while running the tool",
            ))
        });

    let recorded = match outcome {
        Ok(report) => {
            info!(
                %task_id,
                %task_type,
                findings = report.findings.len(),
                strategy = ?report.strategy,
                "task completed"
            );
            inner
                .store
                .complete(task_id, report.findings, report.strategy)
                .await
        }
        Err(failure) => {
            warn!(%task_id, %task_type, kind = %failure.kind, error = %failure.message, "task failed");
            inner.store.fail(task_id, failure).await
        }
    };
    if let Err(e) = recorded {
        error!(%task_id, error = %e, "could not record task outcome");
    }
    // _permit drops here and frees the slot
}

/// Look up the tool, run it, parse its output.
async fn execute(
    inner: &Inner,
    envelope: &TaskEnvelope,
    cancel: &CancellationToken,
) -> Result<ParseReport, TaskFailure> {
    let tool = inner
        .registry
        .lookup(envelope.task_type())
        .map_err(|e| TaskFailure::rejected(e.to_string()))?;
    let invocation = tool
        .prepare(envelope.payload())
        .map_err(|e| TaskFailure::rejected(e.to_string()))?;

    let raw = inner
        .executor
        .execute(&invocation, cancel)
        .await
        .map_err(|e| {
            if let Some(partial) = e.partial_output() {
                debug!(
                    task_id = %envelope.task_id(),
                    stdout = %partial.stdout,
                    stderr = %partial.stderr,
                    "partial output of interrupted tool (discarded)"
                );
            }
            e.to_failure()
        })?;

    if let Some(code) = raw.exit_code.filter(|c| *c != 0) {
        debug!(task_id = %envelope.task_id(), exit_code = code, "tool exited non-zero; parsing output anyway");
    }

    std::panic::catch_unwind(AssertUnwindSafe(|| tool.parser().parse(&raw))).map_err(|_| {
        TaskFailure::new(
            FailureKind::ParseFailure,
            format!("parser crashed on output of {}", invocation.label()),
        )
    })
}
