//! Retry orchestration.
//!
//! A single worker task drains submitted operations in FIFO order, one
//! attempt at a time. Failed attempts are classified through the error
//! center; recoverable failures are rescheduled with exponential backoff
//! until the operation's budget runs out, unrecoverable ones surface
//! immediately. A reconnect signal makes every scheduled operation due at
//! once, still in submission order, still one attempt each.
//!
//! Operation metadata is mirrored into a SQLite queue so budgets survive
//! restarts; the closures themselves cannot be persisted, so rows left over
//! from a previous run are exposed as `stranded` until resubmitted or
//! cancelled. Attempts are never preempted: an operation should enforce its
//! own deadline, and cancelling a mid-flight attempt only discards its
//! result.

mod op;
mod policy;
mod queue;

pub use op::RetryableOperation;
pub use policy::{BackoffPolicy, RetryDecision};
pub use queue::{QueueDb, QueueRow, QueueState};

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::sync::{oneshot, watch, Notify};
use tokio::time::Instant;

use crate::clock::unix_timestamp;
use crate::connectivity::ConnectionStatus;
use crate::errors::{ErrorCenter, RemoteFailure};

#[derive(Debug, Clone, Copy)]
enum Phase {
    /// Due now (fresh submission or drained by a reconnect).
    Pending,
    /// An attempt is running; transitions happen when it completes.
    Attempting,
    /// Waiting out a backoff delay.
    Scheduled { due: Instant },
}

struct ActiveOp {
    op: RetryableOperation,
    retries_left: u32,
    /// Failed attempts so far; drives the backoff exponent.
    attempt_index: u32,
    phase: Phase,
    cancel_requested: bool,
    done_tx: Option<oneshot::Sender<Result<(), RemoteFailure>>>,
}

#[derive(Default)]
struct WorkState {
    ops: HashMap<String, ActiveOp>,
    /// Submission order; ids are removed when their operation ends.
    order: VecDeque<String>,
}

/// Owner of the retry queue and its worker task.
pub struct RetryCoordinator {
    policy: BackoffPolicy,
    errors: Arc<ErrorCenter>,
    queue: QueueDb,
    reconnect: Option<watch::Receiver<ConnectionStatus>>,
    state: Mutex<WorkState>,
    wake: Notify,
}

impl RetryCoordinator {
    /// Reset rows interrupted mid-attempt by a crash, then spawn the worker.
    /// The worker runs for the life of the process. Pass the connectivity
    /// monitor's `subscribe()` receiver to get early drains on reconnect.
    pub async fn start(
        policy: BackoffPolicy,
        errors: Arc<ErrorCenter>,
        queue: QueueDb,
        reconnect: Option<watch::Receiver<ConnectionStatus>>,
    ) -> Result<Arc<Self>> {
        let reset = queue.recover_interrupted().await?;
        if reset > 0 {
            tracing::info!("reset {reset} interrupted operations to pending");
        }
        let coordinator = Arc::new(Self {
            policy,
            errors,
            queue,
            reconnect,
            state: Mutex::new(WorkState::default()),
            wake: Notify::new(),
        });
        tokio::spawn(coordinator.clone().run_worker());
        Ok(coordinator)
    }

    /// Enqueue and await the terminal outcome: `Ok` once an attempt
    /// succeeds, otherwise the failure of the final attempt (or
    /// `Cancelled`).
    pub async fn submit(&self, op: RetryableOperation) -> Result<(), RemoteFailure> {
        let rx = self.enqueue(op).await?;
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(RemoteFailure::Cancelled),
        }
    }

    /// Enqueue without waiting for the outcome. The operation still runs to
    /// a terminal state; failures land in the error center as usual.
    pub async fn submit_detached(&self, op: RetryableOperation) -> Result<(), RemoteFailure> {
        self.enqueue(op).await.map(|_rx| ())
    }

    /// Best-effort cancellation. Pending and scheduled operations are
    /// removed immediately; a mid-flight attempt completes and its result
    /// is discarded. Returns false for ids this coordinator doesn't know
    /// (unless a stranded row with that id existed and was deleted).
    pub async fn cancel(&self, id: &str) -> bool {
        enum Hit {
            Removed(Option<oneshot::Sender<Result<(), RemoteFailure>>>),
            Flagged,
            Miss,
        }

        let hit = {
            let mut state = self.state.lock().unwrap();
            let attempting = matches!(
                state.ops.get(id).map(|a| a.phase),
                Some(Phase::Attempting)
            );
            if attempting {
                if let Some(active) = state.ops.get_mut(id) {
                    active.cancel_requested = true;
                }
                Hit::Flagged
            } else if let Some(mut active) = state.ops.remove(id) {
                state.order.retain(|x| x != id);
                Hit::Removed(active.done_tx.take())
            } else {
                Hit::Miss
            }
        };

        match hit {
            Hit::Flagged => true,
            Hit::Removed(done_tx) => {
                if let Err(e) = self.queue.remove(id).await {
                    tracing::warn!("queue delete failed for {id}: {e:#}");
                }
                if let Some(tx) = done_tx {
                    let _ = tx.send(Err(RemoteFailure::Cancelled));
                }
                tracing::info!("operation {id} cancelled");
                self.wake.notify_one();
                true
            }
            Hit::Miss => match self.queue.remove(id).await {
                Ok(n) if n > 0 => {
                    tracing::info!("removed stranded operation {id}");
                    true
                }
                Ok(_) => false,
                Err(e) => {
                    tracing::warn!("queue delete failed for {id}: {e:#}");
                    false
                }
            },
        }
    }

    /// Rows persisted by a previous run whose closures are gone. Resubmit
    /// under the same id to adopt their remaining budget, or cancel them.
    pub async fn stranded(&self) -> Result<Vec<QueueRow>> {
        let rows = self.queue.list_all().await?;
        let live: HashSet<String> = {
            let state = self.state.lock().unwrap();
            state.ops.keys().cloned().collect()
        };
        Ok(rows.into_iter().filter(|r| !live.contains(&r.id)).collect())
    }

    /// Configured retry budget for operations that don't pick their own.
    pub fn default_retries(&self) -> u32 {
        self.policy.max_retries
    }

    /// Every persisted row, live and stranded, in submission order.
    pub async fn list_operations(&self) -> Result<Vec<QueueRow>> {
        self.queue.list_all().await
    }

    pub async fn queue_depth(&self) -> Result<i64> {
        self.queue.count().await
    }

    async fn enqueue(
        &self,
        op: RetryableOperation,
    ) -> Result<oneshot::Receiver<Result<(), RemoteFailure>>, RemoteFailure> {
        // Checked before touching the queue so a duplicate can't clobber the
        // live row's state.
        {
            let state = self.state.lock().unwrap();
            if state.ops.contains_key(&op.id) {
                return Err(RemoteFailure::Other(format!(
                    "operation {} is already queued",
                    op.id
                )));
            }
        }

        let (retries_left, attempt_index) =
            match self.queue.enqueue(&op.id, &op.context, op.retries_left).await {
                Ok(row) => (row.retries_left, row.attempt_index),
                Err(e) => {
                    // Queue durability is best-effort; the operation still runs.
                    tracing::warn!("queue insert failed for {}: {e:#}", op.id);
                    (op.retries_left, 0)
                }
            };

        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock().unwrap();
            if state.ops.contains_key(&op.id) {
                return Err(RemoteFailure::Other(format!(
                    "operation {} is already queued",
                    op.id
                )));
            }
            let id = op.id.clone();
            state.ops.insert(
                id.clone(),
                ActiveOp {
                    op,
                    retries_left,
                    attempt_index,
                    phase: Phase::Pending,
                    cancel_requested: false,
                    done_tx: Some(tx),
                },
            );
            state.order.push_back(id);
        }
        self.wake.notify_one();
        Ok(rx)
    }

    async fn run_worker(self: Arc<Self>) {
        let mut reconnect = self.reconnect.clone();
        let mut last_status = reconnect
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(ConnectionStatus::Unknown);

        loop {
            if let Some(id) = self.next_due() {
                self.run_attempt(&id).await;
                continue;
            }

            let sleep_until = self.earliest_due();
            let mut watch_fired = false;
            let mut watch_closed = false;
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = async {
                    match sleep_until {
                        Some(due) => tokio::time::sleep_until(due).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {}
                changed = async {
                    match reconnect.as_mut() {
                        Some(rx) => rx.changed().await.is_ok(),
                        None => std::future::pending::<bool>().await,
                    }
                } => {
                    watch_fired = changed;
                    watch_closed = !changed;
                }
            }

            if watch_closed {
                reconnect = None;
            } else if watch_fired {
                if let Some(rx) = reconnect.as_mut() {
                    let current = *rx.borrow_and_update();
                    if current.is_connected() && !last_status.is_connected() {
                        self.drain_scheduled();
                    }
                    last_status = current;
                }
            }
        }
    }

    /// First id in submission order that is due now.
    fn next_due(&self) -> Option<String> {
        let now = Instant::now();
        let state = self.state.lock().unwrap();
        for id in &state.order {
            if let Some(active) = state.ops.get(id) {
                match active.phase {
                    Phase::Pending => return Some(id.clone()),
                    Phase::Scheduled { due } if due <= now => return Some(id.clone()),
                    _ => {}
                }
            }
        }
        None
    }

    fn earliest_due(&self) -> Option<Instant> {
        let state = self.state.lock().unwrap();
        state
            .ops
            .values()
            .filter_map(|active| match active.phase {
                Phase::Scheduled { due } => Some(due),
                _ => None,
            })
            .min()
    }

    /// Make every scheduled operation due immediately (reconnect drain).
    /// Each gets exactly one attempt; a still-failing operation goes back
    /// to backoff instead of tight-looping.
    fn drain_scheduled(&self) {
        let mut state = self.state.lock().unwrap();
        let mut drained = 0usize;
        for active in state.ops.values_mut() {
            if matches!(active.phase, Phase::Scheduled { .. }) {
                active.phase = Phase::Pending;
                drained += 1;
            }
        }
        if drained > 0 {
            tracing::info!("connection restored; {drained} scheduled operations now due");
        }
    }

    async fn run_attempt(&self, id: &str) {
        let Some((fut, context)) = ({
            let mut state = self.state.lock().unwrap();
            state.ops.get_mut(id).map(|active| {
                active.phase = Phase::Attempting;
                (active.op.attempt(), active.op.context.clone())
            })
        }) else {
            return;
        };
        if let Err(e) = self.queue.mark_attempting(id).await {
            tracing::warn!("queue update failed for {id}: {e:#}");
        }

        let result = fut.await;

        // A cancel that arrived mid-attempt wins over the result.
        let cancelled = {
            let state = self.state.lock().unwrap();
            state
                .ops
                .get(id)
                .map(|active| active.cancel_requested)
                .unwrap_or(true)
        };
        if cancelled {
            self.finish(id, &context, Err(RemoteFailure::Cancelled)).await;
            return;
        }

        match result {
            Ok(()) => {
                self.finish(id, &context, Ok(())).await;
            }
            Err(failure) => {
                let report = self.errors.report(&failure, &context);
                let scheduled = {
                    let mut state = self.state.lock().unwrap();
                    let Some(active) = state.ops.get_mut(id) else {
                        return;
                    };
                    active.attempt_index += 1;
                    match self.policy.decide(
                        report.recoverable,
                        active.retries_left,
                        active.attempt_index,
                    ) {
                        RetryDecision::NoRetry => None,
                        RetryDecision::RetryAfter(delay) => {
                            active.retries_left -= 1;
                            active.phase = Phase::Scheduled {
                                due: Instant::now() + delay,
                            };
                            Some((delay, active.retries_left, active.attempt_index))
                        }
                    }
                };

                match scheduled {
                    None => {
                        self.finish(id, &context, Err(failure)).await;
                    }
                    Some((delay, retries_left, attempt_index)) => {
                        tracing::info!(
                            "operation {context} failed ({failure}); retry in {delay:?}, {retries_left} left"
                        );
                        let due_at = unix_timestamp() + delay.as_secs() as i64;
                        if let Err(e) = self
                            .queue
                            .mark_scheduled(id, retries_left, attempt_index, due_at, &report.message)
                            .await
                        {
                            tracing::warn!("queue update failed for {id}: {e:#}");
                        }
                    }
                }
            }
        }
    }

    async fn finish(&self, id: &str, context: &str, outcome: Result<(), RemoteFailure>) {
        let done_tx = {
            let mut state = self.state.lock().unwrap();
            state.order.retain(|x| x != id);
            state.ops.remove(id).and_then(|mut active| active.done_tx.take())
        };
        if let Err(e) = self.queue.remove(id).await {
            tracing::warn!("queue delete failed for {id}: {e:#}");
        }
        match &outcome {
            Ok(()) => tracing::debug!("operation {context} succeeded"),
            Err(RemoteFailure::Cancelled) => {}
            Err(failure) => tracing::info!("operation {context} failed permanently: {failure}"),
        }
        if let Some(tx) = done_tx {
            let _ = tx.send(outcome);
        }
    }
}
