//! Bounded concurrent fan-out
//!
//! Every target gets its own spawned task. A semaphore caps how many of them
//! run at once; all of them report to one collector through a channel, tagged
//! with their input index so results come back in input order.
//!
//! Tasks live in a [`JoinSet`], so they never outlive the call to
//! [`FanOut::run`]: dropping its future aborts every task still running and
//! releases its permit.

use crate::harvest::connector::{AggregateError, ConnectorError, TaskFailure};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Default number of tasks allowed to run at once
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Outcome message sent by one task to the collector
type TaskOutcome<T> = (usize, Result<T, ConnectorError>);

/// Merged result of one fan-out
#[derive(Debug)]
pub struct FanOutResult<T> {
    /// Successful values, in input order
    pub values: Vec<T>,

    /// Every failed task, `None` if all succeeded
    pub failures: Option<AggregateError>,
}

/// Runs fetch tasks under a shared concurrency bound
///
/// Clones share the bound, so every fan-out driven from one harvest draws
/// from the same pool of permits.
#[derive(Debug, Clone)]
pub struct FanOut {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl FanOut {
    /// Creates a fan-out allowing `concurrency` tasks at once (at least one)
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            cancel: CancellationToken::new(),
        }
    }

    /// Aborts outstanding tasks when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs `task` once per target and merges the outcomes
    ///
    /// A failing task never stops its siblings; failures are collected into
    /// one [`AggregateError`].
    ///
    /// # Returns
    ///
    /// * `Ok(FanOutResult)` - All tasks finished
    /// * `Err(ConnectorError::Cancelled)` - Cancelled; outstanding tasks are
    ///   aborted and partial results discarded
    pub async fn run<T, F, Fut>(&self, targets: Vec<String>, mut task: F) -> Result<FanOutResult<T>, ConnectorError>
    where
        T: Send + 'static,
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ConnectorError>> + Send + 'static,
    {
        if targets.is_empty() {
            return Ok(FanOutResult {
                values: Vec::new(),
                failures: None,
            });
        }

        let (tx, mut rx) = mpsc::channel::<TaskOutcome<T>>(targets.len());
        let mut tasks = JoinSet::new();

        for (index, target) in targets.iter().enumerate() {
            let fetch = task(target.clone());
            let semaphore = self.semaphore.clone();
            let tx = tx.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let outcome = fetch.await;
                // The collector is gone only after cancellation
                let _ = tx.send((index, outcome)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<Result<T, ConnectorError>>> =
            std::iter::repeat_with(|| None).take(targets.len()).collect();

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Fan-out cancelled, aborting {} tasks", tasks.len());
                    tasks.abort_all();
                    return Err(ConnectorError::Cancelled);
                }
                message = rx.recv() => match message {
                    Some((index, outcome)) => slots[index] = Some(outcome),
                    None => break,
                },
            }
        }

        let mut values = Vec::with_capacity(slots.len());
        let mut failures = Vec::new();

        for (target, slot) in targets.into_iter().zip(slots) {
            match slot {
                Some(Ok(value)) => values.push(value),
                Some(Err(error)) => failures.push(TaskFailure { target, error }),
                None => failures.push(TaskFailure {
                    target,
                    error: ConnectorError::FatalPage("task ended without a result".to_string()),
                }),
            }
        }

        Ok(FanOutResult {
            values,
            failures: AggregateError::from_failures(failures),
        })
    }
}

impl Default for FanOut {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}
