//! Fan-out/fan-in task group with cancel-on-first-error.
//!
//! Every task runs on its own tokio task and races a shared child
//! [`CancellationToken`]. The first failure cancels the token; siblings
//! observe it and stop. [`FanOut::wait`] joins all tasks and returns that
//! first failure.

use std::future::Future;

use delegatio_shared::{DelegatioError, DelegatioResult};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

type TaskOutcome = (String, DelegatioResult<()>);

pub struct FanOut {
    phase: &'static str,
    tasks: JoinSet<TaskOutcome>,
    cancel: CancellationToken,
}

impl FanOut {
    /// Create a task group whose token is a child of `parent`.
    ///
    /// Cancelling `parent` cancels the group; a failure inside the group
    /// does not cancel `parent`.
    pub fn new(phase: &'static str, parent: &CancellationToken) -> Self {
        Self {
            phase,
            tasks: JoinSet::new(),
            cancel: parent.child_token(),
        }
    }

    /// Spawn `task` under `label`. The future is dropped on cancellation.
    pub fn spawn<F>(&mut self, label: impl Into<String>, task: F)
    where
        F: Future<Output = DelegatioResult<()>> + Send + 'static,
    {
        let label = label.into();
        let cancel = self.cancel.clone();
        let phase = self.phase;
        self.tasks.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(DelegatioError::Cancelled(format!(
                    "{} task '{}' cancelled",
                    phase, label
                ))),
                result = task => result,
            };
            (label, result)
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every task. Returns the first failure, if any.
    pub async fn wait(mut self) -> DelegatioResult<()> {
        let mut first: Option<DelegatioError> = None;

        while let Some(joined) = self.tasks.join_next().await {
            let (label, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => (
                    format!("{} task", self.phase),
                    Err(DelegatioError::Internal(format!("task aborted: {}", e))),
                ),
            };

            let Err(err) = result else {
                continue;
            };

            if first.is_none() {
                tracing::warn!(phase = self.phase, task = %label, error = %err, "task failed, cancelling siblings");
                self.cancel.cancel();
                first = Some(DelegatioError::FanOut {
                    task: label,
                    source: Box::new(err),
                });
            } else {
                tracing::debug!(phase = self.phase, task = %label, error = %err, "discarding sibling error");
            }
        }

        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Run `fut` unless `cancel` fires first; the future is dropped then.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, what: &str, fut: F) -> DelegatioResult<T>
where
    F: Future<Output = DelegatioResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DelegatioError::Cancelled(format!("{} cancelled", what))),
        result = fut => result,
    }
}
