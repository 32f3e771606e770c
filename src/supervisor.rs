//! Supervision of optional background subsystems.
//!
//! Each subsystem runs as its own task with a cancellation token and returns a
//! [`TaskHandle`]. Errors and panics inside the task are logged under the
//! subsystem name and never reach the primary listener.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What happens when a supervised task fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and let the rest of the process carry on
    LogAndContinue,
}

/// How a supervised task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Cancelled,
    Failed,
    Panicked,
}

/// An optional subsystem that can be started once
#[derive(Debug, Clone)]
pub struct SupervisedTask {
    pub name: &'static str,
    pub enabled: bool,
    pub policy: FailurePolicy,
}

impl SupervisedTask {
    pub fn new(name: &'static str, enabled: bool) -> Self {
        Self {
            name,
            enabled,
            policy: FailurePolicy::LogAndContinue,
        }
    }

    /// Start an async subsystem. Returns `None` when the task is disabled.
    pub fn spawn<F, Fut, E>(self, parent: &CancellationToken, start: F) -> Option<TaskHandle>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        if !self.enabled {
            tracing::debug!(subsystem = self.name, "subsystem disabled");
            return None;
        }

        let cancel = parent.child_token();
        let future = start(cancel.clone());
        let token = cancel.clone();
        let task = self.clone();
        let join = tokio::spawn(async move {
            let result = AssertUnwindSafe(future).catch_unwind().await;
            task.settle(result, &token)
        });

        tracing::debug!(subsystem = self.name, "subsystem started");
        Some(TaskHandle {
            name: self.name,
            cancel,
            join,
        })
    }

    /// Start a subsystem that blocks its thread, on the blocking pool.
    pub fn spawn_blocking<F, E>(self, parent: &CancellationToken, start: F) -> Option<TaskHandle>
    where
        F: FnOnce(CancellationToken) -> Result<(), E> + Send + 'static,
        E: Display + Send + 'static,
    {
        if !self.enabled {
            tracing::debug!(subsystem = self.name, "subsystem disabled");
            return None;
        }

        let cancel = parent.child_token();
        let token = cancel.clone();
        let task = self.clone();
        let join = tokio::task::spawn_blocking(move || {
            let inner = token.clone();
            let result = std::panic::catch_unwind(AssertUnwindSafe(move || start(inner)));
            task.settle(result, &token)
        });

        tracing::debug!(subsystem = self.name, "subsystem started");
        Some(TaskHandle {
            name: self.name,
            cancel,
            join,
        })
    }

    fn settle<E: Display>(
        &self,
        result: std::thread::Result<Result<(), E>>,
        cancel: &CancellationToken,
    ) -> TaskOutcome {
        match (result, self.policy) {
            (Ok(Ok(())), _) if cancel.is_cancelled() => {
                tracing::debug!(subsystem = self.name, "subsystem cancelled");
                TaskOutcome::Cancelled
            }
            (Ok(Ok(())), _) => {
                tracing::info!(subsystem = self.name, "subsystem finished");
                TaskOutcome::Completed
            }
            (Ok(Err(e)), FailurePolicy::LogAndContinue) => {
                tracing::error!(subsystem = self.name, error = %e, "subsystem failed");
                TaskOutcome::Failed
            }
            (Err(panic), FailurePolicy::LogAndContinue) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(subsystem = self.name, panic = %message, "subsystem panicked");
                TaskOutcome::Panicked
            }
        }
    }
}

/// Handle to a running subsystem
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    cancel: CancellationToken,
    join: JoinHandle<TaskOutcome>,
}

impl TaskHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Ask the task to stop. It observes this at its next check.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task to end.
    pub async fn join(self) -> TaskOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => TaskOutcome::Panicked,
            Err(_) => TaskOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_disabled_task_is_not_started() {
        let root = CancellationToken::new();
        let handle = SupervisedTask::new("profiler", false)
            .spawn(&root, |_| async { Ok::<(), String>(()) });
        assert!(handle.is_none());
    }

    #[tokio::test]
    async fn test_error_is_contained() {
        let root = CancellationToken::new();
        let handle = SupervisedTask::new("capture", true)
            .spawn(&root, |_| async { Err::<(), _>("device missing") })
            .unwrap();
        assert_eq!(handle.name(), "capture");
        assert_eq!(handle.join().await, TaskOutcome::Failed);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let root = CancellationToken::new();
        let handle = SupervisedTask::new("capture", true)
            .spawn_blocking(&root, |_| -> Result<(), String> { panic!("frame buffer exploded") })
            .unwrap();
        assert_eq!(handle.join().await, TaskOutcome::Panicked);
    }

    #[tokio::test]
    async fn test_cancel_stops_task() {
        let root = CancellationToken::new();
        let handle = SupervisedTask::new("profiler", true)
            .spawn(&root, |cancel| async move {
                cancel.cancelled().await;
                Ok::<(), String>(())
            })
            .unwrap();
        assert!(!handle.is_finished());

        handle.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap();
        assert_eq!(outcome, TaskOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_parent_cancellation_reaches_blocking_task() {
        let root = CancellationToken::new();
        let handle = SupervisedTask::new("capture", true)
            .spawn_blocking(&root, |cancel| {
                while !cancel.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Ok::<(), String>(())
            })
            .unwrap();

        root.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap();
        assert_eq!(outcome, TaskOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_completed_task() {
        let root = CancellationToken::new();
        let handle = SupervisedTask::new("oneshot", true)
            .spawn(&root, |_| async { Ok::<(), String>(()) })
            .unwrap();
        assert_eq!(handle.join().await, TaskOutcome::Completed);
    }
}
