//! Fixed-period, single-flight task scheduling.
//!
//! The loop runs its task to completion, then sleeps the configured
//! delay, then runs again — so two runs can never overlap by
//! construction, and a slow run simply pushes the next one out. A run
//! that fails is logged and the loop continues on schedule.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::SyncError;

/// Drives a recurring task until stopped.
pub struct TaskLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TaskLoop {
    /// Spawn the loop. The first run starts immediately; each subsequent
    /// run starts `delay` after the previous one settled, success or
    /// failure.
    pub fn spawn<F, Fut>(name: &'static str, delay: Duration, mut task: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), SyncError>> + Send,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                if let Err(e) = task().await {
                    tracing::error!(task = name, error = %e, "scheduled run failed");
                }
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        tracing::info!(task = name, "task loop stopping");
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        });
        Self { shutdown, handle }
    }

    /// Signal shutdown and wait for the in-flight run (if any) to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
