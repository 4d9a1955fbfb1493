use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use crate::error::{Error, Result};

/// Owns the background tasks and the token that tells them to stop.
///
/// Tasks receive a child of the supervisor's shutdown token and are expected
/// to return once it is cancelled. `shutdown_all()` cancels the token, waits
/// up to the grace period for each task, then aborts whatever is left.
pub struct TaskSupervisor {
    tasks: HashMap<String, JoinHandle<()>>,
    shutdown: CancellationToken,
    grace_period: Duration,
}

impl TaskSupervisor {
    pub fn new(shutdown: CancellationToken) -> Self {
        TaskSupervisor {
            tasks: HashMap::new(),
            shutdown,
            grace_period: Duration::from_secs(5),
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Spawn a task built from a child shutdown token and register it.
    pub fn spawn<F, Fut>(&mut self, name: impl Into<String>, task: F) -> &mut Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let handle = tokio::spawn(task(self.shutdown.child_token()));

        info!("Spawned background task: {}", name);
        self.tasks.insert(name, handle);
        self
    }

    /// Err if any task finished before shutdown was requested
    pub fn check_health(&mut self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Ok(());
        }

        let failed_tasks: Vec<String> = self.tasks
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect();

        if failed_tasks.is_empty() {
            return Ok(());
        }

        let error_msg = format!("Tasks terminated unexpectedly: {:?}", failed_tasks);
        error!("{}", error_msg);

        for name in &failed_tasks {
            self.tasks.remove(name);
        }

        Err(Error::TaskFailure(error_msg))
    }

    /// Run `check_health` every `interval` until shutdown is requested.
    /// Returns how many tasks were found dead along the way.
    pub async fn monitor(&mut self, interval: Duration) -> usize {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let shutdown = self.shutdown.clone();
        let mut failures = 0;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let before = self.tasks.len();
                    if self.check_health().is_err() {
                        failures += before - self.tasks.len();
                    }
                }
            }
        }

        if failures > 0 {
            warn!("{} background task(s) died before shutdown", failures);
        }
        failures
    }

    pub fn active_task_count(&self) -> usize {
        self.tasks.len()
    }

    pub async fn shutdown_all(&mut self) {
        info!("Shutting down {} background tasks", self.tasks.len());
        self.shutdown.cancel();

        for (name, mut handle) in self.tasks.drain() {
            match tokio::time::timeout(self.grace_period, &mut handle).await {
                Ok(Ok(())) => info!("Task {} stopped", name),
                Ok(Err(e)) => warn!("Task {} ended abnormally: {}", name, e),
                Err(_) => {
                    handle.abort();
                    warn!("Aborted task {} after grace period", name);
                }
            }
        }
    }

    pub async fn wait_for_task(&mut self, name: &str) -> Result<()> {
        let handle = self.tasks
            .remove(name)
            .ok_or_else(|| Error::TaskFailure(format!("Task {} not found", name)))?;

        handle.await
            .map_err(|e| Error::TaskFailure(format!("Task {} failed: {}", name, e)))?;
        info!("Task {} completed", name);
        Ok(())
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}
