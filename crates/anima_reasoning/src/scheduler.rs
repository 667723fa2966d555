//! Per-agent reflection scheduling.
//!
//! Each agent has at most one pending idle-reflection task. Every new turn
//! resets the timer, so duplicate concurrent reflections cannot trigger; the
//! task body itself still guards its commit with the session version token.

use std::time::Duration;
use tokio::task::JoinHandle;

/// One agent's cancellable idle timer.
#[derive(Debug, Default)]
pub struct ReflectionScheduler {
    handle: Option<JoinHandle<()>>,
}

impl ReflectionScheduler {
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Arm the timer. Any previously pending reflection for this agent is
    /// cancelled first — there is never more than one in flight.
    pub fn reset<F>(&mut self, delay: Duration, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ReflectionScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
