//! `TimerHandle` wraps a `tokio::task::JoinHandle` so scheduled round/reveal
//! actions can be cancelled idempotently. See §9 Design Notes.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct TimerHandle(Option<JoinHandle<()>>);

impl TimerHandle {
    pub fn none() -> Self {
        TimerHandle(None)
    }

    /// Spawn `fut` to run after `duration`. Dropping or cancelling the
    /// returned handle aborts it; an in-flight abort racing the future's
    /// completion is fine because callers also gate on a generation number
    /// captured at schedule time.
    pub fn schedule<F>(duration: Duration, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            fut.await;
        });
        TimerHandle(Some(handle))
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
