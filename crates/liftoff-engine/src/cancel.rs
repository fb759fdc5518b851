//! Run-level cancellation
//!
//! A pipeline abort flips a watch channel. Every remote call of a run is
//! raced against it and a cancelled call fails with `Interrupted`.

use liftoff_types::{LiftoffError, Result};
use std::future::Future;
use tokio::sync::watch;

/// Owner side, held by whoever may abort the run
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observer side, handed to the orchestrator
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the run is cancelled; pends forever if it never will be
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `step` unless the run is cancelled first
    pub async fn guard<T, F>(&self, step: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(interrupted(step));
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(interrupted(step)),
            result = fut => result,
        }
    }
}

fn interrupted(step: &str) -> LiftoffError {
    LiftoffError::Interrupted(format!("run cancelled during {}", step))
}
