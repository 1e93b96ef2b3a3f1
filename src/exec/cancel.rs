// src/exec/cancel.rs

//! One-shot cancellation signal shared between the scheduler and a stage.

use tokio::sync::watch;

/// Sending half, held by whoever enforces the deadline.
#[derive(Debug)]
pub struct CancelTrigger {
    tx: watch::Sender<bool>,
}

impl CancelTrigger {
    pub fn cancel(&self) {
        // `send_replace` works even if every receiver is already gone.
        self.tx.send_replace(true);
    }
}

/// Receiving half, handed to the stage.
#[derive(Debug, Clone)]
pub struct StageCancel {
    rx: Option<watch::Receiver<bool>>,
}

impl StageCancel {
    pub fn new() -> (CancelTrigger, StageCancel) {
        let (tx, rx) = watch::channel(false);
        (CancelTrigger { tx }, StageCancel { rx: Some(rx) })
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        StageCancel { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested.
    ///
    /// Dropping the trigger without cancelling is not a cancellation; the
    /// future then stays pending.
    pub async fn cancelled(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}
