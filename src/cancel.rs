//! Cooperative cancellation
//!
//! One [`CancelToken`] is created per invocation and shared by every phase.
//! Phases check it between steps; the build driver also races running child
//! processes against it and kills them when it fires.

use crate::error::{KilnError, KilnResult};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// `Err(Cancelled)` once the token has fired
    pub fn check(&self) -> KilnResult<()> {
        if self.is_cancelled() {
            Err(KilnError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves when the token fires
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender lives as long as any token clone, so this only happens
            // during teardown.
            std::future::pending::<()>().await;
        }
    }

    /// Cancel this token on Ctrl-C
    pub fn cancel_on_ctrl_c(&self) {
        let token = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                token.cancel();
            }
        });
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
