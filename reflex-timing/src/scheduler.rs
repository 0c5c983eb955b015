use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Identifies the trial a scheduled trigger belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerToken(pub u64);

/// Single-shot delayed triggers
///
/// Cancelling a handle before its delay elapses guarantees the token is
/// never delivered by that handle.
pub trait Scheduler {
    type Handle;

    fn after(&mut self, delay: Duration, token: TriggerToken) -> Self::Handle;
    fn cancel(&mut self, handle: Self::Handle);
}

pub type TriggerReceiver = mpsc::UnboundedReceiver<TriggerToken>;

/// Delivers tokens on a channel from sleeping tokio tasks
///
/// `after` must be called from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TriggerToken>,
}

impl TokioScheduler {
    pub fn new() -> (Self, TriggerReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Scheduler for TokioScheduler {
    type Handle = JoinHandle<()>;

    fn after(&mut self, delay: Duration, token: TriggerToken) -> JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the session ended
            let _ = tx.send(token);
        })
    }

    fn cancel(&mut self, handle: JoinHandle<()>) {
        trace!("cancelling pending trigger");
        handle.abort();
    }
}
