use std::future;
use std::sync::Arc;

use tokio::sync::watch;

/// Receiver side of the shutdown channel.
///
/// The value flips from `false` to `true` once and never goes back.
pub type ShutdownRx = watch::Receiver<bool>;

/// Outcome of an operation that can be interrupted by a shutdown request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult<T, I> {
    /// The operation produced a value normally.
    Ok(T),
    /// A shutdown was requested; carries whatever was in flight.
    Shutdown(I),
}

impl<T, I> ShutdownResult<T, I> {
    pub fn should_shutdown(&self) -> bool {
        matches!(self, ShutdownResult::Shutdown(_))
    }
}

/// Sender side of the shutdown channel. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(Arc<watch::Sender<bool>>);

impl ShutdownTx {
    /// Requests shutdown. Receivers subscribed before or after this call all observe it.
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }

    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }
}

/// Creates a new shutdown channel in the "running" state.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(Arc::new(tx)), rx)
}

/// Returns `true` if shutdown was already requested, without waiting.
pub fn is_shutdown_requested(shutdown_rx: &ShutdownRx) -> bool {
    *shutdown_rx.borrow()
}

/// Resolves once shutdown is requested.
///
/// If every sender is dropped without requesting shutdown, this never resolves.
pub async fn shutdown_requested(shutdown_rx: &mut ShutdownRx) {
    if shutdown_rx.wait_for(|requested| *requested).await.is_err() {
        future::pending::<()>().await;
    }
}
