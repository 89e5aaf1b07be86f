use core::pin::Pin;
use core::task::{Context, Poll};

use futures::Stream;
use futures::future::BoxFuture;
use futures::FutureExt;
use pin_project_lite::pin_project;
use tracing::info;

use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx, shutdown_requested};

pin_project! {
    /// A stream adapter that stops yielding items once shutdown is requested.
    ///
    /// The shutdown signal is checked before every poll of the inner stream and also wakes the
    /// task while the inner stream is pending, so a slow home does not delay cancellation.
    #[must_use = "streams do nothing unless polled"]
    pub struct ShutdownStream<S> {
        #[pin]
        stream: S,
        shutdown: BoxFuture<'static, ()>,
        stopped: bool,
    }
}

impl<S: Stream> ShutdownStream<S> {
    /// Wraps `stream`, listening for shutdown on `shutdown_rx`.
    pub fn wrap(stream: S, mut shutdown_rx: ShutdownRx) -> Self {
        let shutdown = async move { shutdown_requested(&mut shutdown_rx).await }.boxed();

        Self {
            stream,
            shutdown,
            stopped: false,
        }
    }
}

impl<S: Stream> Stream for ShutdownStream<S> {
    type Item = ShutdownResult<S::Item, ()>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        if *this.stopped {
            return Poll::Ready(None);
        }

        if this.shutdown.as_mut().poll(cx).is_ready() {
            info!("stream stopped due to shutdown signal");
            *this.stopped = true;

            return Poll::Ready(Some(ShutdownResult::Shutdown(())));
        }

        match this.stream.poll_next(cx) {
            Poll::Ready(Some(item)) => Poll::Ready(Some(ShutdownResult::Ok(item))),
            Poll::Ready(None) => {
                *this.stopped = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
