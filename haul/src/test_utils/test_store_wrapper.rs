use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{Notify, oneshot};

use crate::RunMode;
use crate::error::{ErrorKind, HaulError, HaulResult};
use crate::pool::PoolRegistry;
use crate::store::{Completion, Store};
use crate::test_utils::notify::TimedNotify;
use crate::types::Batch;

type RowCondition = Box<dyn Fn(u64) -> bool + Send + Sync>;

struct WriteFailure {
    batch: u64,
    kind: ErrorKind,
    remaining: u32,
}

#[derive(Default)]
struct Inner {
    configured_modes: Vec<RunMode>,
    cleanup_calls: u32,
    reset_calls: u32,
    finish_calls: u32,
    write_calls: u64,
    /// Batches received since the last `configure_for_run`, i.e. in the current attempt.
    attempt_batches: u64,
    rows_written: u64,
    write_failures: Vec<WriteFailure>,
    write_delay: Option<Duration>,
    finish_gate: Option<oneshot::Receiver<()>>,
    row_conditions: Vec<(RowCondition, Arc<Notify>)>,
    finish_notify: Option<Arc<Notify>>,
}

impl Inner {
    fn check_conditions(&mut self) {
        let rows = self.rows_written;
        self.row_conditions.retain(|(condition, notify)| {
            let satisfied = condition(rows);
            if satisfied {
                notify.notify_one();
            }
            !satisfied
        });
    }

    fn take_failure(&mut self) -> Option<ErrorKind> {
        let batch = self.attempt_batches;
        let failure = self
            .write_failures
            .iter_mut()
            .find(|failure| failure.batch == batch && failure.remaining > 0)?;
        failure.remaining -= 1;

        Some(failure.kind)
    }
}

/// Wraps a [`Store`], recording every call and optionally failing or delaying some of them.
///
/// Cloning shares the recorded state.
#[derive(Clone)]
pub struct TestStoreWrapper<S> {
    store: S,
    inner: Arc<Mutex<Inner>>,
}

impl<S> TestStoreWrapper<S> {
    pub fn wrap(store: S) -> Self {
        Self {
            store,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn wrapped(&self) -> &S {
        &self.store
    }

    /// Fails the `batch`-th write of an attempt (1-based) with `kind`, `times` times.
    pub fn fail_write_on(&self, batch: u64, kind: ErrorKind, times: u32) {
        self.inner.lock().unwrap().write_failures.push(WriteFailure {
            batch,
            kind,
            remaining: times,
        });
    }

    /// Sleeps before every write.
    pub fn delay_writes(&self, delay: Duration) {
        self.inner.lock().unwrap().write_delay = Some(delay);
    }

    /// Makes the next `finish` return [`Completion::Pending`], settling once the returned
    /// sender fires or is dropped.
    pub fn defer_next_finish(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().unwrap().finish_gate = Some(rx);
        tx
    }

    /// Notifies once at least `rows` rows were written across all attempts.
    pub fn notify_on_rows(&self, rows: u64) -> TimedNotify {
        let notify = Arc::new(Notify::new());
        let mut inner = self.inner.lock().unwrap();
        inner
            .row_conditions
            .push((Box::new(move |written| written >= rows), notify.clone()));
        inner.check_conditions();

        TimedNotify::new(notify)
    }

    /// Notifies on the next call to `finish`.
    pub fn notify_on_finish(&self) -> TimedNotify {
        let notify = Arc::new(Notify::new());
        self.inner.lock().unwrap().finish_notify = Some(notify.clone());

        TimedNotify::new(notify)
    }

    pub fn configured_modes(&self) -> Vec<RunMode> {
        self.inner.lock().unwrap().configured_modes.clone()
    }

    pub fn cleanup_calls(&self) -> u32 {
        self.inner.lock().unwrap().cleanup_calls
    }

    pub fn reset_calls(&self) -> u32 {
        self.inner.lock().unwrap().reset_calls
    }

    pub fn finish_calls(&self) -> u32 {
        self.inner.lock().unwrap().finish_calls
    }

    pub fn write_calls(&self) -> u64 {
        self.inner.lock().unwrap().write_calls
    }

    /// Rows accepted by the wrapped store across all attempts.
    pub fn rows_written(&self) -> u64 {
        self.inner.lock().unwrap().rows_written
    }
}

impl<S> Store for TestStoreWrapper<S>
where
    S: Store + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.store.name()
    }

    fn set_pool(&mut self, registry: &PoolRegistry) -> HaulResult<()> {
        self.store.set_pool(registry)
    }

    async fn configure_for_run(&self, mode: RunMode) -> HaulResult<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.configured_modes.push(mode);
            inner.attempt_batches = 0;
        }

        self.store.configure_for_run(mode).await
    }

    async fn write(&self, batch: Batch) -> HaulResult<()> {
        let (failure, delay) = {
            let mut inner = self.inner.lock().unwrap();
            inner.write_calls += 1;
            inner.attempt_batches += 1;
            let failure = inner.take_failure().map(|kind| (kind, inner.attempt_batches));
            (failure, inner.write_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some((kind, batch)) = failure {
            return Err(HaulError::from((
                kind,
                "Injected store write failure",
                format!("write of batch {batch} failed"),
            )));
        }

        let rows = batch.row_count() as u64;
        self.store.write(batch).await?;

        let mut inner = self.inner.lock().unwrap();
        inner.rows_written += rows;
        inner.check_conditions();

        Ok(())
    }

    async fn finish(&self) -> HaulResult<Completion> {
        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.finish_calls += 1;
            if let Some(notify) = inner.finish_notify.take() {
                notify.notify_one();
            }
            inner.finish_gate.take()
        };

        let Some(gate) = gate else {
            return self.store.finish().await;
        };

        let store = self.store.clone();
        let settle = async move {
            let _ = gate.await;
            match store.finish().await? {
                Completion::Settled => Ok(()),
                Completion::Pending(settle) => settle.await,
            }
        };

        Ok(Completion::Pending(settle.boxed()))
    }

    async fn cleanup_staging(&self) -> HaulResult<()> {
        self.inner.lock().unwrap().cleanup_calls += 1;
        self.store.cleanup_staging().await
    }

    async fn reset_retry_sensitive_state(&self) -> HaulResult<()> {
        self.inner.lock().unwrap().reset_calls += 1;
        self.store.reset_retry_sensitive_state().await
    }
}
