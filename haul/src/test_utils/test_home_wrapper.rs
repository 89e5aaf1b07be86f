use std::sync::{Arc, Mutex};

use crate::error::{ErrorKind, HaulError, HaulResult};
use crate::home::{BatchStream, Home};
use crate::types::BatchSchema;
use crate::watermark::FilterExpression;

#[derive(Debug, Default)]
struct Inner {
    reads: Vec<Option<FilterExpression>>,
    validate_calls: usize,
    validate_failures: Option<(ErrorKind, usize)>,
}

/// Wraps a [`Home`], recording the filter of every read and scripting schema failures.
#[derive(Clone)]
pub struct TestHomeWrapper<H> {
    home: H,
    inner: Arc<Mutex<Inner>>,
}

impl<H> TestHomeWrapper<H> {
    pub fn wrap(home: H) -> Self {
        Self {
            home,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Makes the next `times` calls to `validate_schema` fail with `kind`.
    pub fn fail_validate_schema(&self, kind: ErrorKind, times: usize) {
        self.inner.lock().unwrap().validate_failures = Some((kind, times));
    }

    /// Filters passed to `read_batches`, one entry per call.
    pub fn reads(&self) -> Vec<Option<FilterExpression>> {
        self.inner.lock().unwrap().reads.clone()
    }

    pub fn validate_calls(&self) -> usize {
        self.inner.lock().unwrap().validate_calls
    }
}

impl<H> Home for TestHomeWrapper<H>
where
    H: Home + Send + Sync,
{
    fn name(&self) -> &str {
        self.home.name()
    }

    async fn validate_schema(&self) -> HaulResult<BatchSchema> {
        let failure = {
            let mut inner = self.inner.lock().unwrap();
            inner.validate_calls += 1;

            match inner.validate_failures.as_mut() {
                Some((kind, remaining)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(*kind)
                }
                _ => None,
            }
        };

        if let Some(kind) = failure {
            return Err(HaulError::from((kind, "Scripted schema lookup failure")));
        }

        self.home.validate_schema().await
    }

    async fn read_batches(&self, filter: Option<FilterExpression>) -> HaulResult<BatchStream> {
        self.inner.lock().unwrap().reads.push(filter.clone());
        self.home.read_batches(filter).await
    }
}
