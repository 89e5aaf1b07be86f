//! Error types and result definitions for data movement.
//!
//! Every fallible operation in the crate returns [`HaulResult`]. A [`HaulError`] carries a closed
//! [`ErrorKind`], a static description, optional dynamic detail, an optional chained source and
//! the call site that created it. Several errors can be aggregated into one, which is how the
//! producer and consumer of a mover attempt report simultaneous failures.
//!
//! Retry decisions are taken on [`ErrorCategory`], derived from the kind, never on the message.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type for all `haul` operations.
pub type HaulResult<T> = Result<T, HaulError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the crate.
///
/// Cloning is cheap; sources and backtraces are shared.
#[derive(Debug, Clone)]
pub struct HaulError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Several errors raised together, e.g. by both tasks of a mover attempt.
    Many {
        errors: Vec<HaulError>,
        location: &'static Location<'static>,
    },
}

/// Structured failure kinds raised by the core and by home, store and pool adapters.
///
/// Adapters must map their native failures to one of these kinds, in particular to the
/// connection kinds when a failure is transient, so that retries work.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration
    ConfigError,
    SchemaMismatch,
    WatermarkColumnMissing,
    WatermarkColumnIncompatible,

    // Connection
    HomeConnectionFailed,
    StoreConnectionFailed,
    ConnectionReset,
    TransientNetworkFailure,
    OperationTimeout,

    // Pool
    PoolExhausted,
    PoolClosed,

    // Data
    InvalidData,
    SchemaDrift,
    ConversionError,
    HomeError,
    StoreError,

    // Journal and mirror
    JournalIoError,
    JournalCorrupted,
    MirrorPublishFailed,

    // IO and serialization
    IoError,
    SerializationError,
    DeserializationError,

    // State and workflow
    InvalidState,
    MoverTaskPanic,
    ShutdownRequested,
    RetryExhausted,

    Unknown,

    // Kinds raised by fault injection in tests.
    #[cfg(feature = "failpoints")]
    WithNoRetry,
    #[cfg(feature = "failpoints")]
    WithTimedRetry,
}

/// Coarse classification of an [`ErrorKind`], used to decide how a failure propagates.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
pub enum ErrorCategory {
    /// Invalid configuration or schema. Fatal, detected before any data moves.
    Config,
    /// Connection to an external system failed. Retryable.
    Connection,
    /// No pooled connection became available in time. Retryable with backoff.
    PoolExhausted,
    /// Malformed batch or schema drift mid-run. Fatal.
    Data,
    /// Journal or mirror failure. Logged and never allowed to fail a data movement.
    Journal,
    /// Bugs, panics, shutdowns and exhausted retries. Fatal.
    Internal,
}

impl ErrorCategory {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Connection | ErrorCategory::PoolExhausted)
    }
}

impl ErrorKind {
    /// Returns the [`ErrorCategory`] this kind belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::ConfigError
            | ErrorKind::SchemaMismatch
            | ErrorKind::WatermarkColumnMissing
            | ErrorKind::WatermarkColumnIncompatible => ErrorCategory::Config,

            ErrorKind::HomeConnectionFailed
            | ErrorKind::StoreConnectionFailed
            | ErrorKind::ConnectionReset
            | ErrorKind::TransientNetworkFailure
            | ErrorKind::OperationTimeout => ErrorCategory::Connection,

            ErrorKind::PoolExhausted => ErrorCategory::PoolExhausted,

            ErrorKind::InvalidData
            | ErrorKind::SchemaDrift
            | ErrorKind::ConversionError
            | ErrorKind::HomeError
            | ErrorKind::StoreError => ErrorCategory::Data,

            ErrorKind::JournalIoError
            | ErrorKind::JournalCorrupted
            | ErrorKind::MirrorPublishFailed => ErrorCategory::Journal,

            ErrorKind::PoolClosed
            | ErrorKind::IoError
            | ErrorKind::SerializationError
            | ErrorKind::DeserializationError
            | ErrorKind::InvalidState
            | ErrorKind::MoverTaskPanic
            | ErrorKind::ShutdownRequested
            | ErrorKind::RetryExhausted
            | ErrorKind::Unknown => ErrorCategory::Internal,

            #[cfg(feature = "failpoints")]
            ErrorKind::WithNoRetry => ErrorCategory::Internal,
            #[cfg(feature = "failpoints")]
            ErrorKind::WithTimedRetry => ErrorCategory::Connection,
        }
    }
}

impl HaulError {
    /// Returns the kind of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every kind contained in this error, flattening aggregates.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the category of [`HaulError::kind`].
    pub fn category(&self) -> ErrorCategory {
        self.kind().category()
    }

    /// Returns the static description, or `None` for aggregates.
    pub fn description(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.description.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the dynamic detail, or the first detail found in an aggregate.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches the error that caused this one.
    ///
    /// The source is exposed through [`error::Error::source`]. Ignored on aggregates, which
    /// forward their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }

        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        HaulError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for HaulError {
    fn eq(&self, other: &HaulError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for HaulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                write!(
                    f,
                    "[{:?}] {} @ {}:{}",
                    payload.kind,
                    payload.description,
                    payload.location.file(),
                    payload.location.line(),
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    for line in detail.lines() {
                        write!(f, "\n  {line}")?;
                    }
                }

                if let Some(source) = payload.source.as_deref() {
                    write!(f, "\n  caused by: {source}")?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                write!(
                    f,
                    "[Many] {} errors aggregated @ {}:{}",
                    errors.len(),
                    location.file(),
                    location.line(),
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    if let Some(first) = lines.next() {
                        write!(f, "\n  {}. {first}", index + 1)?;
                    }
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for HaulError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for HaulError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> HaulError {
        HaulError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for HaulError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> HaulError {
        HaulError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned unwrapped.
impl<E> From<Vec<E>> for HaulError
where
    E: Into<HaulError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> HaulError {
        let location = Location::caller();
        let mut errors: Vec<HaulError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        HaulError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for HaulError {
    #[track_caller]
    fn from(err: std::io::Error) -> HaulError {
        let detail = err.to_string();
        HaulError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<serde_json::Error> for HaulError {
    #[track_caller]
    fn from(err: serde_json::Error) -> HaulError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => {
                (ErrorKind::DeserializationError, "JSON deserialization failed")
            }
        };

        let detail = err.to_string();
        HaulError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<tokio::task::JoinError> for HaulError {
    #[track_caller]
    fn from(err: tokio::task::JoinError) -> HaulError {
        let (kind, description) = if err.is_panic() {
            (ErrorKind::MoverTaskPanic, "A mover task panicked")
        } else {
            (ErrorKind::ShutdownRequested, "A mover task was cancelled")
        };

        let detail = err.to_string();
        HaulError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<haul_config::shared::ValidationError> for HaulError {
    #[track_caller]
    fn from(err: haul_config::shared::ValidationError) -> HaulError {
        let detail = err.to_string();
        HaulError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
