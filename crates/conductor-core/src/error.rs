// ABOUTME: Error taxonomy for conductor - connection, cancellation, config failures
// ABOUTME: Classification maps caught task failures to client-visible kinds

use thiserror::Error;

/// The designated external connection-error type.
///
/// Carries a stable code tag in its rendered message so that classification
/// still works for errors that crossed a worker boundary as plain strings.
#[derive(Debug, Error)]
#[error("{code}: backend connection failed: {message}", code = ConnectionError::CODE)]
pub struct ConnectionError {
    pub message: String,
}

impl ConnectionError {
    /// Stable code tag embedded in every rendered connection error.
    pub const CODE: &'static str = "E_BACKEND_CONNECTION";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure of a supervised task body.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("task cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    /// Short type name for diagnostic notifications.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connection(_) => "ConnectionError",
            Self::Cancelled => "Cancelled",
            Self::Other(_) => "UnexpectedError",
        }
    }
}

/// Rejected backend configuration during a config swap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown backend '{0}'")]
    UnknownBackend(String),

    #[error("no model specified for backend '{0}'")]
    MissingModel(String),

    #[error("backend '{0}' requires a base URL")]
    MissingBaseUrl(String),
}

/// Client-visible failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Cancelled,
    Unexpected,
}

/// A classified task failure. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Classify a task failure into a client-visible kind.
///
/// Priority order: direct connection errors, then cancellation, then a walk
/// of the cause chain looking for a wrapped `ConnectionError` by type or by
/// its stable code tag. Everything else is `Unexpected`.
pub fn classify(err: &TaskError) -> ClassifiedError {
    let kind = match err {
        TaskError::Connection(_) => ErrorKind::Connection,
        TaskError::Cancelled => ErrorKind::Cancelled,
        TaskError::Other(inner) => {
            let is_connection = inner.chain().any(|cause| {
                cause.downcast_ref::<ConnectionError>().is_some()
                    || cause.to_string().contains(ConnectionError::CODE)
            });
            if is_connection {
                ErrorKind::Connection
            } else {
                ErrorKind::Unexpected
            }
        }
    };
    ClassifiedError {
        kind,
        message: err.to_string(),
    }
}
