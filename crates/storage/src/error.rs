use docbulk_core::Error as CoreError;
use std::time::Duration;
use thiserror::Error;

/// HTTP-style status code the service uses for "too many requests"
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Failure returned by a remote document service call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The caller exceeded its request capacity; retry after the hinted delay
    #[error("Request rate is large (status 429), retry after {}ms", .retry_after.as_millis())]
    Throttled { retry_after: Duration },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service error (status {status}): {message}")]
    Service { status: u16, message: String },

    /// The service answered, but not in the shape the caller expects
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Several failures collected by concurrent execution machinery
    #[error("{} errors occurred, first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    Aggregate(Vec<RemoteError>),
}

impl RemoteError {
    /// Creates a throttling error carrying the server's retry-after hint
    pub fn throttled(retry_after: Duration) -> Self {
        Self::Throttled { retry_after }
    }

    /// Status code of the failure, where one applies
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Throttled { .. } => Some(STATUS_TOO_MANY_REQUESTS),
            Self::NotFound(_) => Some(404),
            Self::Conflict(_) => Some(409),
            Self::BadRequest(_) => Some(400),
            Self::Service { status, .. } => Some(*status),
            Self::InvalidResponse(_) | Self::Aggregate(_) => None,
        }
    }

    /// The server-suggested delay if this failure is a rate-limit signal
    ///
    /// An aggregate is unwrapped at most one level, looking at its first inner error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Throttled { retry_after } => Some(*retry_after),
            Self::Aggregate(inner) => match inner.first() {
                Some(Self::Throttled { retry_after }) => Some(*retry_after),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_throttled(&self) -> bool {
        self.retry_after().is_some()
    }
}

impl From<RemoteError> for CoreError {
    fn from(err: RemoteError) -> Self {
        CoreError::with_context("Remote call failed", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttled_carries_status_and_delay() {
        let err = RemoteError::throttled(Duration::from_millis(250));
        assert_eq!(err.status(), Some(STATUS_TOO_MANY_REQUESTS));
        assert_eq!(err.retry_after(), Some(Duration::from_millis(250)));
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn test_aggregate_unwraps_one_level() {
        let err = RemoteError::Aggregate(vec![RemoteError::throttled(Duration::ZERO)]);
        assert_eq!(err.retry_after(), Some(Duration::ZERO));

        let nested = RemoteError::Aggregate(vec![RemoteError::Aggregate(vec![
            RemoteError::throttled(Duration::from_millis(5)),
        ])]);
        assert_eq!(nested.retry_after(), None);
    }

    #[test]
    fn test_aggregate_only_inspects_first_inner_error() {
        let err = RemoteError::Aggregate(vec![
            RemoteError::NotFound("dbs/x".to_string()),
            RemoteError::throttled(Duration::from_millis(5)),
        ]);
        assert!(!err.is_throttled());
        assert!(err.to_string().starts_with("2 errors occurred"));
    }

    #[test]
    fn test_other_errors_are_not_throttled() {
        let err = RemoteError::Service {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_throttled());
        assert!(!RemoteError::InvalidResponse("x".to_string()).is_throttled());
    }
}
