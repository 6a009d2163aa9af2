use thiserror::Error;

use crate::dispatch::TaskId;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("captcha service error: {0}")]
    Service(String),

    #[error("unknown response: {0}")]
    Protocol(String),

    #[error("failed to read captcha image {path}: {source}")]
    ImageRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch captcha image {url}: {message}")]
    ImageFetch { url: String, message: String },

    #[error("captcha image is empty: {0}")]
    EmptyImage(String),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("task {task_id} not solved after {attempts} polls")]
    PollLimit { task_id: TaskId, attempts: u32 },
}

impl SolverError {
    /// The message the remote service reported, if this error came from it.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Service(msg) => Some(msg),
            Self::Protocol(raw) => Some(raw),
            _ => None,
        }
    }

    /// Returns true for transient errors where submitting the captcha again
    /// may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Timeout(_) => true,
            Self::PollLimit { .. } => true,
            // ERROR_NO_SLOT_AVAILABLE is the service asking us to come back later.
            Self::Service(msg) => msg.contains("NO_SLOT_AVAILABLE"),
            _ => false,
        }
    }
}

/// A failed solve. Carries the task identifier when submission succeeded so
/// the caller can still file a complaint for it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct SolveFailure {
    pub task_id: Option<TaskId>,
    #[source]
    pub error: SolverError,
}

impl SolveFailure {
    pub fn before_submit(error: SolverError) -> Self {
        Self {
            task_id: None,
            error,
        }
    }

    pub fn after_submit(task_id: TaskId, error: SolverError) -> Self {
        Self {
            task_id: Some(task_id),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_keeps_remote_message() {
        let err = SolverError::Service("ERROR_ZERO_BALANCE".to_string());
        assert_eq!(err.remote_message(), Some("ERROR_ZERO_BALANCE"));
        assert!(err.to_string().contains("ERROR_ZERO_BALANCE"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn no_slot_is_retryable() {
        let err = SolverError::Service("ERROR_NO_SLOT_AVAILABLE".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn config_error_has_no_remote_message() {
        let err = SolverError::Config("api key is empty".to_string());
        assert_eq!(err.remote_message(), None);
        assert!(!err.is_retryable());
    }

    #[test]
    fn failure_displays_inner_error() {
        let failure = SolveFailure::after_submit(
            TaskId::from("42"),
            SolverError::Service("ERROR_CAPTCHA_UNSOLVABLE".to_string()),
        );
        assert_eq!(failure.task_id.as_ref().map(TaskId::as_str), Some("42"));
        assert_eq!(
            failure.to_string(),
            "captcha service error: ERROR_CAPTCHA_UNSOLVABLE"
        );
    }
}
