use crate::dispatch::TaskId;
use crate::error::SolverError;

/// Marker the service prefixes to a successful reply: `OK|<payload>`.
const READY_MARKER: &str = "OK|";
const NOT_READY_MARKER: &str = "CAPCHA_NOT_READY";
const ERROR_MARKER: &str = "ERROR";

/// Classification of one plain-text reply from the captcha service.
/// The protocol is pipe-delimited text, so every call site goes through
/// [`classify`] instead of matching markers itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceReply {
    /// `OK|<payload>`: a task id after submission, the answer after polling.
    Ready(String),
    /// `CAPCHA_NOT_READY`: keep polling.
    NotReady,
    /// The service reported a failure. Holds the whole reply.
    Error(String),
    /// None of the known markers. Holds the raw body.
    Malformed(String),
}

/// Classify a reply body. Markers are checked in a fixed order: a ready
/// reply wins over an error marker, so payloads never need escaping.
pub fn classify(body: &str) -> ServiceReply {
    let text = body.trim();

    if text.contains(READY_MARKER) {
        let payload = text.split('|').nth(1).unwrap_or_default();
        return ServiceReply::Ready(payload.to_string());
    }
    if text.contains(NOT_READY_MARKER) {
        return ServiceReply::NotReady;
    }
    if text.contains(ERROR_MARKER) {
        return ServiceReply::Error(body.to_string());
    }
    ServiceReply::Malformed(body.to_string())
}

impl ServiceReply {
    /// True once the reply ends a poll for its task.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Error(_))
    }

    /// Interpret a submission reply. Only `Ready` carries a task id.
    pub fn into_task_id(self) -> Result<TaskId, SolverError> {
        match self {
            Self::Ready(id) if !id.is_empty() => Ok(TaskId::from(id)),
            Self::Ready(_) => Err(SolverError::Protocol(
                "submission accepted without a task id".to_string(),
            )),
            Self::Error(msg) => Err(SolverError::Service(msg)),
            Self::NotReady => Err(SolverError::Protocol(NOT_READY_MARKER.to_string())),
            Self::Malformed(raw) => Err(SolverError::Protocol(raw)),
        }
    }
}
