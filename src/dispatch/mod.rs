pub mod poll;
pub mod submit;

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::error::SolverError;

/// Identifier the service assigns to one submitted captcha.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One captcha to hand to the service.
#[derive(Clone)]
pub enum CaptchaTask {
    Image {
        bytes: Vec<u8>,
    },
    RecaptchaV2 {
        site_key: String,
        page_url: String,
    },
    RecaptchaV3 {
        site_key: String,
        page_url: String,
        action: String,
    },
}

impl CaptchaTask {
    /// Short name used in logs.
    pub fn modality(&self) -> &'static str {
        match self {
            Self::Image { .. } => "image",
            Self::RecaptchaV2 { .. } => "recaptcha_v2",
            Self::RecaptchaV3 { .. } => "recaptcha_v3",
        }
    }
}

impl fmt::Debug for CaptchaTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image { bytes } => f
                .debug_struct("Image")
                .field("len", &bytes.len())
                .finish(),
            Self::RecaptchaV2 { site_key, page_url } => f
                .debug_struct("RecaptchaV2")
                .field("site_key", site_key)
                .field("page_url", page_url)
                .finish(),
            Self::RecaptchaV3 {
                site_key,
                page_url,
                action,
            } => f
                .debug_struct("RecaptchaV3")
                .field("site_key", site_key)
                .field("page_url", page_url)
                .field("action", action)
                .finish(),
        }
    }
}

/// Build the HTTP client for one solver. Idle connections are never kept,
/// so each request opens a fresh one.
pub fn build_client(timeout: Duration) -> Result<Client, SolverError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .pool_max_idle_per_host(0)
        .build()
        .map_err(SolverError::Request)
}

/// Replies are a few dozen bytes; anything past this is not the protocol.
const MAX_REPLY_BYTES: usize = 64 * 1024;

/// A reply body, or a note that it was too large to be a protocol reply.
pub(crate) enum ReplyBody {
    Text(String),
    Oversized(String),
}

/// Read a reply body, logging the status code. The service answers 200
/// for its own errors, so the body alone decides the outcome.
pub(crate) async fn read_body(response: reqwest::Response) -> Result<ReplyBody, SolverError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    tracing::trace!(status = status.as_u16(), len = bytes.len(), "reply received");

    if bytes.len() > MAX_REPLY_BYTES {
        return Ok(ReplyBody::Oversized(format!(
            "reply too large: {} bytes (HTTP {status})",
            bytes.len()
        )));
    }
    Ok(ReplyBody::Text(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Like [`read_body`], but an oversized reply is a protocol error.
pub(crate) async fn read_reply(response: reqwest::Response) -> Result<String, SolverError> {
    match read_body(response).await? {
        ReplyBody::Text(text) => Ok(text),
        ReplyBody::Oversized(note) => Err(SolverError::Protocol(note)),
    }
}
