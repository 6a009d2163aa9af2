use std::time::{Duration, Instant};

use reqwest::Client;

use crate::config::SolverConfig;
use crate::dispatch::{ReplyBody, TaskId, read_body};
use crate::error::SolverError;
use crate::response::{ServiceReply, classify};

/// Query string for one result lookup.
pub fn poll_query(config: &SolverConfig, task_id: &TaskId) -> Vec<(&'static str, String)> {
    vec![
        ("key", config.api_key.clone()),
        ("action", "get".to_string()),
        ("id", task_id.as_str().to_string()),
    ]
}

/// Polls the result endpoint for one task until the service gives a
/// terminal reply, or until one of the configured guards trips.
pub struct PollDispatch<'a> {
    client: &'a Client,
    config: &'a SolverConfig,
}

impl<'a> PollDispatch<'a> {
    pub fn new(client: &'a Client, config: &'a SolverConfig) -> Self {
        Self { client, config }
    }

    /// Sleep, ask, repeat. The interval is slept before every request,
    /// including the first, since a freshly submitted task is never ready.
    pub async fn wait_for_answer(&self, task_id: &TaskId) -> Result<String, SolverError> {
        let interval = self.config.poll_interval;
        let query = poll_query(self.config, task_id);
        let start = Instant::now();
        let deadline = self.config.solve_timeout.map(|t| start + t);

        let mut attempt: u32 = 0;
        let mut malformed_run: u32 = 0;

        loop {
            if self.config.max_poll_attempts.is_some_and(|max| attempt >= max) {
                return Err(SolverError::PollLimit {
                    task_id: task_id.clone(),
                    attempts: attempt,
                });
            }

            if let Some(deadline) = deadline {
                let remaining = remaining_until(deadline, start)?;
                if remaining < interval {
                    return Err(SolverError::Timeout(elapsed_ms(start)));
                }
            }

            tokio::time::sleep(interval).await;
            attempt += 1;

            let mut request = self.client.get(&self.config.result_url).query(&query);
            let mut deadline_bound = false;
            if let Some(deadline) = deadline {
                // Re-read after the sleep so the request cannot overrun the deadline.
                let remaining = remaining_until(deadline, start)?;
                deadline_bound = remaining < self.config.http_timeout;
                request = request.timeout(remaining.min(self.config.http_timeout));
            }

            let reply = match fetch(request).await {
                Ok(ReplyBody::Text(body)) => classify(&body),
                // A huge body (e.g. a proxy error page) is just another unknown reply.
                Ok(ReplyBody::Oversized(note)) => ServiceReply::Malformed(note),
                Err(SolverError::Request(e)) if e.is_timeout() && deadline_bound => {
                    return Err(SolverError::Timeout(elapsed_ms(start)));
                }
                Err(e) => return Err(e),
            };

            match reply {
                ServiceReply::Ready(answer) => {
                    tracing::info!(
                        task_id = task_id.as_str(),
                        attempt = attempt,
                        elapsed_ms = elapsed_ms(start),
                        "captcha solved"
                    );
                    return Ok(answer);
                }
                ServiceReply::NotReady => {
                    malformed_run = 0;
                    tracing::debug!(
                        task_id = task_id.as_str(),
                        attempt = attempt,
                        elapsed_ms = elapsed_ms(start),
                        "captcha not ready"
                    );
                }
                ServiceReply::Error(msg) => {
                    tracing::warn!(task_id = task_id.as_str(), attempt = attempt, "service error: {msg}");
                    return Err(SolverError::Service(msg));
                }
                ServiceReply::Malformed(raw) => {
                    malformed_run += 1;
                    tracing::warn!(
                        task_id = task_id.as_str(),
                        attempt = attempt,
                        consecutive = malformed_run,
                        "unrecognized poll reply: {raw:?}"
                    );
                    if self
                        .config
                        .malformed_limit
                        .is_some_and(|limit| malformed_run >= limit)
                    {
                        return Err(SolverError::Protocol(raw));
                    }
                }
            }
        }
    }
}

async fn fetch(request: reqwest::RequestBuilder) -> Result<ReplyBody, SolverError> {
    let response = request.send().await?;
    read_body(response).await
}

fn remaining_until(deadline: Instant, start: Instant) -> Result<Duration, SolverError> {
    deadline
        .checked_duration_since(Instant::now())
        .ok_or_else(|| SolverError::Timeout(elapsed_ms(start)))
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
