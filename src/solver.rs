use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;

use crate::config::SolverConfig;
use crate::dispatch::poll::PollDispatch;
use crate::dispatch::submit::SubmitDispatch;
use crate::dispatch::{CaptchaTask, TaskId, build_client, read_reply};
use crate::error::{SolveFailure, SolverError};
use crate::image::ImageLoader;
use crate::response::{ServiceReply, classify};

/// A solved captcha and the task it was solved under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Solution {
    pub answer: String,
    pub task_id: TaskId,
}

pub type SolveResult = Result<Solution, SolveFailure>;

/// Client for the captcha service. Cheap to clone; clones share the
/// config and HTTP client and may solve concurrently.
#[derive(Clone)]
pub struct CaptchaSolver {
    config: Arc<SolverConfig>,
    client: Client,
}

impl CaptchaSolver {
    pub fn new(config: SolverConfig) -> Result<Self, SolverError> {
        let client = build_client(config.http_timeout)?;
        Self::with_client(config, client)
    }

    /// Use a caller-built client, e.g. one pointed at a proxy or a mock.
    pub fn with_client(config: SolverConfig, client: Client) -> Result<Self, SolverError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve an image captcha from a file path or URL. A missing file fails
    /// before anything is sent to the service.
    pub async fn solve_image(&self, location: &str) -> SolveResult {
        let bytes = ImageLoader::new(&self.client)
            .load(location)
            .await
            .map_err(SolveFailure::before_submit)?;
        self.solve(CaptchaTask::Image { bytes }).await
    }

    pub async fn solve_image_bytes(&self, bytes: Vec<u8>) -> SolveResult {
        if bytes.is_empty() {
            return Err(SolveFailure::before_submit(SolverError::EmptyImage(
                "<bytes>".to_string(),
            )));
        }
        self.solve(CaptchaTask::Image { bytes }).await
    }

    pub async fn solve_recaptcha(&self, site_key: &str, page_url: &str) -> SolveResult {
        self.solve(CaptchaTask::RecaptchaV2 {
            site_key: site_key.to_string(),
            page_url: page_url.to_string(),
        })
        .await
    }

    pub async fn solve_recaptcha_v3(
        &self,
        site_key: &str,
        page_url: &str,
        action: &str,
    ) -> SolveResult {
        self.solve(CaptchaTask::RecaptchaV3 {
            site_key: site_key.to_string(),
            page_url: page_url.to_string(),
            action: action.to_string(),
        })
        .await
    }

    /// Submit, then poll. Once submission succeeds the task id rides along
    /// with any later failure.
    pub async fn solve(&self, task: CaptchaTask) -> SolveResult {
        let task_id = SubmitDispatch::new(&self.client, &self.config)
            .submit(&task)
            .await
            .map_err(SolveFailure::before_submit)?;

        match PollDispatch::new(&self.client, &self.config)
            .wait_for_answer(&task_id)
            .await
        {
            Ok(answer) => Ok(Solution { answer, task_id }),
            Err(error) => Err(SolveFailure::after_submit(task_id, error)),
        }
    }

    /// Report a wrong answer so the service refunds it: one POST of
    /// `action=reportbad` to `result_url` (the `res.php` endpoint), no retry.
    pub async fn complain(&self, task_id: &TaskId) -> Result<(), SolverError> {
        let fields = [
            ("key", self.config.api_key.as_str()),
            ("action", "reportbad"),
            ("id", task_id.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.result_url)
            .form(&fields)
            .send()
            .await?;
        let body = read_reply(response).await?;

        let outcome = match classify(&body) {
            ServiceReply::Error(msg) => Err(SolverError::Service(msg)),
            ServiceReply::Ready(_) => Ok(()),
            // OK_REPORT_RECORDED carries no pipe, so it lands here.
            ServiceReply::Malformed(raw) if raw.trim_start().starts_with("OK") => Ok(()),
            ServiceReply::Malformed(raw) => Err(SolverError::Protocol(raw)),
            ServiceReply::NotReady => Err(SolverError::Protocol(body)),
        };

        if outcome.is_ok() {
            tracing::info!(task_id = task_id.as_str(), "complaint recorded");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_empty_key() {
        let err = CaptchaSolver::new(SolverConfig::new("")).err().unwrap();
        assert!(matches!(err, SolverError::Config(_)));
    }

    #[test]
    fn clones_share_config() {
        let solver = CaptchaSolver::new(SolverConfig::new("key")).unwrap();
        let clone = solver.clone();
        assert!(Arc::ptr_eq(&solver.config, &clone.config));
        assert_eq!(clone.config().api_key, "key");
    }

    #[test]
    fn solution_serializes_task_id_as_string() {
        let solution = Solution {
            answer: "abc".to_string(),
            task_id: TaskId::from("77"),
        };
        let json = serde_json::to_value(&solution).unwrap();
        assert_eq!(json["task_id"], "77");
        assert_eq!(json["answer"], "abc");
    }

    #[tokio::test]
    async fn empty_bytes_fail_before_submit() {
        let solver = CaptchaSolver::new(SolverConfig::new("key")).unwrap();
        let failure = solver.solve_image_bytes(Vec::new()).await.unwrap_err();
        assert!(failure.task_id.is_none());
        assert!(matches!(failure.error, SolverError::EmptyImage(_)));
    }
}
