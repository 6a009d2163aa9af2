use reqwest::Client;
use reqwest::multipart::{Form, Part};

use crate::config::{Language, NumericMode, SolveHints, SolverConfig};
use crate::dispatch::{CaptchaTask, TaskId, read_reply};
use crate::error::SolverError;
use crate::response::classify;

/// File name sent with uploaded images. The service sniffs the real format.
const IMAGE_FILE_NAME: &str = "captcha.jpg";

/// Text fields for a submission, in wire order. Images additionally carry
/// a `file` part, added by [`SubmitDispatch::submit`].
pub fn form_fields(task: &CaptchaTask, config: &SolverConfig) -> Vec<(&'static str, String)> {
    let mut fields = vec![("key", config.api_key.clone())];

    match task {
        CaptchaTask::Image { .. } => {
            fields.push(("method", "post".to_string()));
            push_hints(&mut fields, &config.hints);
        }
        CaptchaTask::RecaptchaV2 { site_key, page_url } => {
            fields.push(("method", "userrecaptcha".to_string()));
            fields.push(("googlekey", site_key.clone()));
            fields.push(("pageurl", page_url.clone()));
        }
        CaptchaTask::RecaptchaV3 {
            site_key,
            page_url,
            action,
        } => {
            fields.push(("method", "userrecaptcha".to_string()));
            fields.push(("version", "v3".to_string()));
            fields.push(("action", action.clone()));
            fields.push(("googlekey", site_key.clone()));
            fields.push(("pageurl", page_url.clone()));
        }
    }

    fields
}

/// Only hints that differ from the service defaults go on the wire.
fn push_hints(fields: &mut Vec<(&'static str, String)>, hints: &SolveHints) {
    if hints.phrase {
        fields.push(("phrase", "1".to_string()));
    }
    if hints.case_sensitive {
        fields.push(("regsense", "1".to_string()));
    }
    if hints.numeric != NumericMode::Any {
        fields.push(("numeric", hints.numeric.code().to_string()));
    }
    if hints.min_length > 0 {
        fields.push(("min_len", hints.min_length.to_string()));
    }
    if hints.max_length > 0 {
        fields.push(("max_len", hints.max_length.to_string()));
    }
    if hints.language != Language::Any {
        fields.push(("language", hints.language.code().to_string()));
    }
}

/// Sends captchas to the submission endpoint. One request per call, no
/// retries: a transport failure goes straight back to the caller.
pub struct SubmitDispatch<'a> {
    client: &'a Client,
    config: &'a SolverConfig,
}

impl<'a> SubmitDispatch<'a> {
    pub fn new(client: &'a Client, config: &'a SolverConfig) -> Self {
        Self { client, config }
    }

    pub async fn submit(&self, task: &CaptchaTask) -> Result<TaskId, SolverError> {
        let fields = form_fields(task, self.config);
        let request = self.client.post(&self.config.request_url);

        let request = match task {
            CaptchaTask::Image { bytes } => {
                let file = Part::bytes(bytes.clone()).file_name(IMAGE_FILE_NAME);
                let form = fields
                    .into_iter()
                    .fold(Form::new(), |form, (name, value)| form.text(name, value))
                    .part("file", file);
                request.multipart(form)
            }
            _ => request.form(&fields),
        };

        let response = request.send().await?;
        let body = read_reply(response).await?;
        let task_id = classify(&body).into_task_id()?;

        tracing::info!(
            modality = task.modality(),
            task_id = task_id.as_str(),
            "captcha submitted"
        );
        Ok(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SolverConfig {
        SolverConfig::new("test-key")
    }

    fn field<'f>(fields: &'f [(&'static str, String)], name: &str) -> Option<&'f str> {
        fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn image_without_hints_sends_only_key_and_method() {
        let task = CaptchaTask::Image { bytes: vec![1, 2, 3] };
        let fields = form_fields(&task, &config());
        assert_eq!(
            fields,
            vec![("key", "test-key".to_string()), ("method", "post".to_string())]
        );
    }

    #[test]
    fn image_carries_hints() {
        let config = config().with_hints(SolveHints {
            phrase: true,
            case_sensitive: true,
            numeric: NumericMode::NumbersOnly,
            min_length: 4,
            max_length: 6,
            language: Language::Cyrillic,
        });
        let fields = form_fields(&CaptchaTask::Image { bytes: vec![] }, &config);

        assert_eq!(field(&fields, "phrase"), Some("1"));
        assert_eq!(field(&fields, "regsense"), Some("1"));
        assert_eq!(field(&fields, "numeric"), Some("1"));
        assert_eq!(field(&fields, "min_len"), Some("4"));
        assert_eq!(field(&fields, "max_len"), Some("6"));
        assert_eq!(field(&fields, "language"), Some("1"));
    }

    #[test]
    fn recaptcha_v2_fields() {
        let task = CaptchaTask::RecaptchaV2 {
            site_key: "6Le-site".to_string(),
            page_url: "https://example.com/login".to_string(),
        };
        let fields = form_fields(&task, &config());

        assert_eq!(field(&fields, "key"), Some("test-key"));
        assert_eq!(field(&fields, "method"), Some("userrecaptcha"));
        assert_eq!(field(&fields, "googlekey"), Some("6Le-site"));
        assert_eq!(field(&fields, "pageurl"), Some("https://example.com/login"));
        assert_eq!(field(&fields, "version"), None);
        assert_eq!(field(&fields, "action"), None);
    }

    #[test]
    fn recaptcha_v2_ignores_image_hints() {
        let config = config().with_hints(SolveHints {
            phrase: true,
            ..SolveHints::default()
        });
        let task = CaptchaTask::RecaptchaV2 {
            site_key: "k".to_string(),
            page_url: "u".to_string(),
        };
        assert_eq!(field(&form_fields(&task, &config), "phrase"), None);
    }

    #[test]
    fn recaptcha_v3_declares_version_and_action() {
        let task = CaptchaTask::RecaptchaV3 {
            site_key: "6Le-v3".to_string(),
            page_url: "https://example.com/".to_string(),
            action: "verify".to_string(),
        };
        let fields = form_fields(&task, &config());

        assert_eq!(field(&fields, "method"), Some("userrecaptcha"));
        assert_eq!(field(&fields, "version"), Some("v3"));
        assert_eq!(field(&fields, "action"), Some("verify"));
        assert_eq!(field(&fields, "googlekey"), Some("6Le-v3"));
    }

    #[test]
    fn modality_names() {
        assert_eq!(CaptchaTask::Image { bytes: vec![] }.modality(), "image");
        let debug = format!("{:?}", CaptchaTask::Image { bytes: vec![0; 2048] });
        assert!(debug.contains("2048"));
    }
}
