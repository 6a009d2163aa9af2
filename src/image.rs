use reqwest::Client;

use crate::error::SolverError;

/// Loads captcha images from a local path or an `http(s)://` URL.
pub struct ImageLoader<'a> {
    client: &'a Client,
}

impl<'a> ImageLoader<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn load(&self, location: &str) -> Result<Vec<u8>, SolverError> {
        let bytes = if is_remote(location) {
            self.fetch(location).await?
        } else {
            tokio::fs::read(location)
                .await
                .map_err(|source| SolverError::ImageRead {
                    path: location.to_string(),
                    source,
                })?
        };

        if bytes.is_empty() {
            return Err(SolverError::EmptyImage(location.to_string()));
        }
        tracing::debug!(location = location, len = bytes.len(), "captcha image loaded");
        Ok(bytes)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SolverError> {
        let fetch_err = |message: String| SolverError::ImageFetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}
