// src/services/images.rs
//! Client for the image-hosting API used to re-host provider avatars.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::common::config::ImageHostConfig;

#[derive(Debug, Error)]
pub enum ImageHostError {
    #[error("image host not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("upload rejected: {0}")]
    UploadFailed(String),
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    data: UploadedImage,
}

#[derive(Debug, Deserialize)]
struct UploadedImage {
    url: String,
}

#[derive(Debug, Clone)]
pub struct ImageHostService {
    client: Client,
    config: Option<ImageHostConfig>,
}

impl ImageHostService {
    pub fn new(client: Client, config: Option<ImageHostConfig>) -> Self {
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Uploads the image at `remote_url` and returns its hosted URL.
    pub async fn rehost(&self, remote_url: &str) -> Result<String, ImageHostError> {
        let config = self.config.as_ref().ok_or(ImageHostError::NotConfigured)?;

        let params = [("key", config.api_key.as_str()), ("image", remote_url)];

        let response = self
            .client
            .post(&config.upload_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ImageHostError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Image upload failed");
            return Err(ImageHostError::UploadFailed(format!("HTTP {}", status)));
        }

        let uploaded = response
            .json::<UploadResponse>()
            .await
            .map_err(|e| ImageHostError::UploadFailed(e.to_string()))?;

        info!(hosted_url = %uploaded.data.url, "Avatar re-hosted");
        Ok(uploaded.data.url)
    }
}
