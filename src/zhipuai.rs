//! ZhipuAI CogView text-to-image client.
//!
//! Docs: https://open.bigmodel.cn/dev/api/image-model/cogview

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::ZhipuConfig;
use crate::constants::{IMAGE_MODEL, ZHIPUAI_API_URL};
use crate::error::WallpaperError;
use crate::generator::ImageGenerator;

/// Request body for POST /api/paas/v4/images/generations
#[derive(Serialize, Debug)]
struct ImagesGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct ImagesGenerateResponse {
    #[serde(default)]
    data: Vec<ImageData>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ImageData {
    url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Talks to the CogView image generation endpoint.
#[derive(Clone, Debug)]
pub struct ZhipuAiClient {
    client: reqwest::Client,
    config: ZhipuConfig,
    endpoint: String,
}

impl ZhipuAiClient {
    /// New client against the public endpoint.
    pub fn new(client: reqwest::Client, config: ZhipuConfig) -> Self {
        Self {
            client,
            config,
            endpoint: ZHIPUAI_API_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

/// Pulls the first image URL out of a generation response body.
fn image_url_from_body(bytes: &[u8]) -> Result<String, WallpaperError> {
    let parsed: ImagesGenerateResponse = serde_json::from_slice(bytes).map_err(|err| {
        WallpaperError::ImageGeneration(format!("返回数据格式不正确: {err}"))
    })?;
    if let Some(err) = parsed.error {
        return Err(WallpaperError::ImageGeneration(format!(
            "{} {}",
            err.code.unwrap_or_default(),
            err.message.unwrap_or_default()
        )));
    }
    parsed
        .data
        .into_iter()
        .next()
        .and_then(|image| image.url)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| WallpaperError::ImageGeneration("返回数据格式不正确".to_string()))
}

#[async_trait::async_trait]
impl ImageGenerator for ZhipuAiClient {
    async fn generate(&self, prompt: &str, width: u32, height: u32) -> Result<String, WallpaperError> {
        let req_body = ImagesGenerateRequest {
            model: IMAGE_MODEL,
            prompt,
            width: Some(width),
            height: Some(height),
        };
        debug!("Calling {} with model {}", self.endpoint, IMAGE_MODEL);

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&req_body)
            .send()
            .await
            .map_err(|err| WallpaperError::ImageGeneration(err.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| WallpaperError::ImageGeneration(err.to_string()))?;
        if !status.is_success() {
            error!(
                "ZhipuAI API error {status}: {}",
                String::from_utf8_lossy(&bytes)
            );
            return Err(WallpaperError::ImageGeneration(format!("HTTP {status}")));
        }

        let url = image_url_from_body(&bytes)?;
        info!("ZhipuAI returned image {url}");
        Ok(url)
    }

    fn name(&self) -> &'static str {
        crate::constants::LLM_NAME
    }
}
