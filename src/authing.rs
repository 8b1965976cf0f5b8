//! Authing QR-code login client.
//!
//! The flow: ask Authing for a QR code, poll its scan status until the user
//! confirms on their phone, then trade the ticket for the user's profile.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AuthingConfig;
use crate::error::WallpaperError;

const APP_ID_HEADER: &str = "x-authing-app-id";
const SCENE: &str = "APP_AUTH";

/// A freshly generated login QR code.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct QrCode {
    /// Image URL of the QR code
    pub url: String,
    /// Handle used to poll the code
    pub random: String,
}

/// Raw result of one status check.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct QrCheck {
    /// Authing's status code
    pub status: i32,
    /// Present once the user has confirmed
    #[serde(default)]
    pub ticket: Option<String>,
}

/// Profile returned once a login is confirmed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthingUser {
    /// Authing user id
    pub id: String,
    /// Login name
    #[serde(default)]
    pub username: Option<String>,
    /// Display name
    #[serde(default)]
    pub nickname: Option<String>,
    /// Real name
    #[serde(default)]
    pub name: Option<String>,
    /// Email, if known
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar URL
    #[serde(default)]
    pub photo: Option<String>,
}

/// Where a QR login has got to, as shown to the browser.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QrScanStatus {
    /// Waiting for a scan
    Pending,
    /// Scanned, waiting for confirmation on the phone
    Scanned,
    /// Confirmed
    Confirmed,
    /// Cancelled on the phone or timed out
    Expired,
    /// Checking the status failed
    Failed,
}

impl QrScanStatus {
    /// Maps Authing's numeric status.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Scanned,
            2 => Self::Confirmed,
            3 | -1 => Self::Expired,
            _ => Self::Pending,
        }
    }

    /// True once polling should stop.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Expired | Self::Failed)
    }

    /// Text shown under the QR code.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "扫描二维码完成登录",
            Self::Scanned => "已扫码，请在手机上确认",
            Self::Confirmed => "登录成功",
            Self::Expired => "二维码已失效，请刷新重试",
            Self::Failed => "登录失败，请刷新重试",
        }
    }
}

impl std::fmt::Display for QrScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Pending => "PENDING",
            Self::Scanned => "SCANNED",
            Self::Confirmed => "CONFIRMED",
            Self::Expired => "EXPIRED",
            Self::Failed => "FAILED",
        };
        write!(f, "{text}")
    }
}

/// Anything that can run a QR-code login.
#[async_trait::async_trait]
pub trait QrLoginProvider: Send + Sync {
    /// Generates a new QR code.
    async fn gene_code(&self) -> Result<QrCode, WallpaperError>;
    /// Checks whether the code has been scanned or confirmed.
    async fn check_status(&self, random: &str) -> Result<QrCheck, WallpaperError>;
    /// Trades a confirmation ticket for the user's profile.
    async fn exchange_user_info(&self, ticket: &str) -> Result<AuthingUser, WallpaperError>;
}

#[derive(Debug, Deserialize)]
struct AuthingResponse<T> {
    code: i32,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

fn unwrap_response<T>(response: AuthingResponse<T>) -> Result<T, WallpaperError> {
    if response.code != 200 {
        return Err(WallpaperError::Upstream(format!(
            "Authing {}: {}",
            response.code,
            response.message.unwrap_or_default()
        )));
    }
    response
        .data
        .ok_or_else(|| WallpaperError::Upstream("Authing response missing data".to_string()))
}

/// Authing HTTP client.
#[derive(Clone, Debug)]
pub struct AuthingClient {
    client: reqwest::Client,
    config: AuthingConfig,
}

impl AuthingClient {
    /// Client for one Authing application.
    pub fn new(client: reqwest::Client, config: AuthingConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.app_host, path)
    }

    async fn read<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, WallpaperError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(WallpaperError::Upstream(format!("Authing HTTP {status}")));
        }
        let parsed: AuthingResponse<T> = resp.json().await?;
        unwrap_response(parsed)
    }
}

#[async_trait::async_trait]
impl QrLoginProvider for AuthingClient {
    async fn gene_code(&self) -> Result<QrCode, WallpaperError> {
        let resp = self
            .client
            .post(self.url("/api/v2/qrcode/gene"))
            .header(APP_ID_HEADER, &self.config.app_id)
            .json(&serde_json::json!({ "scene": SCENE }))
            .send()
            .await?;
        let code: QrCode = Self::read(resp).await?;
        debug!("Generated QR code {}", code.random);
        Ok(code)
    }

    async fn check_status(&self, random: &str) -> Result<QrCheck, WallpaperError> {
        let mut url = url::Url::parse(&self.url("/api/v2/qrcode/check"))?;
        url.query_pairs_mut().append_pair("random", random);
        let resp = self
            .client
            .get(url)
            .header(APP_ID_HEADER, &self.config.app_id)
            .send()
            .await?;
        Self::read(resp).await
    }

    async fn exchange_user_info(&self, ticket: &str) -> Result<AuthingUser, WallpaperError> {
        let resp = self
            .client
            .post(self.url("/api/v2/qrcode/userinfo"))
            .header(APP_ID_HEADER, &self.config.app_id)
            .json(&serde_json::json!({ "ticket": ticket }))
            .send()
            .await?;
        Self::read(resp).await
    }
}
