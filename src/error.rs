//! Error handling

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::{error, info};

/// JSON body every API endpoint answers with.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    /// `0` on success, `-1` on failure.
    pub code: i32,
    /// Human readable outcome.
    pub message: String,
    /// Payload, `null` on failure.
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    /// Successful envelope wrapping `data`.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            code: 0,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    /// Failure envelope with no payload.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            code: -1,
            message: message.into(),
            data: None,
        }
    }
}

/// definitions for the aiwallpaper application.
#[derive(Debug)]
pub enum WallpaperError {
    /// When you didn't do the right thing
    BadRequest(String),
    /// Missing or invalid session
    Unauthorized,
    /// Logged in, but not allowed to touch this record
    Forbidden,
    /// When DB operations fail
    DatabaseError(sea_orm::DbErr),
    /// When a requested resource is not found
    NotFound(String),
    /// The text-to-image API failed or returned nonsense
    ImageGeneration(String),
    /// Object storage failed
    Storage(String),
    /// Some other remote API failed
    Upstream(String),
    /// A feature was used without its credentials being configured
    NotConfigured(&'static str),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl std::fmt::Display for WallpaperError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(message) => write!(f, "{message}"),
            Self::Unauthorized => write!(f, "未登录或登录已失效"),
            Self::Forbidden => write!(f, "无权操作该记录"),
            Self::DatabaseError(err) => write!(f, "操作失败: {err}"),
            Self::NotFound(what) => write!(f, "未找到: {what}"),
            Self::ImageGeneration(message) => write!(f, "文生图 API 调用失败: {message}"),
            Self::Storage(message) => write!(f, "操作失败: {message}"),
            Self::Upstream(message) => write!(f, "请求失败：{message}"),
            Self::NotConfigured(what) => write!(f, "{what} 未配置"),
            Self::InternalServerError(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for WallpaperError {}

impl WallpaperError {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DatabaseError(_)
            | Self::ImageGeneration(_)
            | Self::Storage(_)
            | Self::Upstream(_)
            | Self::NotConfigured(_)
            | Self::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sea_orm::DbErr> for WallpaperError {
    fn from(err: sea_orm::DbErr) -> Self {
        WallpaperError::DatabaseError(err)
    }
}

impl From<reqwest::Error> for WallpaperError {
    fn from(err: reqwest::Error) -> Self {
        WallpaperError::Upstream(err.to_string())
    }
}

impl From<serde_json::Error> for WallpaperError {
    fn from(err: serde_json::Error) -> Self {
        WallpaperError::InternalServerError(err.to_string())
    }
}

impl From<std::io::Error> for WallpaperError {
    fn from(err: std::io::Error) -> Self {
        WallpaperError::InternalServerError(err.to_string())
    }
}

impl From<axum::http::Error> for WallpaperError {
    fn from(err: axum::http::Error) -> Self {
        WallpaperError::InternalServerError(err.to_string())
    }
}

impl From<url::ParseError> for WallpaperError {
    fn from(err: url::ParseError) -> Self {
        WallpaperError::InternalServerError(err.to_string())
    }
}

impl From<tower_sessions::session::Error> for WallpaperError {
    fn from(err: tower_sessions::session::Error) -> Self {
        WallpaperError::InternalServerError(err.to_string())
    }
}

impl IntoResponse for WallpaperError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        match &self {
            WallpaperError::BadRequest(message) => info!("Bad request received: {message}"),
            WallpaperError::Unauthorized => info!("Unauthorized request received"),
            WallpaperError::Forbidden => info!("Forbidden request received"),
            WallpaperError::NotFound(what) => info!("404 {what}"),
            WallpaperError::DatabaseError(err) => error!("Database error: {}", err),
            other => error!("Request failed: {}", other),
        }
        (status, Json(Envelope::failure(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_failures_are_server_errors() {
        assert_eq!(
            WallpaperError::ImageGeneration("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WallpaperError::Storage("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WallpaperError::BadRequest("nope".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn messages_carry_the_cause() {
        let err = WallpaperError::ImageGeneration("timeout".to_string());
        assert_eq!(err.to_string(), "文生图 API 调用失败: timeout");
        let err = WallpaperError::Storage("403 Forbidden".to_string());
        assert_eq!(err.to_string(), "操作失败: 403 Forbidden");
    }

    #[test]
    fn database_failures_read_like_other_failures() {
        let err = WallpaperError::from(sea_orm::DbErr::Custom("disk full".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let message = err.to_string();
        assert!(message.starts_with("操作失败: "));
        assert!(message.contains("disk full"));
    }
}
