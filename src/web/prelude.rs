pub(crate) use super::login::{SessionUser, current_user};
pub(crate) use crate::db::entities::wallpapers;
pub(crate) use crate::error::{Envelope, WallpaperError};
pub(crate) use crate::web::AppState;
pub(crate) use askama::Template;
pub(crate) use askama_web::WebTemplate;
pub(crate) use axum::Json;
pub(crate) use axum::extract::{Form, Path, Query, State};
pub(crate) use axum::response::{IntoResponse, Redirect, Response};
pub(crate) use serde::{Deserialize, Serialize};
pub(crate) use std::sync::Arc;
pub(crate) use tower_sessions::Session;
pub(crate) use tracing::{debug, error, info, warn};
