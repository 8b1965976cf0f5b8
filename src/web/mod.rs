//! Web server

use std::num::NonZeroU16;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tracing::{error, info};

use crate::authing::{AuthingClient, QrLoginProvider};
use crate::config::Settings;
use crate::constants::{QR_POLL_INTERVAL, SESSION_EXPIRY_DAYS, WECHAT_CALLBACK_PATH};
use crate::cos::CosClient;
use crate::generator::{ImageGenerator, ObjectStore, WallpaperPipeline};
use crate::wechat::WechatClient;
use crate::zhipuai::ZhipuAiClient;

mod api;
mod csrf;
mod flash;
mod login;
mod pay;
pub(crate) mod prelude;
mod views;

use api::{
    delete_wallpaper_handler, gen_wallpaper_handler, get_wallpaper_by_id_handler,
    get_wallpaper_handler, public_wallpapers_handler, update_wallpaper_handler,
    user_wallpapers_handler,
};
use login::{
    LoginRegistry, login_page, login_status_handler, logout_handler, wechat_callback_handler,
    wechat_login_handler,
};
use pay::{create_order_handler, query_order_handler};
use views::{generate_form_handler, root_handler};

#[derive(Clone)]
pub(crate) struct AppState {
    db: DatabaseConnection,
    pipeline: WallpaperPipeline,
    qr_login: Option<Arc<dyn QrLoginProvider>>,
    wechat: Option<Arc<WechatClient>>,
    logins: LoginRegistry,
    poll_interval: Duration,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pipeline", &self.pipeline)
            .field("qr_login", &self.qr_login.is_some())
            .field("wechat", &self.wechat.is_some())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl AppState {
    fn new(
        db: DatabaseConnection,
        pipeline: WallpaperPipeline,
        qr_login: Option<Arc<dyn QrLoginProvider>>,
        wechat: Option<Arc<WechatClient>>,
    ) -> Self {
        Self {
            db,
            pipeline,
            qr_login,
            wechat,
            logins: LoginRegistry::default(),
            poll_interval: QR_POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Builds the remote clients for whatever is configured.
    fn from_settings(settings: Settings, db: DatabaseConnection) -> Self {
        let client = reqwest::Client::new();

        let generator = settings
            .zhipu
            .map(|config| Arc::new(ZhipuAiClient::new(client.clone(), config)) as Arc<dyn ImageGenerator>);
        let store = settings
            .cos
            .map(|config| Arc::new(CosClient::new(client.clone(), config)) as Arc<dyn ObjectStore>);
        let qr_login = settings
            .authing
            .map(|config| Arc::new(AuthingClient::new(client.clone(), config)) as Arc<dyn QrLoginProvider>);
        let wechat = settings
            .wechat
            .map(|config| Arc::new(WechatClient::new(client.clone(), config)));

        Self::new(db, WallpaperPipeline::new(generator, store), qr_login, wechat)
    }
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/generate", post(generate_form_handler))
        .route("/static/styles.css", get(styles_handler))
        .route("/login", get(login_page))
        .route("/logout", post(logout_handler))
        .route("/api/auth/status", get(login_status_handler))
        .route("/auth/wechat", get(wechat_login_handler))
        .route(WECHAT_CALLBACK_PATH, get(wechat_callback_handler))
        .route("/api/gen_wallpaper", post(gen_wallpaper_handler))
        .route("/api/get_wallpaper", get(get_wallpaper_handler))
        .route("/api/wallpapers/public", get(public_wallpapers_handler))
        .route("/api/wallpapers/user", get(user_wallpapers_handler))
        .route(
            "/api/wallpapers/{id}",
            get(get_wallpaper_by_id_handler)
                .put(update_wallpaper_handler)
                .delete(delete_wallpaper_handler),
        )
        .route("/api/pay/orders", post(create_order_handler))
        .route("/api/pay/orders/{order_id}", get(query_order_handler))
}

fn build_app(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(
            SESSION_EXPIRY_DAYS,
        )));
    create_router()
        .with_state(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
}

async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    ([(CONTENT_TYPE, "text/css")], STYLES)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
    }
    info!("Shutting down");
}

/// Starts the web server
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    settings: Settings,
    db: DatabaseConnection,
) -> Result<(), anyhow::Error> {
    let base_url = settings.base_url.clone();
    let app = build_app(AppState::from_settings(settings, db));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{} (public URL {})", addr, base_url);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", err);
    }
    Ok(())
}
