//! CLI parser
use clap::Parser;
use std::num::NonZeroU16;

#[derive(Parser, Debug, Clone)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "AIWALLPAPER_DEBUG")]
    /// Enable debug logging. Env: AIWALLPAPER_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "3000", env = "AIWALLPAPER_PORT")]
    /// http listener, defaults to `3000`.
    /// Env: AIWALLPAPER_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "AIWALLPAPER_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: AIWALLPAPER_LISTEN_ADDRESS
    pub listen_address: String,
    #[clap(
        long,
        short,
        default_value = "http://localhost:3000",
        env = "AIWALLPAPER_BASE_URL"
    )]
    /// Public base URL of the site, used to build login redirects.
    /// Env: AIWALLPAPER_BASE_URL
    pub base_url: String,

    #[clap(
        long,
        short,
        default_value = "aiwallpaper.sqlite",
        env = "AIWALLPAPER_DATABASE_PATH"
    )]
    /// Path to the database file, eg `/data/aiwallpaper.sqlite`.
    /// Env: AIWALLPAPER_DATABASE_PATH
    pub database_path: String,

    #[clap(long, env = "ZHIPUAI_API_KEY", hide_env_values = true)]
    /// ZhipuAI API key. Env: ZHIPUAI_API_KEY
    pub zhipuai_api_key: Option<String>,

    #[clap(long, env = "COS_SECRET_ID", hide_env_values = true)]
    /// Tencent COS secret id. Env: COS_SECRET_ID
    pub cos_secret_id: Option<String>,
    #[clap(long, env = "COS_SECRET_KEY", hide_env_values = true)]
    /// Tencent COS secret key. Env: COS_SECRET_KEY
    pub cos_secret_key: Option<String>,
    #[clap(long, env = "COS_BUCKET")]
    /// Tencent COS bucket, eg `covers-1250000000`. Env: COS_BUCKET
    pub cos_bucket: Option<String>,
    #[clap(long, env = "COS_REGION")]
    /// Tencent COS region, eg `ap-shanghai`. Env: COS_REGION
    pub cos_region: Option<String>,

    #[clap(long, env = "AUTHING_APP_ID")]
    /// Authing application id used for QR logins. Env: AUTHING_APP_ID
    pub authing_app_id: Option<String>,
    #[clap(long, env = "AUTHING_APP_HOST")]
    /// Authing application host, eg `https://example.authing.cn`. Env: AUTHING_APP_HOST
    pub authing_app_host: Option<String>,

    #[clap(long, env = "WX_APP_ID")]
    /// WeChat application id. Env: WX_APP_ID
    pub wx_app_id: Option<String>,
    #[clap(
        long,
        default_value = crate::constants::WECHAT_API_BASE_URL,
        env = "WX_API_BASE_URL"
    )]
    /// WeChat cloud-call API base. Env: WX_API_BASE_URL
    pub wx_api_base_url: String,
    #[clap(long, env = "WX_CLOUD_BASE_URL")]
    /// Public domain of the WeChat cloud hosting service; login redirects
    /// use it instead of `base_url` when set. Env: WX_CLOUD_BASE_URL
    pub wx_cloud_base_url: Option<String>,
}
