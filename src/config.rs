//! Config handling

use tracing::log::LevelFilter;
use tracing::{info, warn};

use crate::cli::CliOptions;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info)
            .with_module_level("sqlx", LevelFilter::Warn);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Credentials for the text-to-image API.
#[derive(Clone)]
pub struct ZhipuConfig {
    /// Bearer token for open.bigmodel.cn
    pub api_key: String,
}

impl std::fmt::Debug for ZhipuConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZhipuConfig")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Tencent COS bucket and credentials.
#[derive(Clone)]
pub struct CosConfig {
    /// Secret id, sent as `q-ak`
    pub secret_id: String,
    /// Secret key, only ever used to sign
    pub secret_key: String,
    /// Bucket name including the app id suffix
    pub bucket: String,
    /// Region, eg `ap-shanghai`
    pub region: String,
}

impl CosConfig {
    /// Host serving the bucket.
    pub fn host(&self) -> String {
        format!("{}.cos.{}.myqcloud.com", self.bucket, self.region)
    }
}

impl std::fmt::Debug for CosConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosConfig")
            .field("secret_id", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .finish()
    }
}

/// Authing application used for QR-code logins.
#[derive(Clone, Debug)]
pub struct AuthingConfig {
    /// Application id
    pub app_id: String,
    /// Application host, without a trailing slash
    pub app_host: String,
}

/// WeChat application settings.
#[derive(Clone, Debug)]
pub struct WechatConfig {
    /// Application id, used in QR-connect URLs
    pub app_id: String,
    /// Cloud-call API base
    pub api_base_url: String,
    /// Public base URL WeChat redirects back to
    pub public_base_url: String,
}

/// Everything the server needs to talk to the outside world.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Public site URL
    pub base_url: String,
    /// Image generation, if configured
    pub zhipu: Option<ZhipuConfig>,
    /// Object storage, if fully configured
    pub cos: Option<CosConfig>,
    /// QR login, if configured
    pub authing: Option<AuthingConfig>,
    /// WeChat login and payment, if configured
    pub wechat: Option<WechatConfig>,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Settings {
    /// Builds settings from parsed CLI options, logging which integrations are off.
    pub fn from_cli(cli: &CliOptions) -> Self {
        let base_url = cli.base_url.trim_end_matches('/').to_string();

        let zhipu = non_empty(cli.zhipuai_api_key.as_ref()).map(|api_key| ZhipuConfig { api_key });
        if zhipu.is_none() {
            warn!("ZHIPUAI_API_KEY is not set, image generation is disabled");
        }

        let cos = match (
            non_empty(cli.cos_secret_id.as_ref()),
            non_empty(cli.cos_secret_key.as_ref()),
            non_empty(cli.cos_bucket.as_ref()),
            non_empty(cli.cos_region.as_ref()),
        ) {
            (Some(secret_id), Some(secret_key), Some(bucket), Some(region)) => Some(CosConfig {
                secret_id,
                secret_key,
                bucket,
                region,
            }),
            (secret_id, secret_key, bucket, region) => {
                warn!(
                    "COS config incomplete (secret_id set: {}, secret_key set: {}, bucket: {:?}, region: {:?}), uploads are disabled",
                    secret_id.is_some(),
                    secret_key.is_some(),
                    bucket,
                    region
                );
                None
            }
        };
        if let Some(cos) = &cos {
            info!("COS bucket {} in {}", cos.bucket, cos.region);
        }

        let authing = match (
            non_empty(cli.authing_app_id.as_ref()),
            non_empty(cli.authing_app_host.as_ref()),
        ) {
            (Some(app_id), Some(app_host)) => Some(AuthingConfig {
                app_id,
                app_host: app_host.trim_end_matches('/').to_string(),
            }),
            _ => {
                warn!("Authing is not configured, QR login is disabled");
                None
            }
        };

        let wechat = non_empty(cli.wx_app_id.as_ref()).map(|app_id| WechatConfig {
            app_id,
            api_base_url: cli.wx_api_base_url.trim_end_matches('/').to_string(),
            public_base_url: non_empty(cli.wx_cloud_base_url.as_ref())
                .unwrap_or_else(|| base_url.clone())
                .trim_end_matches('/')
                .to_string(),
        });
        if wechat.is_none() {
            warn!("WX_APP_ID is not set, WeChat login and payments are disabled");
        }

        Self {
            base_url,
            zhipu,
            cos,
            authing,
            wechat,
        }
    }
}
