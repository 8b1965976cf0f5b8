//! Shared constants/setters for things
//!

use std::time::Duration;

/// Style words appended to every generation prompt.
pub const STYLES: [&str; 10] = [
    "水彩风格",
    "油画风格",
    "插画风格",
    "中国画风格",
    "现代艺术风格",
    "极简主义风格",
    "赛博朋克风格",
    "复古风格",
    "可爱卡通风格",
    "写实风格",
];

/// Modifier words used to colour the description.
pub const MODIFIERS: [&str; 10] = [
    "充满活力的",
    "温暖的",
    "清新的",
    "梦幻的",
    "精致的",
    "优雅的",
    "时尚的",
    "创意的",
    "独特的",
    "自然的",
];

/// Width of generated covers, in pixels.
pub const IMAGE_WIDTH: u32 = 957;

/// Height of generated covers, in pixels.
pub const IMAGE_HEIGHT: u32 = 1278;

/// Stored size label for generated covers.
pub const IMAGE_SIZE_LABEL: &str = "957x1278";

/// Owner recorded when a request doesn't say who it's for.
pub const ANONYMOUS_EMAIL: &str = "anonymous@aiwallpaper.com";

/// Name stored against rows produced by the ZhipuAI model.
pub const LLM_NAME: &str = "zhipuai";

/// Image model used for generation.
pub const IMAGE_MODEL: &str = "cogview-3-plus";

/// ZhipuAI image generation endpoint.
pub const ZHIPUAI_API_URL: &str = "https://open.bigmodel.cn/api/paas/v4/images/generations";

/// Prefix for generated object keys in the bucket.
pub const OBJECT_KEY_PREFIX: &str = "wallpapers";

/// Content type used when the source doesn't send one.
pub const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/png";

/// Lifetime of presigned storage URLs, in seconds.
pub const TEMPORARY_URL_EXPIRY_SECONDS: i64 = 3600;

/// How often a pending QR login is checked.
pub const QR_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// How long a QR login is remembered, including a confirmed one nobody
/// has picked up yet.
pub const LOGIN_ATTEMPT_TTL: Duration = Duration::from_secs(300);

/// Seconds between refreshes of the login page.
pub const LOGIN_PAGE_REFRESH_SECONDS: u32 = 2;

/// Default page size for paged listings.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Largest page size a caller can ask for.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Default WeChat cloud-call API base.
pub const WECHAT_API_BASE_URL: &str = "http://api.weixin.qq.com";

/// WeChat QR-connect login endpoint.
pub const WECHAT_QRCONNECT_URL: &str = "https://open.weixin.qq.com/connect/qrconnect";

/// Where WeChat sends the browser after a QR-connect login.
pub const WECHAT_CALLBACK_PATH: &str = "/auth/callback";

/// Idle expiry of browser sessions, in days.
pub const SESSION_EXPIRY_DAYS: i64 = 7;
