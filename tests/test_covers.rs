use aiwallpaper::cli::CliOptions;
use aiwallpaper::config::{CosConfig, Settings, setup_logging};
use aiwallpaper::constants::{MODIFIERS, STYLES, TEMPORARY_URL_EXPIRY_SECONDS};
use aiwallpaper::cos::CosClient;
use aiwallpaper::prompt::{PromptParts, new_object_key};
use aiwallpaper::wechat::qr_login_url;
use clap::Parser;

#[test]
fn test_random_prompt_uses_known_words() {
    let _ = setup_logging(true);

    let parts = PromptParts::random("  一条金色的锦鲤 ");
    assert_eq!(parts.description, "一条金色的锦鲤");
    assert!(STYLES.contains(&parts.style.as_str()));
    assert!(MODIFIERS.contains(&parts.modifier.as_str()));
    assert_eq!(parts.seed.len(), 8);
    assert!(parts.prompt.starts_with(&format!("生成一个{}的一条金色的锦鲤", parts.modifier)));
    assert!(parts.prompt.ends_with(&format!("随机种子:{}", parts.seed)));

    let params: serde_json::Value =
        serde_json::from_str(&parts.llm_params()).expect("llm params are JSON");
    assert_eq!(params["style"], parts.style.as_str());
}

#[test]
fn test_object_keys_are_unique_pngs() {
    let first = new_object_key("水彩风格");
    let second = new_object_key("水彩风格");
    assert!(first.starts_with("wallpapers/"));
    assert!(first.ends_with("-.png"));
    assert_ne!(first, second);
}

#[test]
fn test_presigned_urls_point_at_the_bucket() {
    let client = CosClient::new(
        reqwest::Client::new(),
        CosConfig {
            secret_id: "AKIDexample".to_string(),
            secret_key: "secret".to_string(),
            bucket: "covers-1250000000".to_string(),
            region: "ap-shanghai".to_string(),
        },
    );
    assert_eq!(
        client.public_url("wallpapers/a.png"),
        "https://covers-1250000000.cos.ap-shanghai.myqcloud.com/wallpapers/a.png"
    );
    let url = client
        .temporary_url("wallpapers/a.png", TEMPORARY_URL_EXPIRY_SECONDS)
        .expect("presign");
    assert!(url.starts_with("https://covers-1250000000.cos.ap-shanghai.myqcloud.com/wallpapers/a.png?"));
    assert!(url.contains("q-sign-algorithm=sha1"));
    assert!(url.contains("q-ak=AKIDexample"));
    assert!(!url.contains("secret&"));
}

#[test]
fn test_wechat_login_redirects_to_cloud_domain() {
    let cli = CliOptions::parse_from([
        "aiwallpaper",
        "--wx-app-id",
        "wx123",
        "--wx-cloud-base-url",
        "https://cloud.example.org/",
    ]);
    let settings = Settings::from_cli(&cli);
    let wechat = settings.wechat.expect("wechat configured");
    assert_eq!(wechat.public_base_url, "https://cloud.example.org");

    let url = qr_login_url(&wechat.app_id, &wechat.public_base_url, "/auth/callback", "s1")
        .expect("login url");
    assert!(url.contains("appid=wx123"));
    assert!(url.contains("redirect_uri=https%3A%2F%2Fcloud.example.org%2Fauth%2Fcallback"));
    assert!(url.ends_with("#wechat_redirect"));
}
