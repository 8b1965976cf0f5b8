//! Tencent COS object storage client.
//!
//! Requests are signed with the COS `q-sign` scheme (HMAC-SHA1), see
//! https://cloud.tencent.com/document/product/436/7778

use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use sha1::{Digest, Sha1};
use tracing::{debug, error, info};
use url::Url;

use crate::config::CosConfig;
use crate::constants::DEFAULT_IMAGE_CONTENT_TYPE;
use crate::error::WallpaperError;
use crate::generator::ObjectStore;

type HmacSha1 = Hmac<Sha1>;

/// Allowed clock skew at the start of a request signature, in seconds.
const SIGN_SKEW_SECONDS: i64 = 60;
/// Lifetime of a request signature, in seconds.
const SIGN_LIFETIME_SECONDS: i64 = 900;

fn hmac_sha1_hex(key: &[u8], message: &str) -> Result<String, WallpaperError> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|err| WallpaperError::InternalServerError(err.to_string()))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn sha1_hex(message: &str) -> String {
    hex::encode(Sha1::digest(message.as_bytes()))
}

/// Lowercases and encodes the pairs, sorts them, and returns
/// `(key list, key=value list)`.
fn canonical_pairs(pairs: &[(&str, &str)]) -> (String, String) {
    let mut encoded: Vec<(String, String)> = pairs
        .iter()
        .map(|(key, value)| {
            (
                urlencoding::encode(&key.to_lowercase()).into_owned(),
                urlencoding::encode(value).into_owned(),
            )
        })
        .collect();
    encoded.sort();
    let keys = encoded
        .iter()
        .map(|(key, _)| key.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let joined = encoded
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    (keys, joined)
}

/// The pieces of a request that go into a signature.
#[derive(Debug)]
pub struct SignRequest<'a> {
    /// HTTP method, any case
    pub method: &'a str,
    /// Request path starting with `/`
    pub path: &'a str,
    /// Query parameters to sign
    pub params: &'a [(&'a str, &'a str)],
    /// Headers to sign
    pub headers: &'a [(&'a str, &'a str)],
    /// Signature validity start, unix seconds
    pub start: i64,
    /// Signature validity end, unix seconds
    pub end: i64,
}

/// Builds the `Authorization` value for a request.
pub fn sign(
    secret_id: &str,
    secret_key: &str,
    request: &SignRequest<'_>,
) -> Result<String, WallpaperError> {
    let key_time = format!("{};{}", request.start, request.end);
    let sign_key = hmac_sha1_hex(secret_key.as_bytes(), &key_time)?;

    let (param_list, http_parameters) = canonical_pairs(request.params);
    let (header_list, http_headers) = canonical_pairs(request.headers);
    let http_string = format!(
        "{}\n{}\n{}\n{}\n",
        request.method.to_lowercase(),
        request.path,
        http_parameters,
        http_headers
    );
    let string_to_sign = format!("sha1\n{key_time}\n{}\n", sha1_hex(&http_string));
    let signature = hmac_sha1_hex(sign_key.as_bytes(), &string_to_sign)?;

    Ok(format!(
        "q-sign-algorithm=sha1&q-ak={secret_id}&q-sign-time={key_time}&q-key-time={key_time}&q-header-list={header_list}&q-url-param-list={param_list}&q-signature={signature}"
    ))
}

/// Uploads to and deletes from a single COS bucket.
#[derive(Clone, Debug)]
pub struct CosClient {
    client: reqwest::Client,
    config: CosConfig,
    endpoint: String,
}

impl CosClient {
    /// Client for the configured bucket.
    pub fn new(client: reqwest::Client, config: CosConfig) -> Self {
        let endpoint = format!("https://{}", config.host());
        Self {
            client,
            config,
            endpoint,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    /// Permanent URL of an object.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.endpoint, key.trim_start_matches('/'))
    }

    fn authorization(&self, method: &str, key: &str, start: i64, end: i64) -> Result<String, WallpaperError> {
        let path = format!("/{}", key.trim_start_matches('/'));
        let host = self.config.host();
        sign(
            &self.config.secret_id,
            &self.config.secret_key,
            &SignRequest {
                method,
                path: &path,
                params: &[],
                headers: &[("host", host.as_str())],
                start,
                end,
            },
        )
    }

    fn request_authorization(&self, method: &str, key: &str) -> Result<String, WallpaperError> {
        let now = chrono::Utc::now().timestamp();
        self.authorization(
            method,
            key,
            now - SIGN_SKEW_SECONDS,
            now + SIGN_LIFETIME_SECONDS,
        )
    }

    /// Presigned GET URL valid for `expires_in` seconds.
    pub fn temporary_url(&self, key: &str, expires_in: i64) -> Result<String, WallpaperError> {
        let now = chrono::Utc::now().timestamp();
        let authorization = self.authorization("get", key, now, now + expires_in)?;
        let mut url = Url::parse(&self.public_url(key))?;
        {
            let mut query = url.query_pairs_mut();
            for pair in authorization.split('&') {
                if let Some((name, value)) = pair.split_once('=') {
                    query.append_pair(name, value);
                }
            }
        }
        Ok(url.to_string())
    }

    /// PUTs bytes to `key` and returns the permanent URL.
    pub async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> Result<String, WallpaperError> {
        let url = self.public_url(key);
        let size = bytes.len();
        debug!("Uploading {size} bytes to {url} as {content_type}");

        let resp = self
            .client
            .put(&url)
            .header(AUTHORIZATION, self.request_authorization("put", key)?)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|err| WallpaperError::Storage(err.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("COS upload of {key} failed with {status}: {body}");
            return Err(WallpaperError::Storage(format!("COS 上传失败: HTTP {status}")));
        }
        info!("Uploaded {key} ({size} bytes)");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl ObjectStore for CosClient {
    async fn upload_from_url(&self, source_url: &str, key: &str) -> Result<String, WallpaperError> {
        debug!("Fetching {source_url} for {key}");
        let resp = self
            .client
            .get(source_url)
            .send()
            .await
            .map_err(|err| WallpaperError::Storage(format!("获取图片失败: {err}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(WallpaperError::Storage(format!("获取图片失败: HTTP {status}")));
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .unwrap_or_else(|| DEFAULT_IMAGE_CONTENT_TYPE.to_string());
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| WallpaperError::Storage(format!("获取图片失败: {err}")))?;

        self.upload_bytes(bytes.to_vec(), key, &content_type).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), WallpaperError> {
        let resp = self
            .client
            .delete(self.public_url(key))
            .header(
                AUTHORIZATION,
                self.request_authorization("delete", key)?,
            )
            .send()
            .await
            .map_err(|err| WallpaperError::Storage(err.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(WallpaperError::Storage(format!("COS 删除失败: HTTP {status}")));
        }
        info!("Deleted {key}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::body::{Body, Bytes};
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, HeaderName, Method, StatusCode};
    use axum::routing::{get, put};

    use super::*;
    use crate::generator::testing::serve;

    #[derive(Clone, Debug)]
    struct Received {
        method: Method,
        name: String,
        authorization: Option<String>,
        content_type: Option<String>,
        size: usize,
    }

    type Log = Arc<Mutex<Vec<Received>>>;

    async fn record_object(
        State(log): State<Log>,
        method: Method,
        Path(name): Path<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> StatusCode {
        let header = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };
        let received = Received {
            method: method.clone(),
            authorization: header(AUTHORIZATION),
            content_type: header(CONTENT_TYPE),
            size: body.len(),
            name: name.clone(),
        };
        if let Ok(mut log) = log.lock() {
            log.push(received);
        }
        match (method, name.as_str()) {
            (_, "forbidden.png") => StatusCode::FORBIDDEN,
            (Method::DELETE, _) => StatusCode::NO_CONTENT,
            _ => StatusCode::OK,
        }
    }

    /// A fake bucket under `/wallpapers/` plus image sources to copy from.
    async fn fake_bucket() -> (CosClient, String, Log) {
        let log = Log::default();
        let app = Router::new()
            .route("/source.png", get(|| async { Body::from(vec![7u8; 64]) }))
            .route(
                "/typed.jpg",
                get(|| async { ([(CONTENT_TYPE, "image/jpeg")], vec![1u8; 8]) }),
            )
            .route("/missing.png", get(|| async { StatusCode::NOT_FOUND }))
            .route(
                "/wallpapers/{name}",
                put(record_object).delete(record_object),
            )
            .with_state(log.clone());
        let base = serve(app).await;
        (client().with_endpoint(&base), base, log)
    }

    fn received(log: &Log) -> Vec<Received> {
        log.lock().expect("lock").clone()
    }

    #[tokio::test]
    async fn upload_from_url_copies_the_image() {
        let (cos, base, log) = fake_bucket().await;
        let url = cos
            .upload_from_url(&format!("{base}/source.png"), "wallpapers/a.png")
            .await
            .expect("upload");
        assert_eq!(url, format!("{base}/wallpapers/a.png"));

        let received = received(&log);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].method, Method::PUT);
        assert_eq!(received[0].name, "a.png");
        assert_eq!(received[0].size, 64);
        assert_eq!(received[0].content_type.as_deref(), Some("image/png"));
        assert!(received[0]
            .authorization
            .as_deref()
            .is_some_and(|auth| auth.starts_with("q-sign-algorithm=sha1&q-ak=AKIDexample&")));
    }

    #[tokio::test]
    async fn upload_keeps_the_source_content_type() {
        let (cos, base, log) = fake_bucket().await;
        cos.upload_from_url(&format!("{base}/typed.jpg"), "wallpapers/b.jpg")
            .await
            .expect("upload");
        assert_eq!(received(&log)[0].content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn failed_source_fetch_uploads_nothing() {
        let (cos, base, log) = fake_bucket().await;
        let err = cos
            .upload_from_url(&format!("{base}/missing.png"), "wallpapers/c.png")
            .await
            .expect_err("source is missing");
        assert!(matches!(err, WallpaperError::Storage(_)));
        assert!(err.to_string().contains("404"));
        assert!(received(&log).is_empty());
    }

    #[tokio::test]
    async fn rejected_upload_is_an_error() {
        let (cos, base, _) = fake_bucket().await;
        let err = cos
            .upload_from_url(&format!("{base}/source.png"), "wallpapers/forbidden.png")
            .await
            .expect_err("bucket refuses");
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn delete_object_signs_the_request() {
        let (cos, _, log) = fake_bucket().await;
        cos.delete_object("wallpapers/d.png").await.expect("delete");
        let received = received(&log);
        assert_eq!(received[0].method, Method::DELETE);
        assert!(received[0]
            .authorization
            .as_deref()
            .is_some_and(|auth| auth.starts_with("q-sign-algorithm=sha1")));

        assert!(cos.delete_object("wallpapers/forbidden.png").await.is_err());
    }

    fn client() -> CosClient {
        CosClient::new(
            reqwest::Client::new(),
            CosConfig {
                secret_id: "AKIDexample".to_string(),
                secret_key: "secret".to_string(),
                bucket: "covers-1250000000".to_string(),
                region: "ap-shanghai".to_string(),
            },
        )
    }

    fn field<'a>(authorization: &'a str, name: &str) -> Option<&'a str> {
        authorization
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    #[test]
    fn canonical_pairs_encode_outside_unreserved() {
        let (keys, joined) = canonical_pairs(&[("x-cos-meta-tag", "a b/c;d~图")]);
        assert_eq!(keys, "x-cos-meta-tag");
        assert_eq!(joined, "x-cos-meta-tag=a%20b%2Fc%3Bd~%E5%9B%BE");
    }

    #[test]
    fn canonical_pairs_sort_and_lowercase() {
        let (keys, joined) = canonical_pairs(&[("X-Cos-Acl", "private"), ("Host", "a.b")]);
        assert_eq!(keys, "host;x-cos-acl");
        assert_eq!(joined, "host=a.b&x-cos-acl=private");
    }

    #[test]
    fn signature_has_every_field() {
        let request = SignRequest {
            method: "PUT",
            path: "/wallpapers/1-a-.png",
            params: &[],
            headers: &[("host", "covers-1250000000.cos.ap-shanghai.myqcloud.com")],
            start: 1_700_000_000,
            end: 1_700_000_900,
        };
        let auth = sign("AKIDexample", "secret", &request).expect("sign");
        assert_eq!(field(&auth, "q-sign-algorithm"), Some("sha1"));
        assert_eq!(field(&auth, "q-ak"), Some("AKIDexample"));
        assert_eq!(field(&auth, "q-sign-time"), Some("1700000000;1700000900"));
        assert_eq!(field(&auth, "q-key-time"), Some("1700000000;1700000900"));
        assert_eq!(field(&auth, "q-header-list"), Some("host"));
        assert_eq!(field(&auth, "q-url-param-list"), Some(""));
        let signature = field(&auth, "q-signature").expect("signature");
        assert_eq!(signature.len(), 40);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));

        let again = sign("AKIDexample", "secret", &request).expect("sign");
        assert_eq!(auth, again);
    }

    #[test]
    fn signature_depends_on_method_and_key() {
        let base = SignRequest {
            method: "put",
            path: "/a.png",
            params: &[],
            headers: &[],
            start: 1,
            end: 2,
        };
        let other_method = SignRequest {
            method: "delete",
            ..base
        };
        let a = sign("id", "secret", &base).expect("sign");
        let b = sign("id", "secret", &other_method).expect("sign");
        let c = sign("id", "other", &base).expect("sign");
        assert_ne!(field(&a, "q-signature"), field(&b, "q-signature"));
        assert_ne!(field(&a, "q-signature"), field(&c, "q-signature"));
    }

    #[test]
    fn public_url_uses_bucket_host() {
        assert_eq!(
            client().public_url("wallpapers/1-a-.png"),
            "https://covers-1250000000.cos.ap-shanghai.myqcloud.com/wallpapers/1-a-.png"
        );
    }

    #[test]
    fn temporary_url_carries_signature_query() {
        let url = client()
            .temporary_url("wallpapers/1-a-.png", 3600)
            .expect("presign");
        let parsed = Url::parse(&url).expect("valid url");
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.iter().any(|(k, v)| k == "q-sign-algorithm" && v == "sha1"));
        let sign_time = pairs
            .iter()
            .find(|(k, _)| k == "q-sign-time")
            .map(|(_, v)| v.clone())
            .expect("sign time");
        let (start, end) = sign_time.split_once(';').expect("start;end");
        let start: i64 = start.parse().expect("start");
        let end: i64 = end.parse().expect("end");
        assert_eq!(end - start, 3600);
        assert_eq!(parsed.path(), "/wallpapers/1-a-.png");
    }
}
