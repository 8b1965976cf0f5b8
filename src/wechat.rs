//! WeChat cloud-call glue: payments, OAuth code exchange and QR-connect URLs.
//!
//! Cloud-call requests are authenticated by the hosting environment, so no
//! signing happens here.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info};
use url::Url;

use crate::config::WechatConfig;
use crate::constants::WECHAT_QRCONNECT_URL;
use crate::error::WallpaperError;

/// An order to charge for.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    /// Merchant order id
    pub order_id: String,
    /// Amount in yuan
    pub amount: f64,
    /// Shown on the payment sheet
    pub description: String,
}

/// Outcome of a payment call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Paid
    Success,
    /// Not paid yet
    Pending,
    /// Rejected, closed or errored
    Failed,
}

/// What the payment endpoints answer with.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    /// Merchant order id
    pub order_id: String,
    /// Where the payment is at
    pub status: PaymentStatus,
    /// When it was paid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_time: Option<DateTime<FixedOffset>>,
    /// Why it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl PaymentResult {
    fn failed(order_id: &str, message: impl Into<String>) -> Self {
        Self {
            order_id: order_id.to_string(),
            status: PaymentStatus::Failed,
            payment_time: None,
            error_message: Some(message.into()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct UnifiedOrderResponse {
    #[serde(default)]
    errcode: Option<i64>,
    #[serde(default)]
    errmsg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OrderQueryResponse {
    #[serde(default)]
    errcode: Option<i64>,
    #[serde(default)]
    errmsg: Option<String>,
    #[serde(default)]
    trade_state: Option<String>,
    #[serde(default)]
    trade_state_desc: Option<String>,
    #[serde(default)]
    success_time: Option<String>,
}

/// Converts yuan to fen, rounding down.
pub fn yuan_to_fen(amount: f64) -> i64 {
    (amount * 100.0).floor() as i64
}

/// Only an explicit `errcode: 0` counts as success.
fn unified_order_result(order_id: &str, response: UnifiedOrderResponse) -> PaymentResult {
    if response.errcode != Some(0) {
        return PaymentResult::failed(order_id, response.errmsg.unwrap_or_default());
    }
    PaymentResult {
        order_id: order_id.to_string(),
        status: PaymentStatus::Pending,
        payment_time: None,
        error_message: None,
    }
}

fn order_query_result(order_id: &str, response: OrderQueryResponse) -> PaymentResult {
    if response.errcode != Some(0) {
        return PaymentResult::failed(order_id, response.errmsg.unwrap_or_default());
    }
    let status = match response.trade_state.as_deref() {
        Some("SUCCESS") => PaymentStatus::Success,
        Some("NOTPAY") => PaymentStatus::Pending,
        _ => PaymentStatus::Failed,
    };
    let payment_time = response
        .success_time
        .as_deref()
        .and_then(|time| DateTime::parse_from_rfc3339(time).ok());
    PaymentResult {
        order_id: order_id.to_string(),
        status,
        payment_time,
        error_message: if status == PaymentStatus::Failed {
            response.trade_state_desc
        } else {
            None
        },
    }
}

/// Builds the QR-connect login URL WeChat's login page lives at.
pub fn qr_login_url(
    app_id: &str,
    base_url: &str,
    redirect_path: &str,
    state: &str,
) -> Result<String, WallpaperError> {
    let redirect_uri = format!("{}{}", base_url.trim_end_matches('/'), redirect_path);
    let mut url = Url::parse(WECHAT_QRCONNECT_URL)?;
    url.query_pairs_mut()
        .append_pair("appid", app_id)
        .append_pair("redirect_uri", &redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", "snsapi_login")
        .append_pair("state", state);
    url.set_fragment(Some("wechat_redirect"));
    Ok(url.to_string())
}

/// Compares a callback's `state` against the one we handed out.
pub fn validate_callback_state(saved: Option<&str>, received: &str) -> bool {
    matches!(saved, Some(saved) if !saved.is_empty() && saved == received)
}

/// WeChat cloud-call client.
#[derive(Clone, Debug)]
pub struct WechatClient {
    client: reqwest::Client,
    config: WechatConfig,
}

impl WechatClient {
    /// Client for one WeChat application.
    pub fn new(client: reqwest::Client, config: WechatConfig) -> Self {
        Self { client, config }
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<reqwest::Response, WallpaperError> {
        let resp = self
            .client
            .post(format!("{}{}", self.config.api_base_url, path))
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(WallpaperError::Upstream(format!("HTTP error! status: {status}")));
        }
        Ok(resp)
    }

    /// Places a JSAPI order. Failures come back as a failed result, not an error.
    pub async fn create_payment(&self, order: &PaymentOrder) -> PaymentResult {
        let body = json!({
            "out_trade_no": order.order_id,
            "total_fee": yuan_to_fen(order.amount),
            "body": order.description,
            "trade_type": "JSAPI",
        });
        let response = match self.post_json("/pay/unifiedorder", &body).await {
            Ok(resp) => resp.json::<UnifiedOrderResponse>().await,
            Err(err) => {
                error!("Creating payment {} failed: {}", order.order_id, err);
                return PaymentResult::failed(&order.order_id, err.to_string());
            }
        };
        match response {
            Ok(response) => {
                let result = unified_order_result(&order.order_id, response);
                info!("Payment {} created: {:?}", order.order_id, result.status);
                result
            }
            Err(err) => PaymentResult::failed(&order.order_id, err.to_string()),
        }
    }

    /// Looks up an order's state. Failures come back as a failed result.
    pub async fn query_payment_status(&self, order_id: &str) -> PaymentResult {
        let body = json!({ "out_trade_no": order_id });
        let response = match self.post_json("/pay/orderquery", &body).await {
            Ok(resp) => resp.json::<OrderQueryResponse>().await,
            Err(err) => {
                error!("Querying payment {} failed: {}", order_id, err);
                return PaymentResult::failed(order_id, err.to_string());
            }
        };
        match response {
            Ok(response) => order_query_result(order_id, response),
            Err(err) => PaymentResult::failed(order_id, err.to_string()),
        }
    }

    /// Exchanges an OAuth `code` and returns WeChat's answer untouched.
    pub async fn get_user_info(&self, code: &str) -> Result<Value, WallpaperError> {
        let mut url = Url::parse(&format!(
            "{}/sns/oauth2/access_token",
            self.config.api_base_url
        ))?;
        url.query_pairs_mut()
            .append_pair("appid", &self.config.app_id)
            .append_pair("code", code)
            .append_pair("grant_type", "authorization_code");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(WallpaperError::Upstream(format!("HTTP error! status: {status}")));
        }
        let value: Value = resp.json().await?;
        if let Some(errcode) = value.get("errcode").and_then(Value::as_i64)
            && errcode != 0
        {
            let errmsg = value
                .get("errmsg")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Err(WallpaperError::Upstream(format!("{errcode} {errmsg}")));
        }
        Ok(value)
    }

    /// QR-connect login URL for this application.
    pub fn qr_login_url(&self, redirect_path: &str, state: &str) -> Result<String, WallpaperError> {
        qr_login_url(
            &self.config.app_id,
            &self.config.public_base_url,
            redirect_path,
            state,
        )
    }
}
