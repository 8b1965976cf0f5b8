//! Payment endpoints, thin wrappers over the WeChat client.

use super::prelude::*;
use crate::wechat::{PaymentOrder, PaymentResult, WechatClient};

fn wechat(state: &AppState) -> Result<&Arc<WechatClient>, WallpaperError> {
    state
        .wechat
        .as_ref()
        .ok_or(WallpaperError::NotConfigured("WX_APP_ID"))
}

fn validate_order(order: &PaymentOrder) -> Result<(), WallpaperError> {
    if order.order_id.trim().is_empty() {
        return Err(WallpaperError::BadRequest("订单号不能为空".to_string()));
    }
    if !order.amount.is_finite() || order.amount <= 0.0 {
        return Err(WallpaperError::BadRequest("金额必须大于 0".to_string()));
    }
    Ok(())
}

pub(crate) async fn create_order_handler(
    State(state): State<AppState>,
    Json(order): Json<PaymentOrder>,
) -> Result<Json<Envelope<PaymentResult>>, WallpaperError> {
    validate_order(&order)?;
    let result = wechat(&state)?.create_payment(&order).await;
    Ok(Json(Envelope::ok("success", result)))
}

pub(crate) async fn query_order_handler(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Envelope<PaymentResult>>, WallpaperError> {
    let result = wechat(&state)?.query_payment_status(&order_id).await;
    Ok(Json(Envelope::ok("success", result)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(order_id: &str, amount: f64) -> PaymentOrder {
        PaymentOrder {
            order_id: order_id.to_string(),
            amount,
            description: "红包封面".to_string(),
        }
    }

    #[test]
    fn orders_need_an_id_and_a_positive_amount() {
        assert!(validate_order(&order("o-1", 9.9)).is_ok());
        assert!(matches!(
            validate_order(&order(" ", 9.9)),
            Err(WallpaperError::BadRequest(_))
        ));
        assert!(matches!(
            validate_order(&order("o-1", 0.0)),
            Err(WallpaperError::BadRequest(_))
        ));
        assert!(matches!(
            validate_order(&order("o-1", f64::NAN)),
            Err(WallpaperError::BadRequest(_))
        ));
    }
}
