use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::application::dto::{
    AdvanceOrderRequest, CreateOrderRequest, CreatePaymentRequest, ErrorResponse,
    OrderListRequest, OrderNoRequest, UpdateMethodConfigRequest,
};
use crate::application::{CheckoutService, NotificationReconciler, OrderService};
use crate::domain::errors::DomainError;
use crate::domain::order::OrderStatus;
use crate::domain::payment::Provider;
use crate::ports::{ProviderConfigStore, RawNotification};

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
    pub reconciler: Arc<NotificationReconciler>,
    pub method_config: Arc<dyn ProviderConfigStore>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Maps domain errors onto the structured error envelope. Callback
/// endpoints deliberately do not go through this; they speak only the
/// provider's acknowledgment dialect.
fn api_error(e: DomainError) -> ApiError {
    let (status, code) = match &e {
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        DomainError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
        DomainError::AmountMismatch { .. } => (StatusCode::CONFLICT, "AMOUNT_MISMATCH"),
        DomainError::ProviderBusiness { .. } => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
        DomainError::ProviderTransport(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_UNAVAILABLE"),
        DomainError::VerificationFailed(_) => (StatusCode::UNAUTHORIZED, "VERIFICATION_FAILED"),
        DomainError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };
    if status.is_server_error() {
        error!("request failed: {e}");
    }
    (status, Json(ErrorResponse::new(code, e.to_string())))
}

/// Session mechanics are out of scope; the authenticated user arrives as
/// a header set by the fronting layer.
fn user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("UNAUTHORIZED", "missing X-User-Id")),
            )
        })
}

fn raw_notification(headers: &HeaderMap, body: String) -> RawNotification {
    let headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect();
    RawNotification { headers, body }
}

pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Response, ApiError> {
    let user = user_id(&headers)?;
    let view = state
        .orders
        .create_order(&user, request)
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

pub async fn order_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OrderNoRequest>,
) -> Result<Response, ApiError> {
    let user = user_id(&headers)?;
    let view = state
        .orders
        .get_order(&user, &request.order_no)
        .await
        .map_err(api_error)?;
    Ok(Json(view).into_response())
}

pub async fn order_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OrderListRequest>,
) -> Result<Response, ApiError> {
    let user = user_id(&headers)?;
    let page = state
        .orders
        .list_orders(&user, &request)
        .await
        .map_err(api_error)?;
    Ok(Json(page).into_response())
}

pub async fn order_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OrderNoRequest>,
) -> Result<Response, ApiError> {
    user_id(&headers)?;
    state
        .orders
        .delete_order(&request.order_no)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn order_advance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AdvanceOrderRequest>,
) -> Result<Response, ApiError> {
    user_id(&headers)?;
    let target = OrderStatus::from_str(&request.status).map_err(api_error)?;
    state
        .orders
        .advance_order(&request.order_no, target)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn create_payment(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Response, ApiError> {
    let user = user_id(&headers)?;
    let provider = Provider::from_code(&provider).map_err(api_error)?;
    info!(order_no = %request.order_no, provider = %provider, "payment requested");
    let view = state
        .checkout
        .create_payment(&user, provider, request)
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

pub async fn update_method_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateMethodConfigRequest>,
) -> Result<Response, ApiError> {
    user_id(&headers)?;
    let provider = Provider::from_code(&request.provider).map_err(api_error)?;
    state
        .method_config
        .store(provider, request.config)
        .await
        .map_err(api_error)?;
    // Write-only: acknowledge without echoing the blob.
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list_methods(State(state): State<AppState>) -> Result<Response, ApiError> {
    let methods = state.method_config.list_methods().await.map_err(api_error)?;
    Ok(Json(methods).into_response())
}

/// Alipay's notify contract: the literal 7-character body `success`
/// stops its retry schedule (roughly 4m, 10m, 10m, 1h, 2h, 6h, 15h over
/// up to ~25h). Idempotent repeats are acknowledged too; genuine
/// rejections, including signature failures, are not.
pub async fn alipay_notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let raw = raw_notification(&headers, body);
    match state.reconciler.handle(Provider::Alipay, &raw).await {
        Ok(_) => (StatusCode::OK, "success").into_response(),
        Err(e) => {
            warn!("alipay notify rejected: {e}");
            (StatusCode::BAD_REQUEST, "failure").into_response()
        }
    }
}

/// WeChat expects a structured acknowledgment; a non-SUCCESS code (or a
/// non-2xx status) makes it retry.
pub async fn wechat_notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let raw = raw_notification(&headers, body);
    match state.reconciler.handle(Provider::Wechat, &raw).await {
        Ok(_) => Json(serde_json::json!({"code": "SUCCESS", "message": "OK"})).into_response(),
        Err(e) => {
            warn!("wechat notify rejected: {e}");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"code": "FAIL", "message": "rejected"})),
            )
                .into_response()
        }
    }
}

/// PayPal webhooks use the service's own generic envelope.
pub async fn paypal_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let raw = raw_notification(&headers, body);
    match state.reconciler.handle(Provider::Paypal, &raw).await {
        Ok(_) => Json(serde_json::json!({"status": "ok"})).into_response(),
        Err(e) => {
            warn!("paypal webhook rejected: {e}");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"status": "rejected"})),
            )
                .into_response()
        }
    }
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}
