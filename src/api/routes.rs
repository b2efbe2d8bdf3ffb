use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};

pub fn create_router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/order/create", post(handlers::create_order))
        .route("/order/info", post(handlers::order_info))
        .route("/order/list", post(handlers::order_list))
        .route("/order/delete", post(handlers::order_delete))
        .route("/order/advance", post(handlers::order_advance))
        .route(
            "/payment_method/:provider/create",
            post(handlers::create_payment),
        )
        .route(
            "/payment_method/update_config",
            post(handlers::update_method_config),
        )
        .route("/payment_method/list", post(handlers::list_methods))
        .route("/alipay/notify", post(handlers::alipay_notify))
        .route("/wechat_pay/notify", post(handlers::wechat_notify))
        .route("/paypal/webhook", post(handlers::paypal_webhook));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", v1)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
