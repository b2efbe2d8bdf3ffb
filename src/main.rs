use checkout::api::{self, AppState};
use checkout::application::{CheckoutService, NotificationReconciler, OrderService};
use checkout::infrastructure::adapters::{
    AlipayGateway, MySqlCartReader, MySqlCatalogReader, MySqlOrderRepository,
    MySqlPaymentRepository, MySqlProviderConfigStore, PaypalGateway, WechatGateway,
};
use checkout::ports::GatewayRegistry;
use sqlx::MySqlPool;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    dotenvy::dotenv().ok();

    info!("Starting checkout service...");

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = Arc::new(MySqlPool::connect(&database_url).await?);
    info!("Database connected");

    let orders_repo = Arc::new(MySqlOrderRepository::new(pool.clone()));
    let payments_repo = Arc::new(MySqlPaymentRepository::new(pool.clone()));
    let catalog = Arc::new(MySqlCatalogReader::new(pool.clone()));
    let carts = Arc::new(MySqlCartReader::new(pool.clone()));
    let method_config = Arc::new(MySqlProviderConfigStore::new(pool.clone()));

    // Adapters fetch their credential blobs from the config store on
    // every call, so config changes take effect without a restart.
    let gateways = Arc::new(
        GatewayRegistry::new()
            .register(Arc::new(AlipayGateway::new(method_config.clone())))
            .register(Arc::new(WechatGateway::new(method_config.clone())))
            .register(Arc::new(PaypalGateway::new(method_config.clone()))),
    );

    let state = AppState {
        orders: Arc::new(OrderService::new(
            orders_repo.clone(),
            catalog,
            carts,
        )),
        checkout: Arc::new(CheckoutService::new(
            gateways.clone(),
            orders_repo.clone(),
            payments_repo.clone(),
        )),
        reconciler: Arc::new(NotificationReconciler::new(
            gateways,
            payments_repo,
            orders_repo,
        )),
        method_config,
    };

    let app = api::create_router(state);

    let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{host}:{port}");

    info!("Server listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
