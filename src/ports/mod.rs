pub mod gateway;
pub mod repository;

pub use gateway::{
    ChargeRequest, GatewayRegistry, NotificationEvent, PaymentGateway, PaymentOutcome,
    ProviderOrder, RawNotification,
};
pub use repository::{
    CartEntry, CartReader, CatalogItem, CatalogReader, OrderRepository, PaymentMethodSummary,
    PaymentRepository, ProviderConfigStore,
};
