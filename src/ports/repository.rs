use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::money::Money;
use crate::domain::order::{Order, OrderItem, OrderStatus};
use crate::domain::payment::{Payment, PaymentStatus, Provider};

/// Order persistence. `create` writes the order and all of its items in a
/// single transaction; a failure anywhere rolls the whole thing back.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: &Order, items: &[OrderItem]) -> DomainResult<()>;

    async fn find_by_order_no(&self, order_no: &str) -> DomainResult<Option<Order>>;

    async fn find_items(&self, order_no: &str) -> DomainResult<Vec<OrderItem>>;

    async fn list_for_user(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> DomainResult<(Vec<Order>, u64)>;

    /// Applies an already-validated forward transition, stamping the
    /// timestamp column that matches `target`.
    async fn advance_status(&self, order: &Order, target: OrderStatus) -> DomainResult<()>;

    /// Administrative removal of an order and its items.
    async fn delete(&self, order_no: &str) -> DomainResult<()>;
}

/// Payment ledger persistence.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: &Payment) -> DomainResult<()>;

    async fn find_by_channel_order_no(
        &self,
        provider: Provider,
        channel_order_no: &str,
    ) -> DomainResult<Option<Payment>>;

    async fn find_pending_by_order_no(
        &self,
        provider: Provider,
        order_no: &str,
    ) -> DomainResult<Option<Payment>>;

    /// Conditional settlement: moves the payment to `target` only if it is
    /// still pending, in one atomic statement. Returns `true` if this call
    /// performed the transition, `false` if someone else already settled it.
    /// This is what makes concurrent provider redeliveries race-free.
    async fn settle(
        &self,
        payment_id: uuid::Uuid,
        target: PaymentStatus,
        channel_status: &str,
    ) -> DomainResult<bool>;
}

/// A priced catalog entry as seen at order-creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub price: Money,
    pub discount: Money,
}

/// Read-only view of the product catalog (external collaborator).
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn find_item(&self, product_item_id: &str) -> DomainResult<Option<CatalogItem>>;
}

/// A cart row referenced by uuid at order-creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartEntry {
    pub uuid: String,
    pub user_id: String,
    pub product_item_id: String,
    pub quantity: u32,
}

/// Read-only view of the cart store. Order creation consumes entries
/// without mutating them; cleanup belongs to the cart's owner.
#[async_trait]
pub trait CartReader: Send + Sync {
    async fn find_entries(
        &self,
        user_id: &str,
        uuids: &[String],
    ) -> DomainResult<Vec<CartEntry>>;
}

/// A payment-method row with its credential blob redacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodSummary {
    pub provider: Provider,
    pub name: String,
    pub enabled: bool,
    /// Whether a credential blob has been stored. The blob itself is
    /// write-only from the client's perspective.
    pub is_config: bool,
}

/// Per-provider credential blobs, fetched by provider code at call time.
#[async_trait]
pub trait ProviderConfigStore: Send + Sync {
    /// Loads and decodes the blob for `provider`. Missing or undecodable
    /// config is a `Configuration` error.
    async fn load(&self, provider: Provider)
        -> DomainResult<crate::infrastructure::config::ProviderConfig>;

    /// Replaces the blob. The payload is opaque here; decoding is deferred
    /// to `load` so a bad write surfaces at first use, matching the
    /// write-only contract of the admin surface.
    async fn store(&self, provider: Provider, raw: serde_json::Value) -> DomainResult<()>;

    async fn list_methods(&self) -> DomainResult<Vec<PaymentMethodSummary>>;
}
