//! In-memory port implementations used as test doubles across the
//! application-layer tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::money::Money;
use crate::domain::order::{Order, OrderItem, OrderStatus, Receiver};
use crate::domain::payment::{Payment, PaymentStatus, Provider};
use crate::ports::{
    CartEntry, CartReader, CatalogItem, CatalogReader, ChargeRequest, NotificationEvent,
    OrderRepository, PaymentGateway, PaymentRepository, ProviderOrder, RawNotification,
};

#[derive(Default)]
pub struct InMemoryOrders {
    orders: Mutex<HashMap<String, Order>>,
    items: Mutex<HashMap<String, Vec<OrderItem>>>,
}

impl InMemoryOrders {
    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn create(&self, order: &Order, items: &[OrderItem]) -> DomainResult<()> {
        self.orders
            .lock()
            .unwrap()
            .insert(order.order_no.clone(), order.clone());
        self.items
            .lock()
            .unwrap()
            .insert(order.order_no.clone(), items.to_vec());
        Ok(())
    }

    async fn find_by_order_no(&self, order_no: &str) -> DomainResult<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(order_no).cloned())
    }

    async fn find_items(&self, order_no: &str) -> DomainResult<Vec<OrderItem>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .get(order_no)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> DomainResult<(Vec<Order>, u64)> {
        let orders = self.orders.lock().unwrap();
        let mut matched: Vec<Order> = orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matched.len() as u64;
        let start = ((page - 1) * page_size) as usize;
        let page: Vec<Order> = matched
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();
        Ok((page, total))
    }

    async fn advance_status(&self, order: &Order, _target: OrderStatus) -> DomainResult<()> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(&order.order_no) {
            Some(stored) => {
                *stored = order.clone();
                Ok(())
            }
            None => Err(DomainError::not_found("order", &order.order_no)),
        }
    }

    async fn delete(&self, order_no: &str) -> DomainResult<()> {
        self.orders.lock().unwrap().remove(order_no);
        self.items.lock().unwrap().remove(order_no);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPayments {
    payments: Mutex<Vec<Payment>>,
}

impl InMemoryPayments {
    pub fn count(&self) -> usize {
        self.payments.lock().unwrap().len()
    }

    pub fn insert(&self, payment: Payment) {
        self.payments.lock().unwrap().push(payment);
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPayments {
    async fn create(&self, payment: &Payment) -> DomainResult<()> {
        self.payments.lock().unwrap().push(payment.clone());
        Ok(())
    }

    async fn find_by_channel_order_no(
        &self,
        provider: Provider,
        channel_order_no: &str,
    ) -> DomainResult<Option<Payment>> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .find(|p| {
                p.provider == provider
                    && p.channel_order_no.as_deref() == Some(channel_order_no)
            })
            .cloned())
    }

    async fn find_pending_by_order_no(
        &self,
        provider: Provider,
        order_no: &str,
    ) -> DomainResult<Option<Payment>> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .find(|p| {
                p.provider == provider
                    && p.order_no == order_no
                    && p.status == PaymentStatus::Pending
            })
            .cloned())
    }

    async fn settle(
        &self,
        payment_id: uuid::Uuid,
        target: PaymentStatus,
        channel_status: &str,
    ) -> DomainResult<bool> {
        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| DomainError::not_found("payment", payment_id.to_string()))?;
        if payment.status != PaymentStatus::Pending {
            return Ok(false);
        }
        match target {
            PaymentStatus::Paid => payment.mark_paid()?,
            PaymentStatus::Canceled => payment.mark_canceled()?,
            PaymentStatus::Pending => {
                return Err(DomainError::Internal("settle target cannot be pending".into()))
            }
        }
        payment.channel_status = Some(channel_status.to_string());
        Ok(true)
    }
}

pub struct InMemoryCatalog {
    items: HashMap<String, CatalogItem>,
}

impl InMemoryCatalog {
    pub fn with_items(items: Vec<CatalogItem>) -> Self {
        Self {
            items: items.into_iter().map(|i| (i.id.clone(), i)).collect(),
        }
    }
}

#[async_trait]
impl CatalogReader for InMemoryCatalog {
    async fn find_item(&self, product_item_id: &str) -> DomainResult<Option<CatalogItem>> {
        Ok(self.items.get(product_item_id).cloned())
    }
}

pub struct InMemoryCarts {
    entries: Vec<CartEntry>,
}

impl InMemoryCarts {
    pub fn with_entries(entries: Vec<CartEntry>) -> Self {
        Self { entries }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl CartReader for InMemoryCarts {
    async fn find_entries(
        &self,
        user_id: &str,
        uuids: &[String],
    ) -> DomainResult<Vec<CartEntry>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && uuids.contains(&e.uuid))
            .cloned()
            .collect())
    }
}

enum StubBehavior {
    /// create_order succeeds with a fixed reference.
    Paying,
    /// create_order fails with a provider business error.
    Rejecting,
    /// verify_notification yields the given event.
    Verifying(NotificationEvent),
    /// verify_notification fails signature verification.
    FailingVerification,
}

pub struct StubGateway {
    provider: Provider,
    behavior: StubBehavior,
}

impl StubGateway {
    pub fn paying(provider: Provider) -> Self {
        Self {
            provider,
            behavior: StubBehavior::Paying,
        }
    }

    pub fn rejecting(provider: Provider) -> Self {
        Self {
            provider,
            behavior: StubBehavior::Rejecting,
        }
    }

    pub fn verifying(provider: Provider, event: NotificationEvent) -> Self {
        Self {
            provider,
            behavior: StubBehavior::Verifying(event),
        }
    }

    pub fn failing_verification(provider: Provider) -> Self {
        Self {
            provider,
            behavior: StubBehavior::FailingVerification,
        }
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn create_order(&self, _request: &ChargeRequest) -> DomainResult<ProviderOrder> {
        match &self.behavior {
            StubBehavior::Rejecting => Err(DomainError::ProviderBusiness {
                provider: self.provider,
                code: "INVALID_REQUEST".into(),
                message: "rejected by stub".into(),
            }),
            _ => Ok(ProviderOrder {
                provider_ref: "PROV-REF-1".to_string(),
                provider_status: "CREATED".to_string(),
                raw: serde_json::json!({"id": "PROV-REF-1", "status": "CREATED"}),
            }),
        }
    }

    async fn verify_notification(
        &self,
        _raw: &RawNotification,
    ) -> DomainResult<NotificationEvent> {
        match &self.behavior {
            StubBehavior::Verifying(event) => Ok(event.clone()),
            _ => Err(DomainError::VerificationFailed(self.provider)),
        }
    }
}

/// Seeds a pending order with a single line totaling `total`; returns its
/// order number.
pub async fn seeded_order(orders: &InMemoryOrders, user_id: &str, total: Money) -> String {
    let (order, items) = Order::new(
        user_id.to_string(),
        Receiver::default(),
        vec![("prod-seed".to_string(), 1, total, Money::ZERO)],
    )
    .unwrap();
    let order_no = order.order_no.clone();
    orders.create(&order, &items).await.unwrap();
    order_no
}

/// Seeds a pending payment carrying a provider reference.
pub async fn seeded_payment(
    payments: &InMemoryPayments,
    order_no: &str,
    user_id: &str,
    amount: Money,
    provider: Provider,
    provider_ref: &str,
) -> Payment {
    let mut payment = Payment::new(
        order_no.to_string(),
        user_id.to_string(),
        amount,
        provider,
        "web".to_string(),
    )
    .unwrap();
    payment.channel_order_no = Some(provider_ref.to_string());
    payments.insert(payment.clone());
    payment
}
