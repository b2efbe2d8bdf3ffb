use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::money::Money;
use crate::domain::order::{Order, OrderItem, Receiver};

/// One requested line on the explicit-items creation path.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderLineInput {
    pub product_item_id: String,
    pub quantity: u32,
}

/// Order creation body. Exactly one of `items` / `cart_uuids` must be
/// present; anything else is rejected before any side effect.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub receiver: Receiver,
    #[serde(default)]
    pub items: Option<Vec<OrderLineInput>>,
    #[serde(default)]
    pub cart_uuids: Option<Vec<String>>,
}

/// The two mutually exclusive creation paths, decided up front.
#[derive(Debug)]
pub enum OrderSource {
    Items(Vec<OrderLineInput>),
    Cart(Vec<String>),
}

impl CreateOrderRequest {
    /// Enforces the either/or precondition and hands back the chosen path.
    pub fn into_source(self) -> DomainResult<(Receiver, OrderSource)> {
        match (self.items, self.cart_uuids) {
            (Some(items), None) => {
                if items.is_empty() {
                    return Err(DomainError::Validation("items must not be empty".into()));
                }
                Ok((self.receiver, OrderSource::Items(items)))
            }
            (None, Some(uuids)) => {
                if uuids.is_empty() {
                    return Err(DomainError::Validation(
                        "cart_uuids must not be empty".into(),
                    ));
                }
                Ok((self.receiver, OrderSource::Cart(uuids)))
            }
            (Some(_), Some(_)) => Err(DomainError::Validation(
                "supply either items or cart_uuids, not both".into(),
            )),
            (None, None) => Err(DomainError::Validation(
                "supply either items or cart_uuids".into(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderItemView {
    pub product_item_id: String,
    pub quantity: u32,
    pub price: Money,
    pub discount: Money,
    pub total_amount: Money,
}

impl From<&OrderItem> for OrderItemView {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_item_id: item.product_item_id.clone(),
            quantity: item.quantity,
            price: item.price,
            discount: item.discount,
            total_amount: item.total_amount,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub order_no: String,
    pub user_id: String,
    pub total_amount: Money,
    pub status: String,
    pub receiver: Receiver,
    pub items: Vec<OrderItemView>,
    pub paid_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl OrderView {
    pub fn from_order(order: Order, items: &[OrderItem]) -> Self {
        Self {
            order_no: order.order_no,
            user_id: order.user_id,
            total_amount: order.total_amount,
            status: order.status.to_string(),
            receiver: order.receiver,
            items: items.iter().map(OrderItemView::from).collect(),
            paid_at: order.paid_at,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderNoRequest {
    pub order_no: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderListRequest {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

#[derive(Debug, Serialize)]
pub struct PagedOrders {
    pub total: u64,
    pub orders: Vec<OrderView>,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceOrderRequest {
    pub order_no: String,
    /// Target status name, e.g. "delivered".
    pub status: String,
}

/// Provider payment initiation for an existing order. The amount always
/// comes from the order; only the currency is caller-selectable.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_no: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub payment_id: uuid::Uuid,
    pub order_no: String,
    pub provider: String,
    pub amount: Money,
    pub status: String,
    pub channel_order_no: Option<String>,
    pub channel_status: Option<String>,
    /// Raw provider response, handed to the client so it can drive the
    /// provider's own checkout surface.
    pub channel_data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMethodConfigRequest {
    pub provider: String,
    /// Opaque credential blob; stored, never echoed back.
    pub config: serde_json::Value,
}

/// Machine-readable error envelope for the admin/client surface.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(items: Option<Vec<OrderLineInput>>, carts: Option<Vec<String>>) -> CreateOrderRequest {
        CreateOrderRequest {
            receiver: Receiver::default(),
            items,
            cart_uuids: carts,
        }
    }

    #[test]
    fn items_path_accepted() {
        let req = request(
            Some(vec![OrderLineInput {
                product_item_id: "p1".into(),
                quantity: 1,
            }]),
            None,
        );
        assert!(matches!(
            req.into_source().unwrap().1,
            OrderSource::Items(_)
        ));
    }

    #[test]
    fn both_rejected() {
        let req = request(
            Some(vec![OrderLineInput {
                product_item_id: "p1".into(),
                quantity: 1,
            }]),
            Some(vec!["c1".into()]),
        );
        assert!(matches!(
            req.into_source(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn neither_rejected() {
        assert!(request(None, None).into_source().is_err());
    }

    #[test]
    fn empty_lists_rejected() {
        assert!(request(Some(vec![]), None).into_source().is_err());
        assert!(request(None, Some(vec![])).into_source().is_err());
    }
}
