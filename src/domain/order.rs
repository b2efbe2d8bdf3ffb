use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::money::Money;

/// Order lifecycle. Transitions only move forward; `Closed` is the one
/// escape hatch and is reachable only from `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Delivered,
    Completed,
    Closed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> DomainResult<Self> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "delivered" => Ok(OrderStatus::Delivered),
            "completed" => Ok(OrderStatus::Completed),
            "closed" => Ok(OrderStatus::Closed),
            other => Err(DomainError::Validation(format!(
                "unknown order status: {other}"
            ))),
        }
    }

    /// Legal forward moves. Exhaustive on purpose: adding a status forces
    /// this table to be revisited.
    pub fn can_advance_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, target) {
            (Pending, Paid) => true,
            (Pending, Closed) => true,
            (Paid, Delivered) => true,
            (Delivered, Completed) => true,
            (Pending, Pending)
            | (Pending, Delivered)
            | (Pending, Completed)
            | (Paid, _)
            | (Delivered, _)
            | (Completed, _)
            | (Closed, _) => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shipping snapshot copied at creation time, immutable afterward.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Receiver {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub country: String,
    pub province: String,
    pub city: String,
    pub address: String,
    pub zip: String,
    pub remark: String,
}

/// One priced order line. Price and discount are captured at order time,
/// never re-read from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_no: String,
    pub product_item_id: String,
    pub quantity: u32,
    pub price: Money,
    pub discount: Money,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn new(
        order_no: String,
        product_item_id: String,
        quantity: u32,
        price: Money,
        discount: Money,
    ) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::Validation(format!(
                "quantity must be >= 1 for product {product_item_id}"
            )));
        }
        let total_amount = price.checked_mul(quantity)?.checked_sub(discount)?;
        Ok(Self {
            id: Uuid::new_v4(),
            order_no,
            product_item_id,
            quantity,
            price,
            discount,
            total_amount,
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,

    /// Opaque, globally unique, generated at creation. The external
    /// identifier used by payments and notifications; never reused.
    pub order_no: String,

    pub user_id: String,

    /// Always recomputed server-side as the sum of line totals.
    pub total_amount: Money,

    pub status: OrderStatus,

    pub receiver: Receiver,

    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds an order plus its lines. Callers pass already-priced
    /// `(product_item_id, quantity, price, discount)` tuples; the total is
    /// computed here, client-supplied amounts are never trusted.
    pub fn new(
        user_id: String,
        receiver: Receiver,
        lines: Vec<(String, u32, Money, Money)>,
    ) -> DomainResult<(Self, Vec<OrderItem>)> {
        if lines.is_empty() {
            return Err(DomainError::Validation(
                "order must contain at least one item".into(),
            ));
        }

        let order_no = Uuid::new_v4().to_string();
        let mut items = Vec::with_capacity(lines.len());
        let mut total = Money::ZERO;
        for (product_item_id, quantity, price, discount) in lines {
            let item = OrderItem::new(
                order_no.clone(),
                product_item_id,
                quantity,
                price,
                discount,
            )?;
            total = total.checked_add(item.total_amount)?;
            items.push(item);
        }

        if !total.is_positive() {
            return Err(DomainError::Validation(
                "order total must be greater than zero".into(),
            ));
        }

        let now = Utc::now();
        let order = Self {
            id: Uuid::new_v4(),
            order_no,
            user_id,
            total_amount: total,
            status: OrderStatus::Pending,
            receiver,
            paid_at: None,
            delivered_at: None,
            completed_at: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        };
        Ok((order, items))
    }

    /// Moves the order forward, stamping the timestamp that matches the
    /// target. Backward or skipping moves are rejected, not ignored.
    pub fn advance(&mut self, target: OrderStatus) -> DomainResult<()> {
        if !self.status.can_advance_to(target) {
            return Err(DomainError::InvalidTransition {
                entity: "order",
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        let now = Utc::now();
        match target {
            OrderStatus::Paid => self.paid_at = Some(now),
            OrderStatus::Delivered => self.delivered_at = Some(now),
            OrderStatus::Completed => self.completed_at = Some(now),
            OrderStatus::Closed => self.closed_at = Some(now),
            OrderStatus::Pending => unreachable!("pending is never a transition target"),
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines() -> Vec<(String, u32, Money, Money)> {
        vec![
            ("prod-a".into(), 2, Money::from_major(10), Money::ZERO),
            ("prod-b".into(), 1, Money::from_major(15), Money::ZERO),
        ]
    }

    #[test]
    fn total_is_sum_of_line_totals() {
        let (order, items) = Order::new("user-1".into(), Receiver::default(), lines()).unwrap();
        assert_eq!(order.total_amount, Money::from_major(35));
        let sum = items
            .iter()
            .fold(Money::ZERO, |acc, i| acc.checked_add(i.total_amount).unwrap());
        assert_eq!(order.total_amount, sum);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn discount_reduces_line_total() {
        let lines = vec![(
            "prod-a".to_string(),
            2,
            Money::from_major(10),
            Money::from_cents(150),
        )];
        let (order, items) = Order::new("user-1".into(), Receiver::default(), lines).unwrap();
        assert_eq!(items[0].total_amount, Money::from_cents(1850));
        assert_eq!(order.total_amount, Money::from_cents(1850));
    }

    #[test]
    fn empty_order_rejected() {
        let result = Order::new("user-1".into(), Receiver::default(), vec![]);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn zero_quantity_rejected() {
        let lines = vec![("prod-a".to_string(), 0, Money::from_major(10), Money::ZERO)];
        let result = Order::new("user-1".into(), Receiver::default(), lines);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn forward_path_stamps_timestamps() {
        let (mut order, _) = Order::new("user-1".into(), Receiver::default(), lines()).unwrap();
        order.advance(OrderStatus::Paid).unwrap();
        assert!(order.paid_at.is_some());
        order.advance(OrderStatus::Delivered).unwrap();
        assert!(order.delivered_at.is_some());
        order.advance(OrderStatus::Completed).unwrap();
        assert!(order.completed_at.is_some());
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[test]
    fn close_only_from_pending() {
        let (mut order, _) = Order::new("user-1".into(), Receiver::default(), lines()).unwrap();
        order.advance(OrderStatus::Paid).unwrap();
        assert!(matches!(
            order.advance(OrderStatus::Closed),
            Err(DomainError::InvalidTransition { .. })
        ));

        let (mut fresh, _) = Order::new("user-1".into(), Receiver::default(), lines()).unwrap();
        fresh.advance(OrderStatus::Closed).unwrap();
        assert!(fresh.closed_at.is_some());
    }

    #[test]
    fn no_regression() {
        let (mut order, _) = Order::new("user-1".into(), Receiver::default(), lines()).unwrap();
        order.advance(OrderStatus::Paid).unwrap();
        assert!(order.advance(OrderStatus::Pending).is_err());
        assert!(order.advance(OrderStatus::Paid).is_err());
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[test]
    fn no_skipping() {
        let (mut order, _) = Order::new("user-1".into(), Receiver::default(), lines()).unwrap();
        assert!(order.advance(OrderStatus::Delivered).is_err());
        assert!(order.advance(OrderStatus::Completed).is_err());
        assert_eq!(order.status, OrderStatus::Pending);
    }
}
