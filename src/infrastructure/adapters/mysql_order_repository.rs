use async_trait::async_trait;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::money::Money;
use crate::domain::order::{Order, OrderItem, OrderStatus, Receiver};
use crate::ports::OrderRepository;

/// MySQL-backed order store. Creation writes the order row and every item
/// row inside one transaction; any failure rolls the whole lot back.
#[derive(Clone)]
pub struct MySqlOrderRepository {
    pool: Arc<Pool<MySql>>,
}

impl MySqlOrderRepository {
    pub fn new(pool: Arc<Pool<MySql>>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for MySqlOrderRepository {
    async fn create(&self, order: &Order, items: &[OrderItem]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_no, user_id, total_amount_cents, status,
                receiver_name, receiver_phone, receiver_email, receiver_country,
                receiver_province, receiver_city, receiver_address, receiver_zip,
                receiver_remark, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_no)
        .bind(&order.user_id)
        .bind(order.total_amount.to_cents())
        .bind(order.status.as_str())
        .bind(&order.receiver.name)
        .bind(&order.receiver.phone)
        .bind(&order.receiver.email)
        .bind(&order.receiver.country)
        .bind(&order.receiver.province)
        .bind(&order.receiver.city)
        .bind(&order.receiver.address)
        .bind(&order.receiver.zip)
        .bind(&order.receiver.remark)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_no, product_item_id, quantity,
                    price_cents, discount_cents, total_amount_cents, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(item.id)
            .bind(&item.order_no)
            .bind(&item.product_item_id)
            .bind(item.quantity)
            .bind(item.price.to_cents())
            .bind(item.discount.to_cents())
            .bind(item.total_amount.to_cents())
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(order_no = %order.order_no, items = items.len(), "order persisted");
        Ok(())
    }

    async fn find_by_order_no(&self, order_no: &str) -> DomainResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, order_no, user_id, total_amount_cents, status,
                   receiver_name, receiver_phone, receiver_email, receiver_country,
                   receiver_province, receiver_city, receiver_address, receiver_zip,
                   receiver_remark, paid_at, delivered_at, completed_at, closed_at,
                   created_at, updated_at
            FROM orders
            WHERE order_no = ?
            "#,
        )
        .bind(order_no)
        .fetch_optional(self.pool.as_ref())
        .await?;
        row.map(OrderRow::into_order).transpose()
    }

    async fn find_items(&self, order_no: &str) -> DomainResult<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, order_no, product_item_id, quantity,
                   price_cents, discount_cents, total_amount_cents, created_at
            FROM order_items
            WHERE order_no = ?
            ORDER BY created_at
            "#,
        )
        .bind(order_no)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.into_iter().map(OrderItemRow::into_item).collect())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> DomainResult<(Vec<Order>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(self.pool.as_ref())
            .await?;

        let offset = (page - 1) * page_size;
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, order_no, user_id, total_amount_cents, status,
                   receiver_name, receiver_phone, receiver_email, receiver_country,
                   receiver_province, receiver_city, receiver_address, receiver_zip,
                   receiver_remark, paid_at, delivered_at, completed_at, closed_at,
                   created_at, updated_at
            FROM orders
            WHERE user_id = ?
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(page_size)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        let orders = rows
            .into_iter()
            .map(OrderRow::into_order)
            .collect::<DomainResult<Vec<_>>>()?;
        Ok((orders, total as u64))
    }

    async fn advance_status(&self, order: &Order, target: OrderStatus) -> DomainResult<()> {
        let timestamp_column = match target {
            OrderStatus::Paid => "paid_at",
            OrderStatus::Delivered => "delivered_at",
            OrderStatus::Completed => "completed_at",
            OrderStatus::Closed => "closed_at",
            OrderStatus::Pending => {
                return Err(DomainError::Internal(
                    "pending is never a transition target".into(),
                ))
            }
        };
        let query = format!(
            "UPDATE orders SET status = ?, {timestamp_column} = ?, updated_at = ? WHERE order_no = ?"
        );
        let rows_affected = sqlx::query(&query)
            .bind(target.as_str())
            .bind(order.updated_at)
            .bind(order.updated_at)
            .bind(&order.order_no)
            .execute(self.pool.as_ref())
            .await?
            .rows_affected();
        if rows_affected == 0 {
            return Err(DomainError::not_found("order", &order.order_no));
        }
        debug!(order_no = %order.order_no, status = %target, "order status persisted");
        Ok(())
    }

    async fn delete(&self, order_no: &str) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM order_items WHERE order_no = ?")
            .bind(order_no)
            .execute(&mut *tx)
            .await?;
        let rows_affected = sqlx::query("DELETE FROM orders WHERE order_no = ?")
            .bind(order_no)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if rows_affected == 0 {
            tx.rollback().await?;
            return Err(DomainError::not_found("order", order_no));
        }
        tx.commit().await?;
        debug!(order_no, "order deleted");
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: uuid::Uuid,
    order_no: String,
    user_id: String,
    total_amount_cents: i64,
    status: String,
    receiver_name: String,
    receiver_phone: String,
    receiver_email: String,
    receiver_country: String,
    receiver_province: String,
    receiver_city: String,
    receiver_address: String,
    receiver_zip: String,
    receiver_remark: String,
    paid_at: Option<chrono::DateTime<chrono::Utc>>,
    delivered_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
    closed_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl OrderRow {
    fn into_order(self) -> DomainResult<Order> {
        Ok(Order {
            id: self.id,
            order_no: self.order_no,
            user_id: self.user_id,
            total_amount: Money::from_cents(self.total_amount_cents),
            status: OrderStatus::from_str(&self.status)
                .map_err(|e| DomainError::Internal(format!("corrupt order row: {e}")))?,
            receiver: Receiver {
                name: self.receiver_name,
                phone: self.receiver_phone,
                email: self.receiver_email,
                country: self.receiver_country,
                province: self.receiver_province,
                city: self.receiver_city,
                address: self.receiver_address,
                zip: self.receiver_zip,
                remark: self.receiver_remark,
            },
            paid_at: self.paid_at,
            delivered_at: self.delivered_at,
            completed_at: self.completed_at,
            closed_at: self.closed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: uuid::Uuid,
    order_no: String,
    product_item_id: String,
    quantity: u32,
    price_cents: i64,
    discount_cents: i64,
    total_amount_cents: i64,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl OrderItemRow {
    fn into_item(self) -> OrderItem {
        OrderItem {
            id: self.id,
            order_no: self.order_no,
            product_item_id: self.product_item_id,
            quantity: self.quantity,
            price: Money::from_cents(self.price_cents),
            discount: Money::from_cents(self.discount_cents),
            total_amount: Money::from_cents(self.total_amount_cents),
            created_at: self.created_at,
        }
    }
}
