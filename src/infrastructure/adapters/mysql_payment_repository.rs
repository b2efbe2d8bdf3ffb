use async_trait::async_trait;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::money::Money;
use crate::domain::payment::{Payment, PaymentStatus, Provider};
use crate::ports::PaymentRepository;

const SELECT_COLUMNS: &str = r#"
    SELECT id, order_no, user_id, amount_cents, method, channel,
           channel_order_no, channel_status, channel_data, status,
           paid_at, created_at, updated_at
    FROM payments
"#;

/// MySQL-backed payment ledger.
#[derive(Clone)]
pub struct MySqlPaymentRepository {
    pool: Arc<Pool<MySql>>,
}

impl MySqlPaymentRepository {
    pub fn new(pool: Arc<Pool<MySql>>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for MySqlPaymentRepository {
    async fn create(&self, payment: &Payment) -> DomainResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_no, user_id, amount_cents, method, channel,
                channel_order_no, channel_status, channel_data, status,
                paid_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id)
        .bind(&payment.order_no)
        .bind(&payment.user_id)
        .bind(payment.amount.to_cents())
        .bind(payment.provider.as_code())
        .bind(&payment.channel)
        .bind(&payment.channel_order_no)
        .bind(&payment.channel_status)
        .bind(&payment.channel_data)
        .bind(payment.status.as_str())
        .bind(payment.paid_at)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(self.pool.as_ref())
        .await?;
        debug!(payment_id = %payment.id, "payment persisted");
        Ok(())
    }

    async fn find_by_channel_order_no(
        &self,
        provider: Provider,
        channel_order_no: &str,
    ) -> DomainResult<Option<Payment>> {
        let query = format!("{SELECT_COLUMNS} WHERE method = ? AND channel_order_no = ?");
        let row = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(provider.as_code())
            .bind(channel_order_no)
            .fetch_optional(self.pool.as_ref())
            .await?;
        row.map(PaymentRow::into_payment).transpose()
    }

    async fn find_pending_by_order_no(
        &self,
        provider: Provider,
        order_no: &str,
    ) -> DomainResult<Option<Payment>> {
        let query = format!(
            "{SELECT_COLUMNS} WHERE method = ? AND order_no = ? AND status = 'pending' ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(provider.as_code())
            .bind(order_no)
            .fetch_optional(self.pool.as_ref())
            .await?;
        row.map(PaymentRow::into_payment).transpose()
    }

    /// Compare-and-set settlement: the WHERE clause only matches while
    /// the row is still pending, so concurrent redeliveries cannot both
    /// win. Returns whether this call performed the transition.
    async fn settle(
        &self,
        payment_id: uuid::Uuid,
        target: PaymentStatus,
        channel_status: &str,
    ) -> DomainResult<bool> {
        if !target.is_terminal() {
            return Err(DomainError::Internal(
                "settle target must be terminal".into(),
            ));
        }
        let now = chrono::Utc::now();
        let paid_at = (target == PaymentStatus::Paid).then_some(now);
        let rows_affected = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?, channel_status = ?, paid_at = COALESCE(?, paid_at), updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(target.as_str())
        .bind(channel_status)
        .bind(paid_at)
        .bind(now)
        .bind(payment_id)
        .execute(self.pool.as_ref())
        .await?
        .rows_affected();
        debug!(payment_id = %payment_id, status = %target, won = rows_affected > 0, "settle attempted");
        Ok(rows_affected > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: uuid::Uuid,
    order_no: String,
    user_id: String,
    amount_cents: i64,
    method: String,
    channel: String,
    channel_order_no: Option<String>,
    channel_status: Option<String>,
    channel_data: Option<serde_json::Value>,
    status: String,
    paid_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> DomainResult<Payment> {
        Ok(Payment {
            id: self.id,
            order_no: self.order_no,
            user_id: self.user_id,
            amount: Money::from_cents(self.amount_cents),
            provider: Provider::from_code(&self.method)
                .map_err(|e| DomainError::Internal(format!("corrupt payment row: {e}")))?,
            channel: self.channel,
            channel_order_no: self.channel_order_no,
            channel_status: self.channel_status,
            channel_data: self.channel_data,
            status: PaymentStatus::from_str(&self.status)
                .map_err(|e| DomainError::Internal(format!("corrupt payment row: {e}")))?,
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
