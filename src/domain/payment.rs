use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::money::Money;

/// Supported payment providers. Provider selection is always a registry
/// lookup keyed by this enum, never a type check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Alipay,
    Wechat,
    Paypal,
}

impl Provider {
    pub fn as_code(&self) -> &'static str {
        match self {
            Provider::Alipay => "alipay",
            Provider::Wechat => "wechat",
            Provider::Paypal => "paypal",
        }
    }

    pub fn from_code(code: &str) -> DomainResult<Self> {
        match code {
            "alipay" => Ok(Provider::Alipay),
            "wechat" => Ok(Provider::Wechat),
            "paypal" => Ok(Provider::Paypal),
            other => Err(DomainError::not_found("payment method", other)),
        }
    }

    pub fn all() -> [Provider; 3] {
        [Provider::Alipay, Provider::Wechat, Provider::Paypal]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Canonical payment status. Only `Pending -> Paid` and
/// `Pending -> Canceled` are legal; terminal states never move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> DomainResult<Self> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "canceled" => Ok(PaymentStatus::Canceled),
            other => Err(DomainError::Validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Canceled)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt to collect funds for an order through a specific provider.
/// Created once per attempt, updated in place by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_no: String,
    pub user_id: String,

    /// Must equal the referenced order's total at creation.
    pub amount: Money,

    pub provider: Provider,

    /// Client surface, e.g. "web".
    pub channel: String,

    /// Provider-assigned order reference.
    pub channel_order_no: Option<String>,

    /// Provider-reported status string. Opaque passthrough for audit only,
    /// never used for business decisions.
    pub channel_status: Option<String>,

    /// Raw provider response snapshot for audit/debug.
    pub channel_data: Option<serde_json::Value>,

    pub status: PaymentStatus,

    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        order_no: String,
        user_id: String,
        amount: Money,
        provider: Provider,
        channel: String,
    ) -> DomainResult<Self> {
        if !amount.is_positive() {
            return Err(DomainError::Validation(
                "payment amount must be greater than zero".into(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            order_no,
            user_id,
            amount,
            provider,
            channel,
            channel_order_no: None,
            channel_status: None,
            channel_data: None,
            status: PaymentStatus::Pending,
            paid_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn require_pending(&self, to: PaymentStatus) -> DomainResult<()> {
        if self.status != PaymentStatus::Pending {
            return Err(DomainError::InvalidTransition {
                entity: "payment",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    pub fn mark_paid(&mut self) -> DomainResult<()> {
        self.require_pending(PaymentStatus::Paid)?;
        self.status = PaymentStatus::Paid;
        self.paid_at = Some(Utc::now());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_canceled(&mut self) -> DomainResult<()> {
        self.require_pending(PaymentStatus::Canceled)?;
        self.status = PaymentStatus::Canceled;
        self.updated_at = Utc::now();
        Ok(())
    }
}
