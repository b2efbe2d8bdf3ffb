use std::sync::Arc;
use tracing::info;

use crate::application::dto::{CreatePaymentRequest, PaymentView};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::payment::{Payment, Provider};
use crate::ports::{ChargeRequest, GatewayRegistry, OrderRepository, PaymentRepository};

const CHANNEL_WEB: &str = "web";

/// Initiates provider payments for existing orders: one ledger row per
/// attempt, amount pinned to the order total.
pub struct CheckoutService {
    gateways: Arc<GatewayRegistry>,
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
}

impl CheckoutService {
    pub fn new(
        gateways: Arc<GatewayRegistry>,
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
    ) -> Self {
        Self {
            gateways,
            orders,
            payments,
        }
    }

    /// Creates a provider payment for `request.order_no`. The order must
    /// exist and belong to `user_id`; the charge amount is always the
    /// order's stored total, never anything client-supplied.
    pub async fn create_payment(
        &self,
        user_id: &str,
        provider: Provider,
        request: CreatePaymentRequest,
    ) -> DomainResult<PaymentView> {
        let order = self
            .orders
            .find_by_order_no(&request.order_no)
            .await?
            .ok_or_else(|| DomainError::not_found("order", &request.order_no))?;
        if order.user_id != user_id {
            return Err(DomainError::not_found("order", &request.order_no));
        }

        let gateway = self.gateways.get(provider)?;
        let charge = ChargeRequest {
            order_no: order.order_no.clone(),
            currency: request.currency,
            amount: order.total_amount,
            description: order.order_no.clone(),
        };
        let provider_order = gateway.create_order(&charge).await?;

        let mut payment = Payment::new(
            order.order_no.clone(),
            user_id.to_string(),
            order.total_amount,
            provider,
            CHANNEL_WEB.to_string(),
        )?;
        // Ledger precondition: the payment amount must equal the order
        // total. Payment::new received the total directly, but the check
        // stays explicit so a future caller cannot drift.
        if payment.amount != order.total_amount {
            return Err(DomainError::AmountMismatch {
                expected: order.total_amount.to_decimal_string(),
                actual: payment.amount.to_decimal_string(),
            });
        }
        payment.channel_order_no = Some(provider_order.provider_ref.clone());
        payment.channel_status = Some(provider_order.provider_status.clone());
        payment.channel_data = Some(provider_order.raw.clone());

        self.payments.create(&payment).await?;
        info!(
            order_no = %payment.order_no,
            provider = %provider,
            provider_ref = %provider_order.provider_ref,
            "payment created"
        );

        Ok(PaymentView {
            payment_id: payment.id,
            order_no: payment.order_no,
            provider: provider.as_code().to_string(),
            amount: payment.amount,
            status: payment.status.to_string(),
            channel_order_no: payment.channel_order_no,
            channel_status: payment.channel_status,
            channel_data: payment.channel_data,
        })
    }
}
