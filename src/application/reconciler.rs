use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::order::OrderStatus;
use crate::domain::payment::{Payment, PaymentStatus, Provider};
use crate::ports::{
    GatewayRegistry, NotificationEvent, OrderRepository, PaymentOutcome, PaymentRepository,
    RawNotification,
};

/// What a handled notification amounted to. Terminal repeats are reported
/// separately so callback endpoints can still acknowledge provider
/// retries without re-applying anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// This delivery settled the payment as paid (and advanced the order).
    Settled,
    /// This delivery settled the payment as canceled.
    Canceled,
    /// The payment was already terminal; nothing changed. Acknowledge so
    /// the provider stops retrying.
    AlreadySettled,
}

/// Applies verified provider notifications to the ledger and the order,
/// idempotently. Providers redeliver unacknowledged notifications on a
/// long backoff schedule (roughly 8 times over ~25 hours), so the same
/// event arriving twice, including concurrently, must be safe.
pub struct NotificationReconciler {
    gateways: Arc<GatewayRegistry>,
    payments: Arc<dyn PaymentRepository>,
    orders: Arc<dyn OrderRepository>,
}

impl NotificationReconciler {
    pub fn new(
        gateways: Arc<GatewayRegistry>,
        payments: Arc<dyn PaymentRepository>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        Self {
            gateways,
            payments,
            orders,
        }
    }

    pub async fn handle(
        &self,
        provider: Provider,
        raw: &RawNotification,
    ) -> DomainResult<ReconcileOutcome> {
        // 1. Authenticate. A failed signature never touches state; the
        // rejection is security-relevant and logged as such by the caller
        // of verify (adapters warn with provider detail).
        let gateway = self.gateways.get(provider)?;
        let event = gateway.verify_notification(raw).await.map_err(|e| {
            if matches!(e, DomainError::VerificationFailed(_)) {
                warn!(provider = %provider, "rejected unauthentic notification");
            }
            e
        })?;

        // 2. Locate the payment. Unsolicited notifications never create one.
        let payment = self.find_payment(&event).await?;

        // 3. Terminal payments make redelivery a no-op.
        if payment.status.is_terminal() {
            info!(
                payment_id = %payment.id,
                status = %payment.status,
                "duplicate notification for settled payment"
            );
            return Ok(ReconcileOutcome::AlreadySettled);
        }

        // 4. A same-reference notification reporting a different amount is
        // rejected outright, never reconciled.
        if let Some(amount) = event.amount {
            if amount != payment.amount {
                warn!(
                    payment_id = %payment.id,
                    expected = %payment.amount,
                    reported = %amount,
                    "notification amount disagrees with ledger"
                );
                return Err(DomainError::AmountMismatch {
                    expected: payment.amount.to_decimal_string(),
                    actual: amount.to_decimal_string(),
                });
            }
        }

        // 5. Settle via conditional update; losing the race to a
        // concurrent delivery degrades to the no-op case.
        let target = match event.outcome {
            PaymentOutcome::Paid => PaymentStatus::Paid,
            PaymentOutcome::Canceled => PaymentStatus::Canceled,
        };
        let won = self
            .payments
            .settle(payment.id, target, &event.provider_status)
            .await?;
        if !won {
            info!(payment_id = %payment.id, "lost settlement race, treating as duplicate");
            return Ok(ReconcileOutcome::AlreadySettled);
        }

        match event.outcome {
            PaymentOutcome::Paid => {
                self.advance_order_paid(&payment.order_no).await?;
                info!(
                    payment_id = %payment.id,
                    order_no = %payment.order_no,
                    "payment settled as paid"
                );
                Ok(ReconcileOutcome::Settled)
            }
            PaymentOutcome::Canceled => {
                info!(payment_id = %payment.id, "payment settled as canceled");
                Ok(ReconcileOutcome::Canceled)
            }
        }
    }

    async fn find_payment(&self, event: &NotificationEvent) -> DomainResult<Payment> {
        if let Some(provider_ref) = &event.provider_ref {
            if let Some(payment) = self
                .payments
                .find_by_channel_order_no(event.provider, provider_ref)
                .await?
            {
                return Ok(payment);
            }
        }
        if let Some(order_no) = &event.order_no {
            if let Some(payment) = self
                .payments
                .find_pending_by_order_no(event.provider, order_no)
                .await?
            {
                return Ok(payment);
            }
        }
        Err(DomainError::not_found(
            "payment",
            event
                .provider_ref
                .as_deref()
                .or(event.order_no.as_deref())
                .unwrap_or("<unreferenced>"),
        ))
    }

    /// The payment reaching paid is what moves the order to paid; the
    /// order may already be paid if an earlier attempt settled first.
    async fn advance_order_paid(&self, order_no: &str) -> DomainResult<()> {
        let mut order = self
            .orders
            .find_by_order_no(order_no)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_no))?;
        if order.status != OrderStatus::Pending {
            info!(order_no, status = %order.status, "order already past pending");
            return Ok(());
        }
        order.advance(OrderStatus::Paid)?;
        self.orders.advance_status(&order, OrderStatus::Paid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{
        seeded_order, seeded_payment, InMemoryOrders, InMemoryPayments, StubGateway,
    };
    use crate::domain::money::Money;

    struct Fixture {
        orders: Arc<InMemoryOrders>,
        payments: Arc<InMemoryPayments>,
        order_no: String,
    }

    impl Fixture {
        fn reconciler(&self, gateway: StubGateway) -> NotificationReconciler {
            let registry = Arc::new(GatewayRegistry::new().register(Arc::new(gateway)));
            NotificationReconciler::new(registry, self.payments.clone(), self.orders.clone())
        }
    }

    async fn fixture() -> Fixture {
        let orders = Arc::new(InMemoryOrders::default());
        let order_no = seeded_order(&orders, "user-1", Money::from_major(35)).await;
        let payments = Arc::new(InMemoryPayments::default());
        seeded_payment(
            &payments,
            &order_no,
            "user-1",
            Money::from_major(35),
            Provider::Alipay,
            "PROV-REF-1",
        )
        .await;
        Fixture {
            orders,
            payments,
            order_no,
        }
    }

    fn paid_event(order_no: &str) -> NotificationEvent {
        NotificationEvent {
            provider: Provider::Alipay,
            order_no: Some(order_no.to_string()),
            provider_ref: Some("PROV-REF-1".to_string()),
            outcome: PaymentOutcome::Paid,
            amount: Some(Money::from_major(35)),
            provider_status: "TRADE_SUCCESS".to_string(),
        }
    }

    #[tokio::test]
    async fn paid_notification_settles_payment_and_order() {
        let fx = fixture().await;
        let event = paid_event(&fx.order_no);
        let reconciler = fx.reconciler(StubGateway::verifying(Provider::Alipay, event));

        let outcome = reconciler
            .handle(Provider::Alipay, &RawNotification::default())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Settled);

        let payment = fx
            .payments
            .find_by_channel_order_no(Provider::Alipay, "PROV-REF-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Paid);

        let order = fx
            .orders
            .find_by_order_no(&fx.order_no)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert!(order.paid_at.is_some());
    }

    #[tokio::test]
    async fn redelivery_is_a_no_op() {
        let fx = fixture().await;
        let event = paid_event(&fx.order_no);
        let reconciler = fx.reconciler(StubGateway::verifying(Provider::Alipay, event));

        let first = reconciler
            .handle(Provider::Alipay, &RawNotification::default())
            .await
            .unwrap();
        let second = reconciler
            .handle(Provider::Alipay, &RawNotification::default())
            .await
            .unwrap();
        assert_eq!(first, ReconcileOutcome::Settled);
        assert_eq!(second, ReconcileOutcome::AlreadySettled);

        let order = fx
            .orders
            .find_by_order_no(&fx.order_no)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn failed_verification_changes_nothing() {
        let fx = fixture().await;
        let reconciler = fx.reconciler(StubGateway::failing_verification(Provider::Alipay));

        let err = reconciler
            .handle(Provider::Alipay, &RawNotification::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::VerificationFailed(_)));

        let payment = fx
            .payments
            .find_by_channel_order_no(Provider::Alipay, "PROV-REF-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        let order = fx
            .orders
            .find_by_order_no(&fx.order_no)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn unsolicited_notification_creates_nothing() {
        let fx = fixture().await;
        let mut event = paid_event(&fx.order_no);
        event.provider_ref = Some("UNKNOWN-REF".to_string());
        event.order_no = Some("unknown-order".to_string());
        let reconciler = fx.reconciler(StubGateway::verifying(Provider::Alipay, event));

        let err = reconciler
            .handle(Provider::Alipay, &RawNotification::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert_eq!(fx.payments.count(), 1);
    }

    #[tokio::test]
    async fn amount_mismatch_rejected() {
        let fx = fixture().await;
        let mut event = paid_event(&fx.order_no);
        event.amount = Some(Money::from_major(1));
        let reconciler = fx.reconciler(StubGateway::verifying(Provider::Alipay, event));

        let err = reconciler
            .handle(Provider::Alipay, &RawNotification::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AmountMismatch { .. }));

        let payment = fx
            .payments
            .find_by_channel_order_no(Provider::Alipay, "PROV-REF-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn canceled_notification_settles_without_paying_order() {
        let fx = fixture().await;
        let mut event = paid_event(&fx.order_no);
        event.outcome = PaymentOutcome::Canceled;
        event.provider_status = "TRADE_CLOSED".to_string();
        let reconciler = fx.reconciler(StubGateway::verifying(Provider::Alipay, event));

        let outcome = reconciler
            .handle(Provider::Alipay, &RawNotification::default())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Canceled);

        let payment = fx
            .payments
            .find_by_channel_order_no(Provider::Alipay, "PROV-REF-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Canceled);
        let order = fx
            .orders
            .find_by_order_no(&fx.order_no)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn concurrent_deliveries_settle_exactly_once() {
        let fx = fixture().await;
        let event = paid_event(&fx.order_no);
        let reconciler = Arc::new(fx.reconciler(StubGateway::verifying(Provider::Alipay, event)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let reconciler = reconciler.clone();
            handles.push(tokio::spawn(async move {
                reconciler
                    .handle(Provider::Alipay, &RawNotification::default())
                    .await
            }));
        }
        let mut settled = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                ReconcileOutcome::Settled => settled += 1,
                ReconcileOutcome::AlreadySettled => duplicates += 1,
                ReconcileOutcome::Canceled => panic!("unexpected cancel"),
            }
        }
        assert_eq!(settled, 1);
        assert_eq!(duplicates, 7);
    }
}
