use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::errors::DomainResult;
use crate::domain::money::Money;
use crate::domain::payment::Provider;

/// Outbound "collect payment" request, provider-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub order_no: String,
    pub currency: String,
    pub amount: Money,
    pub description: String,
}

/// What the provider handed back for a charge request. `raw` is kept
/// verbatim for the ledger's audit snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOrder {
    /// Provider-assigned order reference (channel order no).
    pub provider_ref: String,
    /// Provider-reported status string, opaque passthrough.
    pub provider_status: String,
    pub raw: serde_json::Value,
}

/// An inbound callback exactly as it arrived. Providers disagree on
/// encoding (form body, JSON body, signature headers), so adapters get the
/// raw surface and do their own parsing.
#[derive(Debug, Clone, Default)]
pub struct RawNotification {
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RawNotification {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Business-meaningful outcome of a verified notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Paid,
    Canceled,
}

/// Canonical event produced by `verify_notification`, and only after
/// authenticity verification succeeded.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub provider: Provider,
    /// Our order number, when the provider echoes it.
    pub order_no: Option<String>,
    /// The provider's own reference for the charge.
    pub provider_ref: Option<String>,
    pub outcome: PaymentOutcome,
    /// Provider-reported amount, when present; checked against the ledger.
    pub amount: Option<Money>,
    /// Provider-reported status string, passed through for audit.
    pub provider_status: String,
}

/// Uniform per-provider capability: collect payment, verify callbacks.
/// Implementations hide provider-specific wire shapes and credentials;
/// callers depend on nothing else.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> Provider;

    /// Issues the provider-specific collect-payment request. Provider
    /// business rejections surface as `ProviderBusiness`, transport
    /// failures as `ProviderTransport`; neither commits any state.
    async fn create_order(&self, request: &ChargeRequest) -> DomainResult<ProviderOrder>;

    /// Parses and authenticates an inbound callback. Returns an event only
    /// if the signature verifies; a bad signature is `VerificationFailed`
    /// and must never lead to a state change.
    async fn verify_notification(
        &self,
        raw: &RawNotification,
    ) -> DomainResult<NotificationEvent>;
}

/// Provider-keyed registry of gateways. Selection is a lookup by provider
/// code; callers never branch on concrete adapter types.
#[derive(Default)]
pub struct GatewayRegistry {
    gateways: HashMap<Provider, std::sync::Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, gateway: std::sync::Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(gateway.provider(), gateway);
        self
    }

    pub fn get(&self, provider: Provider) -> DomainResult<std::sync::Arc<dyn PaymentGateway>> {
        self.gateways
            .get(&provider)
            .cloned()
            .ok_or_else(|| crate::domain::errors::DomainError::not_found(
                "payment method",
                provider.as_code(),
            ))
    }
}
