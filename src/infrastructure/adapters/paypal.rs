use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::money::Money;
use crate::domain::payment::Provider;
use crate::infrastructure::config::PaypalConfig;
use crate::ports::{
    ChargeRequest, NotificationEvent, PaymentGateway, PaymentOutcome, ProviderOrder,
    ProviderConfigStore, RawNotification,
};

/// PayPal REST gateway. Authenticates with a client-credentials bearer
/// token; webhook authenticity is established by asking PayPal itself to
/// verify the transmission signature against the registered webhook id.
pub struct PaypalGateway {
    config_store: Arc<dyn ProviderConfigStore>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl PaypalGateway {
    pub fn new(config_store: Arc<dyn ProviderConfigStore>) -> Self {
        Self {
            config_store,
            client: Client::new(),
        }
    }

    async fn config(&self) -> DomainResult<PaypalConfig> {
        let config = self.config_store.load(Provider::Paypal).await?;
        Ok(config.as_paypal()?.clone())
    }

    async fn access_token(&self, config: &PaypalConfig) -> DomainResult<String> {
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", config.base_url()))
            .basic_auth(&config.client_id, Some(&config.secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "paypal token request rejected");
            return Err(DomainError::ProviderBusiness {
                provider: Provider::Paypal,
                code: status.to_string(),
                message: body,
            });
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    fn required_header<'a>(raw: &'a RawNotification, name: &str) -> DomainResult<&'a str> {
        raw.header(name)
            .ok_or(DomainError::VerificationFailed(Provider::Paypal))
    }
}

#[async_trait]
impl PaymentGateway for PaypalGateway {
    fn provider(&self) -> Provider {
        Provider::Paypal
    }

    async fn create_order(&self, request: &ChargeRequest) -> DomainResult<ProviderOrder> {
        let config = self.config().await?;
        let token = self.access_token(&config).await?;

        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": request.order_no,
                "amount": {
                    "currency_code": request.currency,
                    "value": request.amount.to_decimal_string(),
                },
            }],
            "payment_source": {
                "paypal": {
                    "experience_context": {
                        "shipping_preference": "NO_SHIPPING",
                        "user_action": "PAY_NOW",
                    }
                }
            },
        });

        debug!(order_no = %request.order_no, "sending paypal order");
        let response = self
            .client
            .post(format!("{}/v2/checkout/orders", config.base_url()))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: serde_json::Value = response.json().await?;
        if !status.is_success() {
            warn!(%status, "paypal rejected order creation");
            return Err(DomainError::ProviderBusiness {
                provider: Provider::Paypal,
                code: payload["name"].as_str().unwrap_or("HTTP_ERROR").to_string(),
                message: payload["message"].as_str().unwrap_or_default().to_string(),
            });
        }

        let provider_ref = payload["id"]
            .as_str()
            .ok_or_else(|| DomainError::ProviderBusiness {
                provider: Provider::Paypal,
                code: "MALFORMED_RESPONSE".into(),
                message: "missing order id".into(),
            })?
            .to_string();
        let provider_status = payload["status"].as_str().unwrap_or_default().to_string();

        Ok(ProviderOrder {
            provider_ref,
            provider_status,
            raw: payload,
        })
    }

    async fn verify_notification(
        &self,
        raw: &RawNotification,
    ) -> DomainResult<NotificationEvent> {
        let config = self.config().await?;
        let token = self.access_token(&config).await?;

        let event: serde_json::Value = serde_json::from_str(&raw.body)
            .map_err(|e| DomainError::Validation(format!("bad paypal webhook body: {e}")))?;

        let verify_body = json!({
            "auth_algo": Self::required_header(raw, "paypal-auth-algo")?,
            "cert_url": Self::required_header(raw, "paypal-cert-url")?,
            "transmission_id": Self::required_header(raw, "paypal-transmission-id")?,
            "transmission_sig": Self::required_header(raw, "paypal-transmission-sig")?,
            "transmission_time": Self::required_header(raw, "paypal-transmission-time")?,
            "webhook_id": config.webhook_id,
            "webhook_event": event,
        });

        let response = self
            .client
            .post(format!(
                "{}/v1/notifications/verify-webhook-signature",
                config.base_url()
            ))
            .bearer_auth(&token)
            .json(&verify_body)
            .send()
            .await?;
        let verdict: serde_json::Value = response.json().await?;
        if verdict["verification_status"].as_str() != Some("SUCCESS") {
            warn!("paypal webhook signature did not verify");
            return Err(DomainError::VerificationFailed(Provider::Paypal));
        }

        let event: serde_json::Value = serde_json::from_str(&raw.body)?;
        let event_type = event["event_type"].as_str().unwrap_or_default();
        let outcome = match event_type {
            "PAYMENT.CAPTURE.COMPLETED" | "CHECKOUT.ORDER.APPROVED" => PaymentOutcome::Paid,
            "PAYMENT.CAPTURE.DENIED" | "CHECKOUT.ORDER.VOIDED" => PaymentOutcome::Canceled,
            other => {
                return Err(DomainError::Validation(format!(
                    "unhandled paypal event type: {other}"
                )))
            }
        };

        let resource = &event["resource"];
        // Capture events carry the checkout order id in
        // supplementary_data; approval events carry it as the resource id.
        let provider_ref = resource["supplementary_data"]["related_ids"]["order_id"]
            .as_str()
            .or(resource["id"].as_str())
            .map(String::from);
        let order_no = resource["purchase_units"][0]["reference_id"]
            .as_str()
            .map(String::from);
        let amount = match resource["amount"]["value"]
            .as_str()
            .or(resource["purchase_units"][0]["amount"]["value"].as_str())
        {
            Some(v) => Some(Money::parse_decimal(v)?),
            None => None,
        };

        Ok(NotificationEvent {
            provider: Provider::Paypal,
            order_no,
            provider_ref,
            outcome,
            amount,
            provider_status: event_type.to_string(),
        })
    }
}
