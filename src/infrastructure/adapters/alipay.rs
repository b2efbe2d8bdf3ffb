use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::Utc;
use rand::rngs::OsRng;
use reqwest::Client;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::money::Money;
use crate::domain::payment::Provider;
use crate::infrastructure::config::AlipayConfig;
use crate::ports::{
    ChargeRequest, NotificationEvent, PaymentGateway, PaymentOutcome, ProviderOrder,
    ProviderConfigStore, RawNotification,
};

/// Alipay gateway. Outbound requests are form-encoded and RSA2-signed
/// with the application private key; inbound notify callbacks are
/// verified against the configured Alipay public key (cert mode).
pub struct AlipayGateway {
    config_store: Arc<dyn ProviderConfigStore>,
    client: Client,
}

impl AlipayGateway {
    pub fn new(config_store: Arc<dyn ProviderConfigStore>) -> Self {
        Self {
            config_store,
            client: Client::new(),
        }
    }

    async fn config(&self) -> DomainResult<AlipayConfig> {
        let config = self.config_store.load(Provider::Alipay).await?;
        Ok(config.as_alipay()?.clone())
    }

    /// Alipay's canonical signing string: keys sorted ascending,
    /// `sign`/`sign_type` excluded, empty values skipped, joined with `&`.
    fn canonical_string(params: &BTreeMap<String, String>) -> String {
        params
            .iter()
            .filter(|(k, v)| k.as_str() != "sign" && k.as_str() != "sign_type" && !v.is_empty())
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn sign(message: &str, private_key_pem: &str) -> DomainResult<String> {
        let key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .map_err(|e| DomainError::Crypto(format!("failed to load alipay private key: {e}")))?;
        let signing_key = SigningKey::<Sha256>::new(key);
        let signature = signing_key.sign_with_rng(&mut OsRng, message.as_bytes());
        Ok(B64.encode(signature.to_bytes()))
    }

    fn verify_sign(message: &str, signature_b64: &str, public_key_pem: &str) -> DomainResult<()> {
        let key = RsaPublicKey::from_public_key_pem(public_key_pem)
            .map_err(|e| DomainError::Crypto(format!("failed to load alipay public key: {e}")))?;
        let verifying_key = VerifyingKey::<Sha256>::new(key);
        let signature_bytes = B64
            .decode(signature_b64)
            .map_err(|_| DomainError::VerificationFailed(Provider::Alipay))?;
        let signature = Signature::try_from(signature_bytes.as_slice())
            .map_err(|_| DomainError::VerificationFailed(Provider::Alipay))?;
        verifying_key
            .verify(message.as_bytes(), &signature)
            .map_err(|_| DomainError::VerificationFailed(Provider::Alipay))
    }
}

#[async_trait]
impl PaymentGateway for AlipayGateway {
    fn provider(&self) -> Provider {
        Provider::Alipay
    }

    async fn create_order(&self, request: &ChargeRequest) -> DomainResult<ProviderOrder> {
        let config = self.config().await?;

        let biz_content = serde_json::json!({
            "out_trade_no": request.order_no,
            "total_amount": request.amount.to_decimal_string(),
            "subject": request.description,
        })
        .to_string();

        let mut params = BTreeMap::new();
        params.insert("app_id".to_string(), config.app_id.clone());
        params.insert("method".to_string(), "alipay.trade.precreate".to_string());
        params.insert("format".to_string(), "JSON".to_string());
        params.insert("charset".to_string(), "utf-8".to_string());
        params.insert("sign_type".to_string(), "RSA2".to_string());
        params.insert(
            "timestamp".to_string(),
            Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        params.insert("version".to_string(), "1.0".to_string());
        params.insert(
            "notify_url".to_string(),
            format!(
                "{}/api/v1/alipay/notify",
                std::env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".into())
            ),
        );
        params.insert("biz_content".to_string(), biz_content);

        let sign = Self::sign(&Self::canonical_string(&params), &config.app_private_key)?;
        params.insert("sign".to_string(), sign);

        debug!(order_no = %request.order_no, "sending alipay precreate");
        let response = self
            .client
            .post(config.gateway_url())
            .form(&params)
            .send()
            .await?;
        let body: serde_json::Value = response.json().await?;

        // The payload sits under `alipay_trade_precreate_response`.
        let inner = body
            .get("alipay_trade_precreate_response")
            .ok_or_else(|| DomainError::ProviderBusiness {
                provider: Provider::Alipay,
                code: "MALFORMED_RESPONSE".into(),
                message: body.to_string(),
            })?;
        let code = inner["code"].as_str().unwrap_or_default();
        if code != "10000" {
            warn!(code, "alipay rejected precreate");
            return Err(DomainError::ProviderBusiness {
                provider: Provider::Alipay,
                code: code.to_string(),
                message: inner["sub_msg"]
                    .as_str()
                    .or(inner["msg"].as_str())
                    .unwrap_or_default()
                    .to_string(),
            });
        }

        Ok(ProviderOrder {
            // Alipay assigns its trade_no at payment time; the precreate
            // response echoes our out_trade_no as the reference.
            provider_ref: inner["out_trade_no"]
                .as_str()
                .unwrap_or(&request.order_no)
                .to_string(),
            provider_status: "WAIT_BUYER_PAY".to_string(),
            raw: inner.clone(),
        })
    }

    async fn verify_notification(
        &self,
        raw: &RawNotification,
    ) -> DomainResult<NotificationEvent> {
        let config = self.config().await?;

        // Notify bodies are form-encoded.
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(&raw.body)
            .map_err(|e| DomainError::Validation(format!("bad alipay notify body: {e}")))?;
        let params: BTreeMap<String, String> = pairs.into_iter().collect();

        let signature = params
            .get("sign")
            .ok_or(DomainError::VerificationFailed(Provider::Alipay))?;
        let message = Self::canonical_string(&params);
        if let Err(e) = Self::verify_sign(&message, signature, &config.alipay_public_cert) {
            warn!("alipay notify signature did not verify");
            return Err(e);
        }

        let trade_status = params
            .get("trade_status")
            .map(String::as_str)
            .unwrap_or_default();
        let outcome = match trade_status {
            "TRADE_SUCCESS" | "TRADE_FINISHED" => PaymentOutcome::Paid,
            "TRADE_CLOSED" => PaymentOutcome::Canceled,
            other => {
                return Err(DomainError::Validation(format!(
                    "unhandled alipay trade_status: {other}"
                )))
            }
        };

        let amount = match params.get("total_amount") {
            Some(s) => Some(Money::parse_decimal(s)?),
            None => None,
        };

        Ok(NotificationEvent {
            provider: Provider::Alipay,
            order_no: params.get("out_trade_no").cloned(),
            provider_ref: params.get("trade_no").cloned(),
            outcome,
            amount,
            provider_status: trade_status.to_string(),
        })
    }
}
