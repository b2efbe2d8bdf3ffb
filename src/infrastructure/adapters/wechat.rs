use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use rand::rngs::OsRng;
use reqwest::Client;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::money::Money;
use crate::domain::payment::Provider;
use crate::infrastructure::config::WechatConfig;
use crate::ports::{
    ChargeRequest, NotificationEvent, PaymentGateway, PaymentOutcome, ProviderOrder,
    ProviderConfigStore, RawNotification,
};

/// WeChat Pay v3 gateway. Outbound requests carry the merchant-key
/// Authorization header; inbound notifies are RSA-verified against the
/// platform public key and their resource decrypted with the APIv3 key.
pub struct WechatGateway {
    config_store: Arc<dyn ProviderConfigStore>,
    client: Client,
}

/// Notify envelope (v3): the interesting part is AES-GCM encrypted.
#[derive(Debug, Deserialize)]
struct NotifyEnvelope {
    event_type: String,
    resource: NotifyResource,
}

#[derive(Debug, Deserialize)]
struct NotifyResource {
    ciphertext: String,
    nonce: String,
    associated_data: Option<String>,
}

impl WechatGateway {
    pub fn new(config_store: Arc<dyn ProviderConfigStore>) -> Self {
        Self {
            config_store,
            client: Client::new(),
        }
    }

    async fn config(&self) -> DomainResult<WechatConfig> {
        let config = self.config_store.load(Provider::Wechat).await?;
        Ok(config.as_wechat()?.clone())
    }

    /// Request signature for the Authorization header:
    /// `METHOD\nPATH\nTIMESTAMP\nNONCE\nBODY\n` signed RSA-SHA256.
    fn build_authorization(
        config: &WechatConfig,
        method: &str,
        path: &str,
        body: &str,
    ) -> DomainResult<String> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let nonce = Uuid::new_v4().simple().to_string();
        let message = format!("{method}\n{path}\n{timestamp}\n{nonce}\n{body}\n");

        let key = RsaPrivateKey::from_pkcs8_pem(&config.private_key)
            .map_err(|e| DomainError::Crypto(format!("failed to load wechat private key: {e}")))?;
        let signing_key = SigningKey::<Sha256>::new(key);
        let signature = signing_key.sign_with_rng(&mut OsRng, message.as_bytes());
        let signature = B64.encode(signature.to_bytes());

        Ok(format!(
            "WECHATPAY2-SHA256-RSA2048 mchid=\"{}\",nonce_str=\"{}\",timestamp=\"{}\",serial_no=\"{}\",signature=\"{}\"",
            config.mchid, nonce, timestamp, config.serial_no, signature
        ))
    }

    /// Notify signature check: `timestamp\nnonce\nbody\n` against the
    /// platform public key, signature from the Wechatpay-Signature header.
    fn verify_headers(
        config: &WechatConfig,
        raw: &RawNotification,
    ) -> DomainResult<()> {
        let timestamp = raw
            .header("wechatpay-timestamp")
            .ok_or(DomainError::VerificationFailed(Provider::Wechat))?;
        let nonce = raw
            .header("wechatpay-nonce")
            .ok_or(DomainError::VerificationFailed(Provider::Wechat))?;
        let signature_b64 = raw
            .header("wechatpay-signature")
            .ok_or(DomainError::VerificationFailed(Provider::Wechat))?;

        let message = format!("{timestamp}\n{nonce}\n{}\n", raw.body);
        let key = RsaPublicKey::from_public_key_pem(&config.platform_public_key)
            .map_err(|e| DomainError::Crypto(format!("failed to load wechat platform key: {e}")))?;
        let verifying_key = VerifyingKey::<Sha256>::new(key);
        let signature_bytes = B64
            .decode(signature_b64)
            .map_err(|_| DomainError::VerificationFailed(Provider::Wechat))?;
        let signature = Signature::try_from(signature_bytes.as_slice())
            .map_err(|_| DomainError::VerificationFailed(Provider::Wechat))?;
        verifying_key
            .verify(message.as_bytes(), &signature)
            .map_err(|_| DomainError::VerificationFailed(Provider::Wechat))
    }

    /// AES-256-GCM resource decryption with the APIv3 key; the
    /// associated_data field is honored as the aad.
    fn decrypt_resource(config: &WechatConfig, resource: &NotifyResource) -> DomainResult<String> {
        let cipher = Aes256Gcm::new_from_slice(config.api_v3_key.as_bytes())
            .map_err(|e| DomainError::Crypto(format!("bad apiv3 key: {e}")))?;
        let ciphertext = B64
            .decode(&resource.ciphertext)
            .map_err(|e| DomainError::Crypto(format!("bad resource ciphertext: {e}")))?;
        let nonce = Nonce::from_slice(resource.nonce.as_bytes());
        let aad = resource.associated_data.as_deref().unwrap_or("");
        let plaintext = cipher
            .decrypt(
                nonce,
                Payload {
                    msg: &ciphertext,
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|_| DomainError::Crypto("resource decryption failed".into()))?;
        String::from_utf8(plaintext)
            .map_err(|e| DomainError::Crypto(format!("resource is not utf-8: {e}")))
    }
}

#[async_trait]
impl PaymentGateway for WechatGateway {
    fn provider(&self) -> Provider {
        Provider::Wechat
    }

    async fn create_order(&self, request: &ChargeRequest) -> DomainResult<ProviderOrder> {
        let config = self.config().await?;
        let path = "/v3/pay/transactions/native";
        let url = format!("{}{}", config.base_url, path);

        let notify_url = format!(
            "{}/api/v1/wechat_pay/notify",
            std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".into())
        );
        let body = json!({
            "appid": config.appid,
            "mchid": config.mchid,
            "description": request.description,
            "out_trade_no": request.order_no,
            "notify_url": notify_url,
            "amount": {
                "total": request.amount.to_cents(),
                "currency": request.currency,
            },
        })
        .to_string();

        let authorization = Self::build_authorization(&config, "POST", path, &body)?;
        debug!(order_no = %request.order_no, "sending wechat native order");

        let response = self
            .client
            .post(&url)
            .header("Authorization", authorization)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let payload: serde_json::Value = response.json().await?;
        if !status.is_success() {
            warn!(%status, "wechat rejected order creation");
            return Err(DomainError::ProviderBusiness {
                provider: Provider::Wechat,
                code: payload["code"].as_str().unwrap_or("HTTP_ERROR").to_string(),
                message: payload["message"].as_str().unwrap_or_default().to_string(),
            });
        }

        // Native pay returns only a code_url; WeChat assigns its
        // transaction_id at payment time, so our order_no is the reference.
        Ok(ProviderOrder {
            provider_ref: request.order_no.clone(),
            provider_status: "NOTPAY".to_string(),
            raw: payload,
        })
    }

    async fn verify_notification(
        &self,
        raw: &RawNotification,
    ) -> DomainResult<NotificationEvent> {
        let config = self.config().await?;

        if let Err(e) = Self::verify_headers(&config, raw) {
            warn!("wechat notify signature did not verify");
            return Err(e);
        }

        let envelope: NotifyEnvelope = serde_json::from_str(&raw.body)
            .map_err(|e| DomainError::Validation(format!("bad wechat notify body: {e}")))?;
        let outcome = match envelope.event_type.as_str() {
            "TRANSACTION.SUCCESS" => PaymentOutcome::Paid,
            "TRANSACTION.CLOSE" => PaymentOutcome::Canceled,
            other => {
                return Err(DomainError::Validation(format!(
                    "unhandled wechat event type: {other}"
                )))
            }
        };

        let decrypted = Self::decrypt_resource(&config, &envelope.resource)?;
        let data: serde_json::Value = serde_json::from_str(&decrypted)?;

        let amount = data["amount"]["total"].as_i64().map(Money::from_cents);
        Ok(NotificationEvent {
            provider: Provider::Wechat,
            order_no: data["out_trade_no"].as_str().map(String::from),
            provider_ref: data["transaction_id"].as_str().map(String::from),
            outcome,
            amount,
            provider_status: data["trade_state"]
                .as_str()
                .unwrap_or(&envelope.event_type)
                .to_string(),
        })
    }
}
