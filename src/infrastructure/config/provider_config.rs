use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::payment::Provider;

/// Alipay credentials: certificate-mode signing/verification. The cert
/// blobs are stored as PEM text and treated as opaque until used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlipayConfig {
    pub app_id: String,
    /// Application private key (PKCS#8 PEM), signs outbound requests.
    pub app_private_key: String,
    /// Alipay public key (SPKI PEM), verifies notify signatures.
    pub alipay_public_cert: String,
    /// Root and application certificates, carried for the cert-mode
    /// request headers.
    pub alipay_root_cert: String,
    pub app_public_cert: String,
    #[serde(default)]
    pub is_prod: bool,
}

impl AlipayConfig {
    pub fn gateway_url(&self) -> &'static str {
        if self.is_prod {
            "https://openapi.alipay.com/gateway.do"
        } else {
            "https://openapi-sandbox.dl.alipaydev.com/gateway.do"
        }
    }
}

/// WeChat Pay v3 merchant credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WechatConfig {
    pub mchid: String,
    /// Merchant certificate serial number.
    pub serial_no: String,
    /// APIv3 key, decrypts callback resources.
    pub api_v3_key: String,
    /// Merchant private key (PKCS#8 PEM), signs outbound requests.
    pub private_key: String,
    /// WeChat platform public key (SPKI PEM), verifies notify signatures.
    pub platform_public_key: String,
    pub appid: String,
    #[serde(default = "WechatConfig::default_base_url")]
    pub base_url: String,
}

impl WechatConfig {
    fn default_base_url() -> String {
        "https://api.mch.weixin.qq.com".to_string()
    }
}

fn default_env() -> String {
    "sandbox".to_string()
}

/// PayPal REST credentials (client-secret bearer token flow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaypalConfig {
    pub client_id: String,
    pub secret: String,
    #[serde(default)]
    pub merchant_id: String,
    #[serde(default)]
    pub email: String,
    /// Webhook id registered in the PayPal dashboard, required for
    /// webhook signature verification.
    pub webhook_id: String,
    /// "sandbox" or "production".
    #[serde(default = "default_env")]
    pub env: String,
}

impl PaypalConfig {
    pub fn base_url(&self) -> &'static str {
        if self.env == "production" {
            "https://api-m.paypal.com"
        } else {
            "https://api-m.sandbox.paypal.com"
        }
    }
}

/// Per-provider credential blob, decoded from the opaque JSON stored in
/// the payment_methods table. One variant per provider; the provider code
/// is the tag, so decoding is a closed tagged-variant decode rather than
/// map traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderConfig {
    Alipay(AlipayConfig),
    Wechat(WechatConfig),
    Paypal(PaypalConfig),
}

impl ProviderConfig {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderConfig::Alipay(_) => Provider::Alipay,
            ProviderConfig::Wechat(_) => Provider::Wechat,
            ProviderConfig::Paypal(_) => Provider::Paypal,
        }
    }

    /// Decodes a stored blob for the given provider. The blob does not
    /// carry the tag itself (it predates it in the admin surface), so the
    /// provider code keys the decode.
    pub fn decode(provider: Provider, raw: &serde_json::Value) -> DomainResult<Self> {
        let decoded = match provider {
            Provider::Alipay => {
                ProviderConfig::Alipay(serde_json::from_value(raw.clone()).map_err(|e| {
                    DomainError::Configuration(format!("bad alipay config: {e}"))
                })?)
            }
            Provider::Wechat => {
                ProviderConfig::Wechat(serde_json::from_value(raw.clone()).map_err(|e| {
                    DomainError::Configuration(format!("bad wechat config: {e}"))
                })?)
            }
            Provider::Paypal => {
                ProviderConfig::Paypal(serde_json::from_value(raw.clone()).map_err(|e| {
                    DomainError::Configuration(format!("bad paypal config: {e}"))
                })?)
            }
        };
        Ok(decoded)
    }

    pub fn as_alipay(&self) -> DomainResult<&AlipayConfig> {
        match self {
            ProviderConfig::Alipay(c) => Ok(c),
            other => Err(DomainError::Configuration(format!(
                "expected alipay config, found {}",
                other.provider()
            ))),
        }
    }

    pub fn as_wechat(&self) -> DomainResult<&WechatConfig> {
        match self {
            ProviderConfig::Wechat(c) => Ok(c),
            other => Err(DomainError::Configuration(format!(
                "expected wechat config, found {}",
                other.provider()
            ))),
        }
    }

    pub fn as_paypal(&self) -> DomainResult<&PaypalConfig> {
        match self {
            ProviderConfig::Paypal(c) => Ok(c),
            other => Err(DomainError::Configuration(format!(
                "expected paypal config, found {}",
                other.provider()
            ))),
        }
    }
}
