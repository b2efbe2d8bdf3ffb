pub mod provider_config;

pub use provider_config::{AlipayConfig, PaypalConfig, ProviderConfig, WechatConfig};
