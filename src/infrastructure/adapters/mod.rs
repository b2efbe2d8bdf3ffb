pub mod alipay;
pub mod mysql_order_repository;
pub mod mysql_payment_repository;
pub mod mysql_store;
pub mod paypal;
pub mod wechat;

pub use alipay::AlipayGateway;
pub use mysql_order_repository::MySqlOrderRepository;
pub use mysql_payment_repository::MySqlPaymentRepository;
pub use mysql_store::{MySqlCartReader, MySqlCatalogReader, MySqlProviderConfigStore};
pub use paypal::PaypalGateway;
pub use wechat::WechatGateway;
