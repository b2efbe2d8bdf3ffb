pub mod checkout_service;
pub mod dto;
pub mod order_service;
pub mod reconciler;

#[cfg(test)]
pub(crate) mod test_support;

pub use checkout_service::CheckoutService;
pub use dto::*;
pub use order_service::OrderService;
pub use reconciler::{NotificationReconciler, ReconcileOutcome};
