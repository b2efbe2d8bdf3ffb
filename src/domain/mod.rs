pub mod errors;
pub mod money;
pub mod order;
pub mod payment;

pub use errors::{DomainError, DomainResult};
pub use money::Money;
pub use order::{Order, OrderItem, OrderStatus, Receiver};
pub use payment::{Payment, PaymentStatus, Provider};
