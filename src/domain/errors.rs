use thiserror::Error;

use crate::domain::payment::Provider;

/// Domain error taxonomy. Variants map one-to-one onto the HTTP status
/// chosen at the API boundary; callback endpoints never expose them.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Bad or contradictory input, rejected before any side effect.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown order / payment / catalog item / cart entry.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Backward or otherwise illegal state-machine move.
    #[error("Invalid transition: {entity} {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Payment amount disagrees with the order total (or a notification
    /// reports a different amount than the ledger holds). Never auto-corrected.
    #[error("Amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch { expected: String, actual: String },

    /// The provider rejected the request for business reasons.
    #[error("{provider} business error {code}: {message}")]
    ProviderBusiness {
        provider: Provider,
        code: String,
        message: String,
    },

    /// Network/timeout talking to the provider; retryable by the caller.
    #[error("Provider transport error: {0}")]
    ProviderTransport(#[from] reqwest::Error),

    /// Inbound notification failed signature verification.
    #[error("Notification verification failed for {0}")]
    VerificationFailed(Provider),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    /// Missing or undecodable provider credential blob.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        DomainError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
