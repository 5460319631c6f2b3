use rust_decimal::Decimal;
use sea_orm::error::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Error type returned across the engine's public boundary.
///
/// Every failure is a typed value; nothing in the engine is fatal to the
/// process. Variants fall into four recoverable categories:
/// caller-supplied data malformed ([`ErrorCategory::Validation`]), a business
/// invariant would be broken ([`ErrorCategory::InvariantViolation`]), the
/// aggregate is in the wrong state ([`ErrorCategory::State`]), or a
/// transaction lost a race on a contended row
/// ([`ErrorCategory::Concurrency`]).
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid margin: {0}% (must not be negative)")]
    InvalidMargin(Decimal),

    #[error("Invalid conversion rate {rate} for currency {currency}")]
    InvalidRate { rate: Decimal, currency: String },

    #[error("Not found: {entity} with id={id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error(
        "Over-allocation on order line {order_line_id}: attempted {attempted}, \
         only {remaining} remaining"
    )]
    OverAllocation {
        order_line_id: Uuid,
        attempted: i32,
        remaining: i32,
    },

    #[error(
        "Invalid validity for product {product_id}: new version starts {valid_from} \
         but the active version already starts {active_from}"
    )]
    InvalidValidity {
        product_id: Uuid,
        valid_from: chrono::DateTime<chrono::Utc>,
        active_from: chrono::DateTime<chrono::Utc>,
    },

    #[error("Batch {batch_id} is already linked to shipment {shipment_id}")]
    BatchAlreadyShipped { batch_id: Uuid, shipment_id: Uuid },

    #[error("Order {0} is locked; order lines can no longer be added or edited")]
    OrderLocked(Uuid),

    #[error("Stage \"{stage}\" requires evidence for: {}", .fields.join(", "))]
    MissingEvidence { stage: String, fields: Vec<String> },

    #[error("Stage \"{stage}\" requires an attachment to be completed")]
    MissingAttachment { stage: String },

    #[error("Concurrent modification lost a race and retries were exhausted: {0}")]
    ConcurrencyConflict(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Coarse error classification exposed so collaborators can decide between
/// re-prompting the user, showing a conflict message, or retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    InvariantViolation,
    State,
    Concurrency,
    Internal,
}

impl ServiceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ServiceError::ValidationError(_)
            | ServiceError::InvalidMargin(_)
            | ServiceError::InvalidRate { .. } => ErrorCategory::Validation,
            ServiceError::OverAllocation { .. }
            | ServiceError::InvalidValidity { .. }
            | ServiceError::BatchAlreadyShipped { .. } => ErrorCategory::InvariantViolation,
            ServiceError::OrderLocked(_)
            | ServiceError::MissingEvidence { .. }
            | ServiceError::MissingAttachment { .. } => ErrorCategory::State,
            ServiceError::ConcurrencyConflict(_) => ErrorCategory::Concurrency,
            ServiceError::DatabaseError(_)
            | ServiceError::NotFound { .. }
            | ServiceError::EventError(_)
            | ServiceError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// Whether the caller may simply retry the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::ConcurrencyConflict(_))
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        ServiceError::NotFound { entity, id }
    }
}
