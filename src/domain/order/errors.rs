use uuid::Uuid;

use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Post not found: {0}")]
    PostNotFound(Uuid),

    #[error("No order references payment intent {0}")]
    PaymentIntentNotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Webhook authentication failed: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by the presentation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidState,
    InvalidInput,
    GatewayError,
    AuthError,
    InternalError,
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::OrderNotFound(_)
            | OrderError::PostNotFound(_)
            | OrderError::PaymentIntentNotFound(_) => ErrorKind::NotFound,
            OrderError::Forbidden(_) => ErrorKind::Forbidden,
            OrderError::InvalidState(_) | OrderError::InvalidTransition { .. } => ErrorKind::InvalidState,
            OrderError::InvalidInput(_) => ErrorKind::InvalidInput,
            OrderError::Gateway(_) => ErrorKind::GatewayError,
            OrderError::Auth(_) => ErrorKind::AuthError,
            OrderError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Only transient gateway failures are worth retrying by the caller.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::GatewayError
    }
}

impl From<anyhow::Error> for OrderError {
    fn from(err: anyhow::Error) -> Self {
        OrderError::Internal(format!("{:#}", err))
    }
}

pub type OrderResult<T> = Result<T, OrderError>;
