// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (OrderStatus, PaymentStatus, OrderState, Principal)
// - Events (OrderCreated, PaymentReceived, StatusChanged, ...)
// - Commands (validated requests)
// - Errors (OrderError and its ErrorKind classification)
// - Aggregate (Order and the pure transition table)
// - Command Handler (OrderLifecycleManager)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
