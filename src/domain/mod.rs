// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// order/   - the Order record, its transition table and lifecycle manager
// payment/ - the gateway port and the payment reconciler
// catalog  - the listing lookup consulted when an order is placed
//
// Nothing here knows about HTTP or a particular database.
//
// ============================================================================

pub mod catalog;
pub mod order;
pub mod payment;
