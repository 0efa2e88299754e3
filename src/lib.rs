// ============================================================================
// Order Lifecycle Engine
// ============================================================================
//
// Owns the state of a marketplace purchase from placement through payment
// settlement to fulfillment or cancellation. Payment can settle through the
// buyer's confirmation call or the processor's webhook; conditional writes
// make the two race safely.
//
// ============================================================================

pub mod actors;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod messaging;
pub mod metrics;
pub mod service;
pub mod store;
pub mod utils;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;
