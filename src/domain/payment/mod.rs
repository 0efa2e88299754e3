// ============================================================================
// Payment Domain - gateway port and settlement reconciliation
// ============================================================================

pub mod gateway;
pub mod reconciler;

pub use gateway::*;
pub use reconciler::*;
