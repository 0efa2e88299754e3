// ============================================================================
// Gateway Adapters - implementations of the PaymentGateway port
// ============================================================================

mod in_process;
pub mod signature;

pub use in_process::{InProcessGateway, DEFAULT_TOLERANCE_SECS};
