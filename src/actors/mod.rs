// ============================================================================
// Actors Module
// ============================================================================
//
// Actors are reserved for infrastructure concerns. Order logic runs in the
// lifecycle manager and reconciler; the only actor here delivers the events
// they produce.
//
// ============================================================================

mod notification_dispatcher;

pub use notification_dispatcher::{Dispatch, EventDispatcher, Flush, NotificationDispatcher};
