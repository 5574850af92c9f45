// ============================================================================
// Event Sourcing Persistence
// ============================================================================
//
// Storage backend for event-sourced actors.
// - core/  - payload traits, type registry, envelope codec, host contract
// - store/ - table naming and the Postgres provider
//
// ============================================================================

mod core;
mod errors;
mod store;

pub use self::core::*;
pub use errors::{PersistenceError, Result};
pub use store::*;
