// ============================================================================
// User Domain
// ============================================================================
//
// - Events (UserCreated, UserRenamed)
// - Snapshot state (UserState) and its recovery from a provider
//
// ============================================================================

pub mod events;
pub mod state;

pub use events::*;
pub use state::*;

use crate::event_sourcing::TypeRegistryBuilder;

/// Add every user payload type to a registry under construction.
pub fn register_types(builder: TypeRegistryBuilder) -> TypeRegistryBuilder {
    builder
        .register::<UserCreated>()
        .register::<UserRenamed>()
        .register::<UserState>()
}
