// ============================================================================
// Event Sourcing Store - Postgres Persistence Layer
// ============================================================================

pub mod provider;
pub mod schema;

pub use provider::{PostgresProvider, PostgresProviderBuilder};
pub use schema::{DefaultSchema, JournalSchema};
