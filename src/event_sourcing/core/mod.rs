// ============================================================================
// Event Sourcing Core - Payloads, Registry, Envelopes
// ============================================================================
//
// Storage-independent pieces:
// - `PersistentMessage` / `Payload`: what can be stored
// - `TypeRegistry`: type tag → decoder, installed once at startup
// - `EnvelopeCodec`: payload ⇄ `{"type", "payload"}` JSON
// - `ProviderState`: operations the host runtime calls
//
// ============================================================================

pub mod envelope;
pub mod payload;
pub mod provider_state;
pub mod registry;

pub use envelope::{EnvelopeCodec, MessageEnvelope};
pub use payload::{Payload, PersistentMessage};
pub use provider_state::{PersistenceProvider, ProviderState, Snapshot};
pub use registry::{DecodeFn, TypeRegistry, TypeRegistryBuilder};
