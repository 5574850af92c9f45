// ============================================================================
// Domain Layer - Sample payloads
// ============================================================================
//
// Payload types used by the demo binary and the integration tests. Real hosts
// bring their own types and register them the same way.
//
// ============================================================================

pub mod user;
