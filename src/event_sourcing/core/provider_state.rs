use async_trait::async_trait;
use std::sync::Arc;

use super::payload::Payload;

// ============================================================================
// Host Persistence Contract
// ============================================================================
//
// What the actor runtime consumes. Persist calls never fail from the host's
// point of view: failures are logged and counted by the implementation.
// Read failures look like "nothing found".
//
// ============================================================================

/// Latest stored snapshot of an actor.
#[derive(Debug)]
pub struct Snapshot {
    pub payload: Box<dyn Payload>,
    pub sequence_number: i64,
}

/// Per-call persistence operations used by the host runtime.
#[async_trait]
pub trait ProviderState: Send + Sync {
    /// Replay events for `actor_name` with sequence numbers in
    /// `[from_sequence, to_sequence]`, ascending, one callback per event.
    async fn get_events(
        &self,
        actor_name: &str,
        from_sequence: i64,
        to_sequence: i64,
        on_event: &mut (dyn FnMut(Box<dyn Payload>) + Send),
    );

    async fn persist_event(&self, actor_name: &str, sequence_number: i64, event: &dyn Payload);

    /// Reserved for a retention policy. Does nothing.
    async fn delete_events(&self, actor_name: &str, up_to_sequence: i64);

    /// Highest-sequence snapshot, `None` if the actor has none.
    async fn get_snapshot(&self, actor_name: &str) -> Option<Snapshot>;

    async fn persist_snapshot(&self, actor_name: &str, sequence_number: i64, snapshot: &dyn Payload);

    /// Reserved for a retention policy. Does nothing.
    async fn delete_snapshots(&self, actor_name: &str, up_to_sequence: i64);

    /// How many events the host should let pass between snapshots.
    fn get_snapshot_interval(&self) -> i64;

    /// Liveness probe against the store. Holds no state to reset.
    async fn restart(&self);
}

/// Hands out the state object the host talks to.
pub trait PersistenceProvider: Send + Sync {
    fn get_state(&self) -> Arc<dyn ProviderState>;
}
