use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::events::{UserCreated, UserRenamed};
use crate::event_sourcing::{Payload, PersistentMessage, ProviderState};

// ============================================================================
// User State - snapshot payload
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct UserState {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    /// Sequence number of the last applied event. Replay callbacks carry no
    /// sequence number, so this assumes the host numbers an actor's events
    /// 1, 2, 3, ... without gaps.
    pub version: i64,
    pub renamed_at: Option<DateTime<Utc>>,
}

impl PersistentMessage for UserState {
    fn type_name() -> &'static str { "user.UserState" }
}

impl UserState {
    /// Apply one replayed event. Unknown payloads are skipped.
    pub fn apply(&mut self, event: &dyn Payload) {
        if let Some(created) = event.downcast_ref::<UserCreated>() {
            self.id = created.id.clone();
            self.name = created.name.clone();
            self.email = created.email.clone();
        } else if let Some(renamed) = event.downcast_ref::<UserRenamed>() {
            self.name = renamed.name.clone();
            self.renamed_at = Some(Utc::now());
        } else {
            tracing::warn!(payload_type = event.payload_type(), "Skipping unexpected event for user");
            return;
        }
        self.version += 1;
    }

    /// Rebuild a user from its latest snapshot plus the events after it.
    ///
    /// The snapshot's stored sequence number overrides whatever version its
    /// payload carries, and replay resumes right after it.
    pub async fn recover(state: &dyn ProviderState, actor_name: &str) -> Self {
        let mut user = match state.get_snapshot(actor_name).await {
            Some(snapshot) => {
                let sequence_number = snapshot.sequence_number;
                match snapshot.payload.downcast::<UserState>() {
                    Ok(user) => UserState {
                        version: sequence_number,
                        ..*user
                    },
                    Err(other) => {
                        tracing::warn!(
                            actor_name = %actor_name,
                            payload_type = other.payload_type(),
                            "Ignoring snapshot of unexpected type"
                        );
                        UserState::default()
                    }
                }
            }
            None => UserState::default(),
        };

        let from_sequence = user.version + 1;
        state
            .get_events(actor_name, from_sequence, i64::MAX, &mut |event: Box<dyn Payload>| user.apply(&*event))
            .await;

        tracing::debug!(actor_name = %actor_name, version = user.version, "Recovered user state");
        user
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::Snapshot;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    // In-memory stand-in for the Postgres provider.
    #[derive(Default)]
    struct MemoryState {
        events: Mutex<BTreeMap<i64, Box<dyn Payload>>>,
        snapshots: Mutex<BTreeMap<i64, Box<dyn Payload>>>,
    }

    fn clone_payload(payload: &dyn Payload) -> Box<dyn Payload> {
        if let Some(created) = payload.downcast_ref::<UserCreated>() {
            Box::new(created.clone())
        } else if let Some(renamed) = payload.downcast_ref::<UserRenamed>() {
            Box::new(renamed.clone())
        } else if let Some(state) = payload.downcast_ref::<UserState>() {
            Box::new(state.clone())
        } else {
            panic!("unexpected payload {:?}", payload)
        }
    }

    #[async_trait]
    impl ProviderState for MemoryState {
        async fn get_events(
            &self,
            _actor_name: &str,
            from_sequence: i64,
            to_sequence: i64,
            on_event: &mut (dyn FnMut(Box<dyn Payload>) + Send),
        ) {
            let events = self.events.lock().unwrap();
            for (_, event) in events.range(from_sequence..=to_sequence) {
                on_event(clone_payload(&**event));
            }
        }

        async fn persist_event(&self, _actor_name: &str, sequence_number: i64, event: &dyn Payload) {
            self.events.lock().unwrap().insert(sequence_number, clone_payload(event));
        }

        async fn delete_events(&self, _actor_name: &str, _up_to_sequence: i64) {}

        async fn get_snapshot(&self, _actor_name: &str) -> Option<Snapshot> {
            let snapshots = self.snapshots.lock().unwrap();
            snapshots.iter().next_back().map(|(seq, payload)| Snapshot {
                payload: clone_payload(&**payload),
                sequence_number: *seq,
            })
        }

        async fn persist_snapshot(&self, _actor_name: &str, sequence_number: i64, snapshot: &dyn Payload) {
            self.snapshots.lock().unwrap().insert(sequence_number, clone_payload(snapshot));
        }

        async fn delete_snapshots(&self, _actor_name: &str, _up_to_sequence: i64) {}

        fn get_snapshot_interval(&self) -> i64 {
            3
        }

        async fn restart(&self) {}
    }

    fn created() -> UserCreated {
        UserCreated {
            id: "abc".to_string(),
            name: "alice".to_string(),
            email: None,
        }
    }

    fn renamed(name: &str) -> UserRenamed {
        UserRenamed {
            id: "abc".to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_apply_events() {
        let mut user = UserState::default();
        user.apply(&created());
        user.apply(&renamed("bob"));

        assert_eq!(user.id, "abc");
        assert_eq!(user.name, "bob");
        assert_eq!(user.version, 2);
        assert!(user.renamed_at.is_some());
    }

    #[test]
    fn test_apply_skips_foreign_payloads() {
        let mut user = UserState::default();
        user.apply(&UserState::default());
        assert_eq!(user.version, 0);
    }

    #[tokio::test]
    async fn test_recover_from_events_only() {
        let state = MemoryState::default();
        state.persist_event("user-1", 1, &created()).await;
        state.persist_event("user-1", 2, &renamed("bob")).await;

        let user = UserState::recover(&state, "user-1").await;
        assert_eq!(user.name, "bob");
        assert_eq!(user.version, 2);
    }

    #[tokio::test]
    async fn test_recover_from_snapshot_then_events() {
        let state = MemoryState::default();
        state.persist_event("user-1", 1, &created()).await;
        state.persist_event("user-1", 2, &renamed("bob")).await;

        let mut at_two = UserState::default();
        at_two.apply(&created());
        at_two.apply(&renamed("bob"));
        state.persist_snapshot("user-1", 2, &at_two).await;

        state.persist_event("user-1", 3, &renamed("carol")).await;

        let user = UserState::recover(&state, "user-1").await;
        assert_eq!(user.name, "carol");
        assert_eq!(user.version, 3);
    }

    #[tokio::test]
    async fn test_recover_trusts_stored_snapshot_sequence() {
        let state = MemoryState::default();
        let stale = UserState {
            id: "abc".to_string(),
            name: "bob".to_string(),
            version: 1,
            ..UserState::default()
        };
        state.persist_snapshot("user-1", 4, &stale).await;
        state.persist_event("user-1", 3, &renamed("ignored")).await;
        state.persist_event("user-1", 5, &renamed("carol")).await;

        let user = UserState::recover(&state, "user-1").await;
        assert_eq!(user.name, "carol");
        assert_eq!(user.version, 5);
    }
}
