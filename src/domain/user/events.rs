use serde::{Deserialize, Serialize};

use crate::event_sourcing::PersistentMessage;

// ============================================================================
// User Events
// ============================================================================

/// User Created - first event of every user actor
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserCreated {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl PersistentMessage for UserCreated {
    fn type_name() -> &'static str { "user.UserCreated" }
}

/// User Renamed
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserRenamed {
    pub id: String,
    pub name: String,
}

impl PersistentMessage for UserRenamed {
    fn type_name() -> &'static str { "user.UserRenamed" }
}
