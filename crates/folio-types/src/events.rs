use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Events sent over the WebSocket gateway.
///
/// Change events carry identifiers only. Clients refetch whatever view they
/// have open instead of merging payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the session behind the connection
    Ready { user_id: Uuid, email: String, role: Role },

    /// A row in the requests table was inserted, updated or deleted
    RequestChanged {
        kind: ChangeKind,
        request_id: i64,
        user_id: Uuid,
    },
}

impl GatewayEvent {
    /// Owners see changes to their own requests, the operator sees all.
    pub fn visible_to(&self, user_id: Uuid, role: Role) -> bool {
        match self {
            Self::Ready { user_id: target, .. } => *target == user_id,
            Self::RequestChanged { user_id: owner, .. } => {
                role == Role::Operator || *owner == user_id
            }
        }
    }
}
