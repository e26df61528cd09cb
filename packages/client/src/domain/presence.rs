//! Domain logic for the presence map.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{
    entity::{PresenceEntry, PresenceStatus},
    event::OnlineUser,
    value_object::UserId,
};

/// user id → last known presence
pub type PresenceMap = HashMap<UserId, PresenceEntry>;

/// Upsert one entry; the latest arrival always wins.
pub fn with_entry(
    map: &PresenceMap,
    user_id: &UserId,
    status: PresenceStatus,
    last_seen: DateTime<Utc>,
) -> PresenceMap {
    let mut next = map.clone();
    next.insert(user_id.clone(), PresenceEntry { status, last_seen });
    next
}

/// Build a whole new map from a bulk snapshot.
pub fn from_snapshot(users: &[OnlineUser]) -> PresenceMap {
    users
        .iter()
        .map(|u| {
            (
                u.user_id.clone(),
                PresenceEntry {
                    status: u.status,
                    last_seen: u.last_seen,
                },
            )
        })
        .collect()
}
