//! Presence Tracker
//!
//! user id → {status, last seen}. Incremental events upsert one entry in
//! arrival order; a bulk snapshot replaces the whole map.

use crate::{
    domain::{
        InboundEvent, PresenceEntry, PresenceMap, PresenceStatus, Signal, UserId,
        event::OnlineUser, presence,
    },
    usecase::router::EventHandler,
};

#[derive(Clone, Default)]
pub struct PresenceTracker {
    entries: Signal<PresenceMap>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Signal<PresenceMap> {
        self.entries.clone()
    }

    pub fn entry(&self, user_id: &UserId) -> Option<PresenceEntry> {
        self.entries.with(|map| map.get(user_id).copied())
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.entry(user_id)
            .is_some_and(|entry| entry.status == PresenceStatus::Online)
    }

    /// Online users, sorted by id.
    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.entries.with(|map| {
            map.iter()
                .filter(|(_, entry)| entry.status == PresenceStatus::Online)
                .map(|(id, _)| id.clone())
                .collect()
        });
        users.sort();
        users
    }

    pub fn replace_all(&self, users: &[OnlineUser]) {
        self.entries.set(presence::from_snapshot(users));
    }

    pub fn clear(&self) {
        self.entries.set(PresenceMap::new());
    }
}

impl EventHandler for PresenceTracker {
    fn handle(&self, event: &InboundEvent) {
        let (user_id, status, at) = match event {
            InboundEvent::UserOnline(d) => (&d.user_id, PresenceStatus::Online, d.timestamp),
            InboundEvent::UserOffline(d) => (&d.user_id, PresenceStatus::Offline, d.last_seen),
            InboundEvent::UserStatusUpdate(d) => (&d.user_id, d.status, d.timestamp),
            InboundEvent::OnlineUsersList(users) => {
                tracing::debug!("Presence snapshot with {} user(s)", users.len());
                self.replace_all(users);
                return;
            }
            _ => return,
        };
        self.entries
            .update(|map| presence::with_entry(map, user_id, status, at));
    }
}
