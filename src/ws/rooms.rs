//! Room membership tracking for selective broadcast.
//!
//! A room maps to the set of connection ids that joined it. Entries with
//! an empty member set are deleted immediately, so the map never holds
//! ghost rooms.

use std::collections::HashSet;

use dashmap::DashMap;
use uuid::Uuid;

/// Identifier of one inbound persistent connection.
pub type ConnId = Uuid;

/// Mapping from room name to its current members.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, HashSet<ConnId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, room: &str, id: ConnId) {
        self.rooms.entry(room.to_string()).or_default().insert(id);
    }

    pub fn leave(&self, room: &str, id: ConnId) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(&id);
            if members.is_empty() {
                drop(members);
                self.rooms.remove_if(room, |_, m| m.is_empty());
            }
        }
    }

    /// Current members of a room, or empty if the room does not exist.
    pub fn members(&self, room: &str) -> Vec<ConnId> {
        self.rooms
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, room: &str, id: ConnId) -> bool {
        self.rooms.get(room).map(|m| m.contains(&id)).unwrap_or(false)
    }

    /// Remove a connection from every room it belonged to, deleting rooms
    /// left with zero members. Called from the disconnect path.
    pub fn remove_connection(&self, id: ConnId) {
        self.rooms.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_and_members() {
        let rooms = RoomRegistry::new();
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();

        rooms.join("conversation:c1", x);
        rooms.join("conversation:c1", y);

        let members = rooms.members("conversation:c1");
        assert_eq!(members.len(), 2);
        assert!(rooms.is_member("conversation:c1", x));
    }

    #[test]
    fn test_join_is_idempotent() {
        let rooms = RoomRegistry::new();
        let x = Uuid::new_v4();
        rooms.join("conversation:c1", x);
        rooms.join("conversation:c1", x);
        assert_eq!(rooms.members("conversation:c1").len(), 1);
    }

    #[test]
    fn test_leave_deletes_empty_room() {
        let rooms = RoomRegistry::new();
        let x = Uuid::new_v4();
        rooms.join("conversation:c1", x);
        assert_eq!(rooms.room_count(), 1);

        rooms.leave("conversation:c1", x);
        assert_eq!(rooms.room_count(), 0);
    }

    #[test]
    fn test_remove_connection_purges_all_rooms() {
        let rooms = RoomRegistry::new();
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();

        rooms.join("conversation:c1", x);
        rooms.join("conversation:c2", x);
        rooms.join("conversation:c2", y);

        rooms.remove_connection(x);

        // c1 had only x: deleted entirely. c2 keeps y.
        assert_eq!(rooms.room_count(), 1);
        assert!(!rooms.is_member("conversation:c2", x));
        assert!(rooms.is_member("conversation:c2", y));
    }

    #[test]
    fn test_unknown_room_has_no_members() {
        let rooms = RoomRegistry::new();
        assert!(rooms.members("conversation:nope").is_empty());
    }
}
