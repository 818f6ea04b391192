/// Per-prompt presence tracking
///
/// Each prompt with at least one viewer has a room: a presence map plus a
/// broadcast channel. Joins, leaves, and snapshots are fanned out to every
/// subscriber of that room. The tracker performs no ordering or causality
/// resolution beyond broadcast order; a background sweep expires viewers
/// whose heartbeats stop arriving.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// Buffered frames per room before slow subscribers start missing messages
const ROOM_BUFFER: usize = 64;

/// One viewer currently on a prompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewerInfo {
    pub user_id: String,
    pub handle: String,
}

/// Frame broadcast to presence subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceFrame {
    /// Sent to a new subscriber with the current viewer set
    Snapshot { viewers: Vec<ViewerInfo> },
    Join { viewer: ViewerInfo },
    Leave { user_id: String },
}

struct Viewer {
    handle: String,
    last_seen: DateTime<Utc>,
}

struct Room {
    viewers: HashMap<String, Viewer>,
    tx: broadcast::Sender<PresenceFrame>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(ROOM_BUFFER);
        Self {
            viewers: HashMap::new(),
            tx,
        }
    }

    fn viewer_list(&self) -> Vec<ViewerInfo> {
        self.viewers
            .iter()
            .map(|(user_id, v)| ViewerInfo {
                user_id: user_id.clone(),
                handle: v.handle.clone(),
            })
            .collect()
    }
}

/// Presence tracker shared through the application context
pub struct PresenceTracker {
    rooms: RwLock<HashMap<String, Room>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Add a viewer to a prompt's room. Returns a receiver for the room's
    /// frames and a snapshot of the viewers present before the join.
    pub async fn join(
        &self,
        prompt_id: &str,
        user_id: &str,
        handle: &str,
    ) -> (broadcast::Receiver<PresenceFrame>, Vec<ViewerInfo>) {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(prompt_id.to_string()).or_insert_with(Room::new);

        let snapshot = room.viewer_list();
        let rx = room.tx.subscribe();

        let is_new = room
            .viewers
            .insert(
                user_id.to_string(),
                Viewer {
                    handle: handle.to_string(),
                    last_seen: Utc::now(),
                },
            )
            .is_none();

        if is_new {
            // Ignore send errors: a room with a single brand-new subscriber
            // may have no receivers yet
            let _ = room.tx.send(PresenceFrame::Join {
                viewer: ViewerInfo {
                    user_id: user_id.to_string(),
                    handle: handle.to_string(),
                },
            });
        }

        (rx, snapshot)
    }

    /// Remove a viewer and broadcast the leave. Empty rooms are dropped.
    pub async fn leave(&self, prompt_id: &str, user_id: &str) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(prompt_id) {
            if room.viewers.remove(user_id).is_some() {
                let _ = room.tx.send(PresenceFrame::Leave {
                    user_id: user_id.to_string(),
                });
            }
            if room.viewers.is_empty() {
                rooms.remove(prompt_id);
            }
        }
    }

    /// Refresh a viewer's heartbeat
    pub async fn heartbeat(&self, prompt_id: &str, user_id: &str) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(prompt_id) {
            if let Some(viewer) = room.viewers.get_mut(user_id) {
                viewer.last_seen = Utc::now();
            }
        }
    }

    /// Current viewers of a prompt
    pub async fn viewers(&self, prompt_id: &str) -> Vec<ViewerInfo> {
        let rooms = self.rooms.read().await;
        rooms
            .get(prompt_id)
            .map(|room| room.viewer_list())
            .unwrap_or_default()
    }

    /// Drop viewers whose heartbeat is older than the threshold.
    /// Returns the number of viewers swept.
    pub async fn sweep_stale(&self, stale_after_secs: i64) -> u64 {
        let cutoff = Utc::now() - Duration::seconds(stale_after_secs);
        let mut swept = 0;

        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, room| {
            let stale: Vec<String> = room
                .viewers
                .iter()
                .filter(|(_, v)| v.last_seen < cutoff)
                .map(|(id, _)| id.clone())
                .collect();

            for user_id in stale {
                room.viewers.remove(&user_id);
                let _ = room.tx.send(PresenceFrame::Leave { user_id });
                swept += 1;
            }

            !room.viewers.is_empty()
        });

        swept
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_broadcasts_to_existing_subscribers() {
        let tracker = PresenceTracker::new();

        let (mut rx_a, snapshot_a) = tracker.join("p1", "alice", "alice").await;
        assert!(snapshot_a.is_empty());

        let (_rx_b, snapshot_b) = tracker.join("p1", "bob", "bob").await;
        assert_eq!(snapshot_b.len(), 1);
        assert_eq!(snapshot_b[0].user_id, "alice");

        match rx_a.recv().await.unwrap() {
            PresenceFrame::Join { viewer } => assert_eq!(viewer.user_id, "bob"),
            other => panic!("expected join, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn leave_broadcasts_and_drops_empty_rooms() {
        let tracker = PresenceTracker::new();
        let (mut rx_a, _) = tracker.join("p1", "alice", "alice").await;
        tracker.join("p1", "bob", "bob").await;

        tracker.leave("p1", "bob").await;

        // Skip the join frame, then expect the leave
        let _ = rx_a.recv().await.unwrap();
        match rx_a.recv().await.unwrap() {
            PresenceFrame::Leave { user_id } => assert_eq!(user_id, "bob"),
            other => panic!("expected leave, got {:?}", other),
        }

        tracker.leave("p1", "alice").await;
        assert!(tracker.viewers("p1").await.is_empty());
        assert!(tracker.rooms.read().await.is_empty());
    }

    #[tokio::test]
    async fn rejoin_does_not_duplicate() {
        let tracker = PresenceTracker::new();
        tracker.join("p1", "alice", "alice").await;
        tracker.join("p1", "alice", "alice").await;
        assert_eq!(tracker.viewers("p1").await.len(), 1);
    }

    #[tokio::test]
    async fn sweep_removes_stale_viewers() {
        let tracker = PresenceTracker::new();
        tracker.join("p1", "alice", "alice").await;
        tracker.join("p1", "bob", "bob").await;

        // Backdate alice's heartbeat
        {
            let mut rooms = tracker.rooms.write().await;
            let room = rooms.get_mut("p1").unwrap();
            room.viewers.get_mut("alice").unwrap().last_seen =
                Utc::now() - Duration::seconds(120);
        }

        let swept = tracker.sweep_stale(90).await;
        assert_eq!(swept, 1);

        let viewers = tracker.viewers("p1").await;
        assert_eq!(viewers.len(), 1);
        assert_eq!(viewers[0].user_id, "bob");
    }

    #[tokio::test]
    async fn heartbeat_keeps_viewer_alive() {
        let tracker = PresenceTracker::new();
        tracker.join("p1", "alice", "alice").await;

        {
            let mut rooms = tracker.rooms.write().await;
            rooms.get_mut("p1").unwrap().viewers.get_mut("alice").unwrap().last_seen =
                Utc::now() - Duration::seconds(120);
        }
        tracker.heartbeat("p1", "alice").await;

        assert_eq!(tracker.sweep_stale(90).await, 0);
        assert_eq!(tracker.viewers("p1").await.len(), 1);
    }

    #[test]
    fn frames_serialize_with_type_tag() {
        let frame = PresenceFrame::Join {
            viewer: ViewerInfo {
                user_id: "u1".to_string(),
                handle: "alice".to_string(),
            },
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"join\""));
    }
}
