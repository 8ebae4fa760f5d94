//! Deferred Actions
//!
//! Room-scoped scheduled continuations (reload completion, burst rounds).
//! The queue lives inside the room state, so dropping the room drops
//! every pending continuation with it. Each action re-validates the
//! player when it fires.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::game::state::SessionId;
use crate::game::weapon::WeaponKind;

/// A continuation scheduled for a later room time.
#[derive(Clone, Debug, PartialEq)]
pub enum DeferredAction {
    /// A follow-up round of a burst.
    BurstRound {
        /// Shooter
        owner: SessionId,
        /// Aim captured when the trigger was pulled
        rotation: f32,
        /// Weapon the burst was fired with
        weapon: WeaponKind,
    },
    /// Reload finishes.
    ReloadComplete {
        /// Reloading player
        player_id: SessionId,
        /// Weapon being reloaded
        weapon: WeaponKind,
    },
}

impl DeferredAction {
    /// Player the action belongs to.
    pub fn player_id(&self) -> &SessionId {
        match self {
            DeferredAction::BurstRound { owner, .. } => owner,
            DeferredAction::ReloadComplete { player_id, .. } => player_id,
        }
    }
}

#[derive(Debug)]
struct Scheduled {
    due_ms: u64,
    seq: u64,
    action: DeferredAction,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Insertion order breaks ties between equal deadlines
        self.due_ms
            .cmp(&other.due_ms)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap of deferred actions keyed by room time.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    entries: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl DeferredQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to run at `due_ms`.
    pub fn schedule(&mut self, due_ms: u64, action: DeferredAction) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Reverse(Scheduled { due_ms, seq, action }));
    }

    /// Remove and return every action due at or before `now_ms`,
    /// earliest first.
    pub fn pop_due(&mut self, now_ms: u64) -> Vec<DeferredAction> {
        let mut due = Vec::new();
        while let Some(Reverse(next)) = self.entries.peek() {
            if next.due_ms > now_ms {
                break;
            }
            if let Some(Reverse(entry)) = self.entries.pop() {
                due.push(entry.action);
            }
        }
        due
    }

    /// Drop every pending action belonging to `player_id`.
    pub fn cancel_player(&mut self, player_id: &str) {
        self.entries.retain(|Reverse(entry)| entry.action.player_id() != player_id);
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No pending actions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reload(player: &str) -> DeferredAction {
        DeferredAction::ReloadComplete {
            player_id: player.to_string(),
            weapon: WeaponKind::Pistol,
        }
    }

    #[test]
    fn test_pop_due_in_deadline_order() {
        let mut queue = DeferredQueue::new();
        queue.schedule(300, reload("c"));
        queue.schedule(100, reload("a"));
        queue.schedule(200, reload("b"));

        assert!(queue.pop_due(99).is_empty());

        let due = queue.pop_due(250);
        let players: Vec<&str> = due.iter().map(|a| a.player_id().as_str()).collect();
        assert_eq!(players, vec!["a", "b"]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_equal_deadlines_keep_insertion_order() {
        let mut queue = DeferredQueue::new();
        queue.schedule(100, reload("first"));
        queue.schedule(100, reload("second"));

        let due = queue.pop_due(100);
        assert_eq!(due[0].player_id(), "first");
        assert_eq!(due[1].player_id(), "second");
    }

    #[test]
    fn test_cancel_player() {
        let mut queue = DeferredQueue::new();
        queue.schedule(100, reload("a"));
        queue.schedule(100, DeferredAction::BurstRound {
            owner: "a".to_string(),
            rotation: 0.0,
            weapon: WeaponKind::Rifle,
        });
        queue.schedule(100, reload("b"));

        queue.cancel_player("a");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_due(100)[0].player_id(), "b");
    }
}
