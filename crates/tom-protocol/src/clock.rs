//! Lamport clock with a per-member `lastSeen` vector.
//!
//! Pure logic, no I/O. The runtime loop is the single owner, so `tick` and
//! `observe` are linearizable without any locking.
use crate::types::NodeId;

/// Logical clock of one group member.
///
/// `lamport` never decreases, and neither does any `last_seen` slot.
#[derive(Debug, Clone)]
pub struct LamportClock {
    local: NodeId,
    lamport: u64,
    last_seen: Vec<u64>,
}

impl LamportClock {
    /// Clock for member `local` of a group of `group_size` members.
    ///
    /// # Panics
    ///
    /// Panics if `local` is not a valid index into the group.
    pub fn new(local: NodeId, group_size: usize) -> Self {
        assert!(
            local.index() < group_size,
            "local id {local} outside a group of {group_size}"
        );
        Self {
            local,
            lamport: 0,
            last_seen: vec![0; group_size],
        }
    }

    /// Advance for a locally originated event and return its timestamp.
    ///
    /// Saturates at `u64::MAX` so the clock never moves backwards.
    pub fn tick(&mut self) -> u64 {
        self.lamport = self.lamport.saturating_add(1);
        self.last_seen[self.local.index()] = self.lamport;
        self.lamport
    }

    /// Merge the timestamp of an event received from `sender`.
    ///
    /// Returns the new local value. Ids outside the group are the caller's
    /// problem; they are ignored here apart from the local advance.
    pub fn observe(&mut self, sender: NodeId, remote_ts: u64) -> u64 {
        self.lamport = self.lamport.max(remote_ts).saturating_add(1);
        self.last_seen[self.local.index()] = self.lamport;
        if let Some(seen) = self.last_seen.get_mut(sender.index()) {
            *seen = (*seen).max(remote_ts);
        }
        self.lamport
    }

    pub fn lamport(&self) -> u64 {
        self.lamport
    }

    pub fn local(&self) -> NodeId {
        self.local
    }

    pub fn group_size(&self) -> usize {
        self.last_seen.len()
    }

    /// Whether `id` is a member of this group.
    pub fn is_member(&self, id: NodeId) -> bool {
        id.index() < self.last_seen.len()
    }

    /// Highest timestamp observed from each member, indexed by `NodeId`.
    pub fn last_seen(&self) -> &[u64] {
        &self.last_seen
    }

    /// Every member has been seen at or past `ts`.
    pub fn all_seen(&self, ts: u64) -> bool {
        self.last_seen.iter().all(|&seen| seen >= ts)
    }
}
