//! The session's view of which peer links are live, and the pure
//! reconciliation between that view and announced channel membership.

use std::collections::{BTreeSet, HashMap};

use walkie_common::{ParticipantId, PeerError};

use crate::media::{LocalStream, StreamId};
use crate::peer::{PeerLink, PeerRole};

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Changes that bring a roster in line with a desired membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterDiff {
    pub remove: Vec<ParticipantId>,
    pub add: Vec<ParticipantId>,
}

impl RosterDiff {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// Compute which ids to drop and which to add so that `current` becomes
/// `desired`. Input order and duplicates are irrelevant; output is sorted.
pub fn reconcile<'a, C, D>(current: C, desired: D) -> RosterDiff
where
    C: IntoIterator<Item = &'a ParticipantId>,
    D: IntoIterator<Item = &'a ParticipantId>,
{
    let current: BTreeSet<&ParticipantId> = current.into_iter().collect();
    let desired: BTreeSet<&ParticipantId> = desired.into_iter().collect();

    RosterDiff {
        remove: current.difference(&desired).map(|id| (*id).clone()).collect(),
        add: desired.difference(&current).map(|id| (*id).clone()).collect(),
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// One live peer link owned by the roster.
pub struct PeerHandle {
    link: Box<dyn PeerLink>,
    generation: u64,
    role: PeerRole,
    stream: StreamId,
}

impl PeerHandle {
    pub fn new(link: Box<dyn PeerLink>, generation: u64, role: PeerRole, stream: StreamId) -> Self {
        Self {
            link,
            generation,
            role,
            stream,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    /// The local stream this link currently carries.
    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn signal(&mut self, payload: serde_json::Value) {
        self.link.signal(payload);
    }

    pub fn replace_stream(&mut self, stream: &LocalStream) {
        self.link.replace_stream(stream);
        self.stream = stream.id();
    }

    pub fn destroy(mut self) -> Result<(), PeerError> {
        self.link.destroy()
    }
}

impl std::fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerHandle")
            .field("generation", &self.generation)
            .field("role", &self.role)
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

/// Arena of peer handles keyed by participant id. Handlers look entries up
/// by id every time; nothing outside holds a reference into it.
#[derive(Debug, Default)]
pub struct Roster {
    entries: HashMap<ParticipantId, PeerHandle>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle, returning the one it replaced so the caller can tear it down.
    pub fn insert(&mut self, id: ParticipantId, handle: PeerHandle) -> Option<PeerHandle> {
        self.entries.insert(id, handle)
    }

    pub fn remove(&mut self, id: &ParticipantId) -> Option<PeerHandle> {
        self.entries.remove(id)
    }

    /// Remove the entry only if it is still the given generation.
    pub fn remove_generation(&mut self, id: &ParticipantId, generation: u64) -> Option<PeerHandle> {
        match self.entries.get(id) {
            Some(handle) if handle.generation == generation => self.entries.remove(id),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: &ParticipantId) -> Option<&mut PeerHandle> {
        self.entries.get_mut(id)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn generation_of(&self, id: &ParticipantId) -> Option<u64> {
        self.entries.get(id).map(PeerHandle::generation)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ParticipantId> {
        self.entries.keys()
    }

    /// Sorted ids, for snapshots.
    pub fn ids(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn handles_mut(&mut self) -> impl Iterator<Item = &mut PeerHandle> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take every handle out, leaving the roster empty.
    pub fn drain(&mut self) -> Vec<(ParticipantId, PeerHandle)> {
        self.entries.drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<ParticipantId> {
        raw.iter().map(|s| ParticipantId::from(*s)).collect()
    }

    struct NoopLink;

    impl PeerLink for NoopLink {
        fn signal(&mut self, _payload: serde_json::Value) {}
        fn replace_stream(&mut self, _stream: &LocalStream) {}
        fn destroy(&mut self) -> Result<(), PeerError> {
            Ok(())
        }
    }

    fn handle(generation: u64) -> PeerHandle {
        PeerHandle::new(
            Box::new(NoopLink),
            generation,
            PeerRole::Responder,
            LocalStream::single_track().id(),
        )
    }

    #[test]
    fn reconcile_splits_into_remove_and_add() {
        let current = ids(&["u1", "u2"]);
        let desired = ids(&["u2", "u3"]);
        let diff = reconcile(&current, &desired);
        assert_eq!(diff.remove, ids(&["u1"]));
        assert_eq!(diff.add, ids(&["u3"]));
    }

    #[test]
    fn reconcile_is_order_independent() {
        let a = reconcile(&ids(&["u3", "u1"]), &ids(&["u4", "u2", "u1"]));
        let b = reconcile(&ids(&["u1", "u3"]), &ids(&["u1", "u2", "u4"]));
        assert_eq!(a, b);
        assert_eq!(a.add, ids(&["u2", "u4"]));
    }

    #[test]
    fn reconcile_equal_sets_is_empty() {
        let diff = reconcile(&ids(&["u1", "u2"]), &ids(&["u2", "u1", "u2"]));
        assert!(diff.is_empty());
    }

    #[test]
    fn reconcile_against_empty_membership_removes_all() {
        let diff = reconcile(&ids(&["u1", "u2"]), &Vec::new());
        assert_eq!(diff.remove, ids(&["u1", "u2"]));
        assert!(diff.add.is_empty());
    }

    #[test]
    fn insert_returns_replaced_handle() {
        let mut roster = Roster::new();
        assert!(roster.insert("u1".into(), handle(1)).is_none());
        let replaced = roster.insert("u1".into(), handle(2)).unwrap();
        assert_eq!(replaced.generation(), 1);
        assert_eq!(roster.generation_of(&"u1".into()), Some(2));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn remove_generation_ignores_stale_generation() {
        let mut roster = Roster::new();
        roster.insert("u1".into(), handle(5));
        assert!(roster.remove_generation(&"u1".into(), 4).is_none());
        assert!(roster.contains(&"u1".into()));
        assert!(roster.remove_generation(&"u1".into(), 5).is_some());
        assert!(roster.is_empty());
    }

    #[test]
    fn ids_are_sorted_and_drain_empties() {
        let mut roster = Roster::new();
        roster.insert("u3".into(), handle(1));
        roster.insert("u1".into(), handle(2));
        assert_eq!(roster.ids(), ids(&["u1", "u3"]));

        let drained = roster.drain();
        assert_eq!(drained.len(), 2);
        assert!(roster.is_empty());
    }
}
