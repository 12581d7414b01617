use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::session::{Member, SessionKey};
use crate::presence::Identity;

/// The set of sessions currently eligible to receive broadcasts.
///
/// Every membership is keyed by the session's process-unique [`SessionKey`].
/// The registry entry owns the only long-lived sender of the session's
/// outbound queue, so removing the entry is what closes the queue.
#[derive(Default)]
pub struct Registry {
    members: DashMap<SessionKey, Member>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, key: SessionKey, member: Member) {
        self.members.insert(key, member);
    }

    /// Remove a session. Only the first call for a given key gets the
    /// member back; later calls are no-ops.
    pub fn remove(&self, key: SessionKey) -> Option<Member> {
        self.members.remove(&key).map(|(_, member)| member)
    }

    pub fn contains(&self, key: SessionKey) -> bool {
        self.members.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Copy out the delivery handles of every member but `exclude`. The
    /// shard locks are released before this returns.
    pub fn snapshot(&self, exclude: Option<SessionKey>) -> Vec<(SessionKey, mpsc::Sender<Utf8Bytes>)> {
        self.members
            .iter()
            .filter(|entry| Some(*entry.key()) != exclude)
            .map(|entry| (*entry.key(), entry.value().outbound.clone()))
            .collect()
    }

    /// Identities of all current members, in no particular order.
    pub fn identities(&self) -> Vec<Identity> {
        self.members
            .iter()
            .map(|entry| entry.value().identity.clone())
            .collect()
    }
}
