use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use super::events::{encode_or_log, Command, Dispatch, Envelope};
use super::registry::Registry;
use super::session::{Member, SessionKey};
use crate::presence::Identity;

/// Single task that performs all fan-out and every membership change.
///
/// Delivery never waits on a recipient: a full outbound queue gets its
/// session evicted instead, and the eviction is announced as a
/// `user-removed` before the next command is taken. Because joins and
/// leaves are applied here too, a newcomer's peer list and the
/// announcements it later receives always agree.
pub struct Dispatcher {
    registry: Arc<Registry>,
    rx: mpsc::Receiver<Command>,
}

impl Dispatcher {
    pub(crate) fn new(registry: Arc<Registry>, rx: mpsc::Receiver<Command>) -> Self {
        Self { registry, rx }
    }

    /// Run until every [`Hub`](super::hub::Hub) handle has been dropped.
    pub async fn run(mut self) {
        let mut backlog = VecDeque::new();
        while let Some(command) = self.rx.recv().await {
            let next = match command {
                Command::Deliver(dispatch) => Some(dispatch),
                Command::Join { key, member, reply } => self.join(key, member, reply),
                Command::Leave { key, reply } => self.leave(key, reply),
            };
            backlog.extend(next);
            while let Some(next) = backlog.pop_front() {
                for evicted in fan_out(&self.registry, &next) {
                    tracing::warn!(
                        session = %evicted.identity.user_id,
                        members = self.registry.len(),
                        "outbound queue full, evicting session"
                    );
                    if let Some(payload) = encode_or_log(&Envelope::user_removed(&evicted.identity)) {
                        backlog.push_back(Dispatch::to_all(payload));
                    }
                }
            }
        }
        tracing::debug!("dispatcher stopped");
    }

    fn join(
        &self,
        key: SessionKey,
        member: Member,
        reply: oneshot::Sender<Vec<Identity>>,
    ) -> Option<Dispatch> {
        let peers = self.registry.identities();
        let identity = member.identity.clone();
        self.registry.register(key, member);
        if reply.send(peers).is_err() {
            // The connection gave up while the join was queued.
            self.registry.remove(key);
            return None;
        }

        tracing::info!(
            session = %identity.user_id,
            %key,
            name = %identity.user_name,
            members = self.registry.len(),
            "session admitted"
        );
        let payload = encode_or_log(&Envelope::user_added(&identity))?;
        Some(Dispatch::to_all_except(payload, key))
    }

    fn leave(&self, key: SessionKey, reply: oneshot::Sender<bool>) -> Option<Dispatch> {
        let removed = self.registry.remove(key);
        let _ = reply.send(removed.is_some());
        let Member { identity, .. } = removed?;

        tracing::info!(
            session = %identity.user_id,
            %key,
            members = self.registry.len(),
            "session removed"
        );
        let payload = encode_or_log(&Envelope::user_removed(&identity))?;
        Some(Dispatch::to_all(payload))
    }
}

/// Deliver one dispatch to a snapshot of the registry.
///
/// Returns the members evicted because their queue was full. They are
/// already out of the registry; dropping them closes their queues.
pub fn fan_out(registry: &Registry, dispatch: &Dispatch) -> Vec<Member> {
    let mut unserviceable = Vec::new();
    for (key, outbound) in registry.snapshot(dispatch.exclude) {
        match outbound.try_send(dispatch.payload.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => unserviceable.push(key),
            // Outbound pump already gone; its inbound pump unregisters it.
            Err(TrySendError::Closed(_)) => {}
        }
    }
    unserviceable
        .into_iter()
        .filter_map(|key| registry.remove(key))
        .collect()
}
