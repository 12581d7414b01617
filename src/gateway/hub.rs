use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{mpsc, oneshot};

use super::dispatcher::Dispatcher;
use super::events::{encode_or_log, Command, Dispatch, Envelope};
use super::registry::Registry;
use super::session::{Admission, Member, SessionKey};
use crate::error::RelayError;
use crate::presence::{assign_identity, Identity};

/// Entry point for everything that changes or reads membership.
///
/// Cloning is cheap; all clones share one registry and one dispatcher inbox.
/// Joins, leaves and fan-out all happen on the [`Dispatcher`] task returned
/// by [`Hub::new`]; the hub only reads the registry directly.
#[derive(Clone)]
pub struct Hub {
    registry: Arc<Registry>,
    commands: mpsc::Sender<Command>,
    queue_capacity: usize,
}

impl Hub {
    pub fn new(queue_capacity: usize, dispatch_capacity: usize) -> (Self, Dispatcher) {
        let registry = Arc::new(Registry::new());
        let (commands, inbox) = mpsc::channel(dispatch_capacity.max(1));
        let hub = Self {
            registry: Arc::clone(&registry),
            commands,
            queue_capacity: queue_capacity.max(1),
        };
        (hub, Dispatcher::new(registry, inbox))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Number of sessions currently registered.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Admit the connection `id` under a freshly assigned identity.
    pub async fn admit(&self, id: &str) -> Result<Admission, RelayError> {
        let identity = assign_identity(id, &mut rand::thread_rng());
        self.admit_as(identity).await
    }

    /// Admit a session with a known identity.
    ///
    /// The dispatcher registers the session and reports the peers that were
    /// present at that instant. The newcomer's own `user-data` and one
    /// `user-added` per peer come back as the admission preamble rather than
    /// through the bounded queue, so admission succeeds however many peers
    /// there are, and nothing relayed can overtake them. Everyone else is
    /// told about the newcomer once it is a member.
    pub async fn admit_as(&self, identity: Identity) -> Result<Admission, RelayError> {
        let key = SessionKey::next();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let (lease, evicted) = oneshot::channel();
        let (reply, peers) = oneshot::channel();

        let member = Member {
            identity: identity.clone(),
            outbound: tx,
            lease,
        };
        self.send(Command::Join { key, member, reply }).await?;
        let peers = peers.await.map_err(|_| RelayError::DispatcherGone)?;

        let preamble = std::iter::once(Envelope::user_data(&identity))
            .chain(peers.iter().map(Envelope::user_added))
            .filter_map(|envelope| encode_or_log(&envelope))
            .collect();

        Ok(Admission {
            key,
            identity,
            preamble,
            outbound: rx,
            evicted,
        })
    }

    /// Remove a session, close its queue and announce its departure.
    ///
    /// Returns `false` without side effects if the session was not a member,
    /// which is the case after an eviction or a second call.
    pub async fn unregister(&self, key: SessionKey) -> bool {
        let (reply, removed) = oneshot::channel();
        if self.send(Command::Leave { key, reply }).await.is_err() {
            // Nobody left to announce to.
            return self.registry.remove(key).is_some();
        }
        removed.await.unwrap_or(false)
    }

    /// Deliver a payload to every registered session.
    pub async fn broadcast(&self, payload: Utf8Bytes) -> Result<(), RelayError> {
        self.send(Command::Deliver(Dispatch::to_all(payload))).await
    }

    /// Deliver a payload from `sender` to every other registered session.
    ///
    /// Fails with [`RelayError::NotMember`] once `sender` has been removed.
    pub async fn relay(&self, sender: SessionKey, payload: Utf8Bytes) -> Result<(), RelayError> {
        if !self.registry.contains(sender) {
            return Err(RelayError::NotMember);
        }
        self.send(Command::Deliver(Dispatch::to_all_except(payload, sender)))
            .await
    }

    async fn send(&self, command: Command) -> Result<(), RelayError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RelayError::DispatcherGone)
    }
}
