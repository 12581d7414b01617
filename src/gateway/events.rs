use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::session::{Member, SessionKey};
use crate::error::RelayError;
use crate::presence::Identity;

/// Everything the dispatcher task acts on, in arrival order. Membership
/// changes travel through the same inbox as deliveries, so each one is
/// atomic with respect to fan-out.
#[derive(Debug)]
pub enum Command {
    Deliver(Dispatch),
    /// Register `member` and reply with the identities of every peer that
    /// was already present.
    Join {
        key: SessionKey,
        member: Member,
        reply: oneshot::Sender<Vec<Identity>>,
    },
    /// Remove a session and announce its departure. Replies whether it was
    /// still a member.
    Leave {
        key: SessionKey,
        reply: oneshot::Sender<bool>,
    },
}

/// Work item consumed by the dispatcher: one serialized envelope and the
/// session, if any, that must not receive it.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub payload: Utf8Bytes,
    pub exclude: Option<SessionKey>,
}

impl Dispatch {
    pub fn to_all(payload: Utf8Bytes) -> Self {
        Self {
            payload,
            exclude: None,
        }
    }

    pub fn to_all_except(payload: Utf8Bytes, exclude: SessionKey) -> Self {
        Self {
            payload,
            exclude: Some(exclude),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvelopeType {
    Content,
    UserData,
    UserAdded,
    UserRemoved,
}

/// Caret position reported alongside a content snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeData {
    #[serde(rename = "userData", default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<Identity>,
    /// Full document markup. Only present on `content` envelopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<CursorPosition>,
}

/// Wire message exchanged with browser clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeType,
    #[serde(default)]
    pub data: EnvelopeData,
}

impl Envelope {
    fn presence(kind: EnvelopeType, identity: &Identity) -> Self {
        Self {
            kind,
            data: EnvelopeData {
                user_data: Some(identity.clone()),
                ..Default::default()
            },
        }
    }

    /// Tells a session its own assigned identity.
    pub fn user_data(identity: &Identity) -> Self {
        Self::presence(EnvelopeType::UserData, identity)
    }

    pub fn user_added(identity: &Identity) -> Self {
        Self::presence(EnvelopeType::UserAdded, identity)
    }

    pub fn user_removed(identity: &Identity) -> Self {
        Self::presence(EnvelopeType::UserRemoved, identity)
    }

    /// A full-document snapshot as a client sends it.
    #[cfg(test)]
    pub(crate) fn content(sender: &Identity, markup: impl Into<String>, position: CursorPosition) -> Self {
        Self {
            kind: EnvelopeType::Content,
            data: EnvelopeData {
                user_data: Some(sender.clone()),
                content: Some(markup.into()),
                position: Some(position),
            },
        }
    }

    pub fn encode(&self) -> Result<Utf8Bytes, RelayError> {
        Ok(serde_json::to_string(self)?.into())
    }

    #[cfg(test)]
    pub(crate) fn decode(text: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Encode a server-built envelope, logging and dropping it on failure.
pub(crate) fn encode_or_log(envelope: &Envelope) -> Option<Utf8Bytes> {
    match envelope.encode() {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::error!(kind = ?envelope.kind, "dropping envelope: {e}");
            None
        }
    }
}
