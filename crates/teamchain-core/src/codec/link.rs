//! Chain link envelope and link type codes.

use serde::{Deserialize, Serialize};

use super::outer::LinkId;
use crate::error::ChainError;
use crate::identity::{Uid, UserVersion};
use crate::Seqno;

/// The link format version this player supports.
pub const SUPPORTED_LINK_VERSION: u8 = 2;

/// Outer link type codes.
///
/// # Discriminant Stability
///
/// The discriminants are the wire codes carried in the outer envelope's
/// `link_type` field; they MUST NOT change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LinkType {
    /// First link of a root team chain.
    Root             = 33,
    /// Membership change on an existing chain.
    ChangeMembership = 34,
    /// Per-team-key rotation.
    RotateKey        = 35,
    /// A member leaves the team.
    Leave            = 36,
    /// A parent chain announces a new subteam.
    NewSubteam       = 37,
    /// First link of a subteam chain.
    SubteamHead      = 38,
    /// Subteam rename. Declared but not supported.
    SubteamRename    = 39,
}

impl LinkType {
    /// Maps an inner `body.type` string to its link type.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::UnsupportedLinkType`] for unknown or empty
    /// type strings.
    pub fn parse(s: &str) -> Result<Self, ChainError> {
        match s {
            "team.root" => Ok(Self::Root),
            "team.change_membership" => Ok(Self::ChangeMembership),
            "team.rotate_key" => Ok(Self::RotateKey),
            "team.leave" => Ok(Self::Leave),
            "team.new_subteam" => Ok(Self::NewSubteam),
            "team.subteam_head" => Ok(Self::SubteamHead),
            "team.subteam_rename" => Ok(Self::SubteamRename),
            other => Err(ChainError::UnsupportedLinkType {
                link_type: other.to_string(),
            }),
        }
    }

    /// Returns the inner `body.type` string for this link type.
    #[must_use]
    pub const fn as_type_str(self) -> &'static str {
        match self {
            Self::Root => "team.root",
            Self::ChangeMembership => "team.change_membership",
            Self::RotateKey => "team.rotate_key",
            Self::Leave => "team.leave",
            Self::NewSubteam => "team.new_subteam",
            Self::SubteamHead => "team.subteam_head",
            Self::SubteamRename => "team.subteam_rename",
        }
    }

    /// Returns the outer wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for LinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_type_str())
    }
}

/// A chain link as delivered by the loader: the server envelope, the
/// serialized outer link with its signature, and (unless stubbed) the raw
/// inner payload text.
#[derive(Debug, Clone)]
pub struct ChainLink {
    /// Server-claimed sequence number, cross-checked against the outer.
    pub seqno: Seqno,
    /// Server-claimed link format version, cross-checked against the outer.
    pub version: u8,
    /// The signer's UID as reported by the server.
    pub uid: Uid,
    /// Canonical serialization of the outer link.
    pub outer: Vec<u8>,
    /// Ed25519 signature over `outer`.
    pub sig: Vec<u8>,
    /// Raw inner payload JSON; `None` for a stubbed link.
    pub payload: Option<String>,
}

impl ChainLink {
    /// Returns `true` when the inner payload is withheld.
    #[must_use]
    pub const fn is_stubbed(&self) -> bool {
        self.payload.is_none()
    }

    /// The signing user as a [`UserVersion`].
    ///
    /// The eldest seqno defaults to 1; resolving the real account-reset
    /// generation requires a user-sigchain service (see crate docs).
    #[must_use]
    pub const fn signer(&self) -> UserVersion {
        UserVersion::new(self.uid, 1)
    }

    /// Hash of this link's outer bytes, i.e. its link id.
    #[must_use]
    pub fn link_id(&self) -> LinkId {
        LinkId::hash_of(&self.outer)
    }

    /// Hash of the inner payload bytes, if present.
    #[must_use]
    pub fn payload_hash(&self) -> Option<LinkId> {
        self.payload
            .as_deref()
            .map(|p| LinkId::hash_of(p.as_bytes()))
    }
}
