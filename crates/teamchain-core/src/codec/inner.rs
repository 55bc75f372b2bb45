//! Inner link payload model.
//!
//! The inner payload is plain JSON as produced by signing clients. Optional
//! team-section fields stay `Option` so that "absent" and "present but
//! empty" remain distinguishable - the member sanity check depends on the
//! difference.

use serde::{Deserialize, Serialize};

use super::outer::LinkId;
use crate::error::ChainError;
use crate::{Generation, Seqno};

/// The tag every inner payload must carry.
pub const SIGNATURE_TAG: &str = "signature";

/// A typed inner payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnerLink {
    /// Payload tag; must be the literal `"signature"`.
    pub tag: String,
    /// Position in the chain, 1-based.
    pub seqno: Seqno,
    /// Lowercase hex of the prior link id; absent on the first link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    /// Client-claimed creation time, seconds since the epoch. Ignored.
    #[serde(default)]
    pub ctime: u64,
    /// Client-claimed expiry window in seconds. Ignored.
    #[serde(default)]
    pub expire_in: u64,
    /// Sequence namespace discriminator. Ignored.
    #[serde(default)]
    pub seq_type: u8,
    /// The typed body.
    pub body: LinkBody,
}

/// The body of an inner payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkBody {
    /// Link format version.
    pub version: u8,
    /// Link type string, e.g. `"team.root"`.
    #[serde(rename = "type")]
    pub link_type: String,
    /// The team section. Required on every team link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamSection>,
}

/// The team section of an inner payload. All sub-fields are optional; each
/// link type prescribes which must be present and which must be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamSection {
    /// The team this link belongs to, as 32 hex chars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The team name, dotted form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Membership assignments by role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<MembersSection>,
    /// Parent pointer, present only on subteam heads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentSection>,
    /// New-subteam announcement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subteam: Option<SubteamSection>,
    /// A new per-team key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_team_key: Option<PerTeamKeySection>,
    /// Admin bookkeeping section. Decoded but otherwise ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<serde_json::Value>,
}

/// Membership assignments. Each list holds user versions in text form.
/// An absent list means "no statement about that role"; an empty list
/// explicitly clears the role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembersSection {
    /// Users assigned the OWNER role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owners: Option<Vec<String>>,
    /// Users assigned the ADMIN role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admins: Option<Vec<String>>,
    /// Users assigned the WRITER role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writers: Option<Vec<String>>,
    /// Users assigned the READER role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readers: Option<Vec<String>>,
    /// Users removed from the team.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub none: Option<Vec<String>>,
}

/// Parent pointer carried by a subteam head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentSection {
    /// The parent team id, 32 hex chars.
    pub id: String,
    /// The parent chain seqno that announced this subteam. Ignored.
    #[serde(default)]
    pub seqno: Seqno,
}

/// New-subteam announcement carried by the parent chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubteamSection {
    /// The subteam id, 32 hex chars with the subteam tag.
    pub id: String,
    /// The subteam name, which must extend the parent name by one part.
    pub name: String,
}

/// A new per-team key introduced by this link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerTeamKeySection {
    /// Key generation, dense from 1.
    pub generation: Generation,
    /// Tagged Ed25519 signing KID, lowercase hex.
    pub sig_kid: String,
    /// Tagged Curve25519 encryption KID, lowercase hex.
    pub enc_kid: String,
    /// Reverse signature by `sig_kid` over the payload with this field
    /// nulled. Serialized as `null` before signing.
    #[serde(default)]
    pub reverse_sig: Option<String>,
}

impl InnerLink {
    /// Decodes an inner payload from its raw JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::MalformedInner`] on any structural error.
    pub fn decode(payload: &str) -> Result<Self, ChainError> {
        serde_json::from_str(payload).map_err(|e| ChainError::MalformedInner {
            reason: e.to_string(),
        })
    }

    /// Parses the claimed prev link id, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::MalformedInner`] when the hex does not decode.
    pub fn prev_link_id(&self) -> Result<Option<LinkId>, ChainError> {
        self.prev
            .as_deref()
            .map(|hex| {
                LinkId::from_hex(hex).map_err(|e| ChainError::MalformedInner {
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}
