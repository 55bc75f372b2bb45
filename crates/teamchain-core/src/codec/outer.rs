//! Outer link envelope and link identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use super::canon::to_canon_json_bytes;
use crate::error::ChainError;
use crate::Seqno;

/// Length of a link id in bytes.
pub const LINK_ID_LEN: usize = 32;

/// Error for link id text that is not 32 hex-encoded bytes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid link id '{value}'")]
pub struct LinkIdError {
    /// The offending text.
    pub value: String,
}

/// The SHA-256 hash of a canonically serialized outer link.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkId([u8; LINK_ID_LEN]);

impl LinkId {
    /// Creates a link id from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; LINK_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses a link id from its 64-char hex form.
    ///
    /// # Errors
    ///
    /// Returns [`LinkIdError`] on non-hex input or the wrong length.
    pub fn from_hex(s: &str) -> Result<Self, LinkIdError> {
        let malformed = || LinkIdError {
            value: s.to_string(),
        };
        let bytes = hex::decode(s).map_err(|_| malformed())?;
        let bytes: [u8; LINK_ID_LEN] = bytes.try_into().map_err(|_| malformed())?;
        Ok(Self(bytes))
    }

    /// Hashes raw bytes into a link id.
    #[must_use]
    pub fn hash_of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; LINK_ID_LEN];
        out.copy_from_slice(&digest);
        Self(out)
    }

    /// Constant-time equality for hash comparisons on the verification path.
    #[must_use]
    pub fn ct_eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; LINK_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkId({self})")
    }
}

impl TryFrom<String> for LinkId {
    type Error = LinkIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<LinkId> for String {
    fn from(value: LinkId) -> Self {
        value.to_string()
    }
}

/// Wire form of the outer link. `prev` is the empty string on the first
/// link of a chain and lowercase hex of the prior link id otherwise.
#[derive(Serialize, Deserialize)]
struct OuterLinkWire {
    curr: String,
    link_type: u8,
    prev: String,
    seqno: Seqno,
    version: u8,
}

/// The hash-chained transport envelope of a link.
///
/// The canonical serialization of this value is what the signer signs and
/// what hashes into the link's [`LinkId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuterLink {
    /// Link format version.
    pub version: u8,
    /// Position in the chain, 1-based.
    pub seqno: Seqno,
    /// Hash of the previous outer link; absent on the first link.
    pub prev: Option<LinkId>,
    /// Hash of the inner payload bytes.
    pub curr: LinkId,
    /// Outer link type code (see [`super::LinkType`]).
    pub link_type: u8,
}

impl OuterLink {
    /// Decodes an outer link from its canonical serialization.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::MalformedOuter`] on any structural error.
    pub fn decode(bytes: &[u8]) -> Result<Self, ChainError> {
        let malformed = |reason: String| ChainError::MalformedOuter { reason };
        let wire: OuterLinkWire =
            serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;
        let prev = if wire.prev.is_empty() {
            None
        } else {
            Some(LinkId::from_hex(&wire.prev).map_err(|e| malformed(e.to_string()))?)
        };
        let curr = LinkId::from_hex(&wire.curr).map_err(|e| malformed(e.to_string()))?;
        Ok(Self {
            version: wire.version,
            seqno: wire.seqno,
            prev,
            curr,
            link_type: wire.link_type,
        })
    }

    /// Encodes this outer link canonically.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::MalformedOuter`] when encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>, ChainError> {
        let wire = OuterLinkWire {
            curr: self.curr.to_string(),
            link_type: self.link_type,
            prev: self.prev.map(|p| p.to_string()).unwrap_or_default(),
            seqno: self.seqno,
            version: self.version,
        };
        to_canon_json_bytes(&wire).map_err(|e| ChainError::MalformedOuter {
            reason: e.to_string(),
        })
    }

    /// Checks the fields the server envelope also claims.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::VersionMismatch`] or [`ChainError::WrongSeqno`]
    /// when the envelope and the decoded outer link disagree.
    pub fn assert_claims(&self, version: u8, seqno: Seqno) -> Result<(), ChainError> {
        if self.version != version {
            return Err(ChainError::VersionMismatch {
                expected: version,
                got: self.version,
            });
        }
        if self.seqno != seqno {
            return Err(ChainError::WrongSeqno {
                expected: seqno,
                got: self.seqno,
            });
        }
        Ok(())
    }

    /// Checks that the inner payload's claims match this outer link.
    ///
    /// `curr` is the hash of the inner payload bytes; it is compared in
    /// constant time.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::InnerOuterMismatch`] naming the first field
    /// that differs.
    pub fn assert_inner_binding(
        &self,
        version: u8,
        seqno: Seqno,
        prev: Option<LinkId>,
        curr: LinkId,
        link_type: u8,
    ) -> Result<(), ChainError> {
        let mismatch = |field: &'static str| ChainError::InnerOuterMismatch { field };
        if self.version != version {
            return Err(mismatch("version"));
        }
        if self.seqno != seqno {
            return Err(mismatch("seqno"));
        }
        let prev_matches = match (self.prev, prev) {
            (None, None) => true,
            (Some(a), Some(b)) => a.ct_eq(&b),
            _ => false,
        };
        if !prev_matches {
            return Err(mismatch("prev"));
        }
        if !self.curr.ct_eq(&curr) {
            return Err(mismatch("curr"));
        }
        if self.link_type != link_type {
            return Err(mismatch("link_type"));
        }
        Ok(())
    }
}
