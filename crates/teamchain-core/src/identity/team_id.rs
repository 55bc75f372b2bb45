//! Tagged team identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::team_name::TeamName;

/// Length of a raw team id in bytes, including the trailing tag byte.
pub const TEAM_ID_LEN: usize = 16;

/// Trailing tag byte of a root team id.
pub const ROOT_TEAM_ID_TAG: u8 = 0x24;

/// Trailing tag byte of a subteam id.
pub const SUBTEAM_ID_TAG: u8 = 0x25;

/// Errors produced by team id parsing and shape checks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdError {
    /// The id is not valid hex of the right length.
    #[error("malformed team id '{value}'")]
    Malformed {
        /// The offending id text.
        value: String,
    },

    /// The trailing byte is neither the root nor the subteam tag.
    #[error("team id '{value}' has unknown tag byte {tag:#04x}")]
    UnknownTag {
        /// The offending id text.
        value: String,
        /// The unrecognized tag byte.
        tag: u8,
    },

    /// A subteam-tagged id appeared where a root id was required.
    #[error("malformed root team id: {id}")]
    NotRoot {
        /// The offending id.
        id: TeamId,
    },

    /// A root-tagged id appeared where a subteam id was required.
    #[error("malformed subteam id: {id}")]
    NotSubteam {
        /// The offending id.
        id: TeamId,
    },

    /// A root id does not equal the hash of its claimed name.
    #[error("team id {id} does not match team name '{name}'")]
    NameMismatch {
        /// The claimed id.
        id: TeamId,
        /// The claimed name.
        name: String,
    },

    /// A continuation link named a different team than the chain it extends.
    #[error("wrong team id: {got} != {expected}")]
    WrongTeam {
        /// The id of the chain being extended.
        expected: TeamId,
        /// The id carried by the link.
        got: TeamId,
    },
}

/// An opaque 16-byte team identifier whose trailing byte distinguishes
/// root teams ([`ROOT_TEAM_ID_TAG`]) from subteams ([`SUBTEAM_ID_TAG`]).
///
/// For a root team the id is derived from the team name:
/// `SHA-256(lowercased name)` truncated to 15 bytes with the root tag
/// appended.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TeamId([u8; TEAM_ID_LEN]);

impl TeamId {
    /// Creates a team id from raw bytes without tag validation.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; TEAM_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses a team id from its 32-char hex form, validating the tag byte.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Malformed`] on non-hex input or the wrong length,
    /// and [`IdError::UnknownTag`] when the trailing byte is not a known
    /// tag.
    pub fn from_hex(s: &str) -> Result<Self, IdError> {
        let malformed = || IdError::Malformed {
            value: s.to_string(),
        };
        let bytes = hex::decode(s).map_err(|_| malformed())?;
        let bytes: [u8; TEAM_ID_LEN] = bytes.try_into().map_err(|_| malformed())?;
        let tag = bytes[TEAM_ID_LEN - 1];
        if tag != ROOT_TEAM_ID_TAG && tag != SUBTEAM_ID_TAG {
            return Err(IdError::UnknownTag {
                value: s.to_string(),
                tag,
            });
        }
        Ok(Self(bytes))
    }

    /// Derives the root team id for a team name.
    #[must_use]
    pub fn root_from_name(name: &TeamName) -> Self {
        let digest = Sha256::digest(name.to_lowercase_string().as_bytes());
        let mut bytes = [0u8; TEAM_ID_LEN];
        bytes[..TEAM_ID_LEN - 1].copy_from_slice(&digest[..TEAM_ID_LEN - 1]);
        bytes[TEAM_ID_LEN - 1] = ROOT_TEAM_ID_TAG;
        Self(bytes)
    }

    /// Returns `true` when the id carries the root tag.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.0[TEAM_ID_LEN - 1] == ROOT_TEAM_ID_TAG
    }

    /// Returns `true` when the id carries the subteam tag.
    #[must_use]
    pub const fn is_subteam(&self) -> bool {
        self.0[TEAM_ID_LEN - 1] == SUBTEAM_ID_TAG
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; TEAM_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TeamId({self})")
    }
}

impl TryFrom<String> for TeamId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<TeamId> for String {
    fn from(value: TeamId) -> Self {
        value.to_string()
    }
}
