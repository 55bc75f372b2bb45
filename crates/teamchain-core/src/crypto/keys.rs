//! Tagged key identifiers and key imports.

use std::fmt;

use curve25519_dalek::montgomery::MontgomeryPoint;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Algorithm tag byte of an Ed25519 signing KID.
pub const SIG_KID_TAG: u8 = 0x20;

/// Algorithm tag byte of a Curve25519 DH KID.
pub const ENC_KID_TAG: u8 = 0x21;

/// Length of a raw KID in bytes: one tag byte plus the 32 key bytes.
pub const KID_LEN: usize = 33;

/// Errors produced by KID parsing and key imports.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyError {
    /// The KID text is not valid hex of the right length.
    #[error("malformed KID '{kid}'")]
    Malformed {
        /// The offending KID text.
        kid: String,
    },

    /// The KID is not a valid Ed25519 signing key of the expected tag.
    #[error("invalid per-team-key signing KID: {kid}")]
    InvalidSigningKid {
        /// The offending KID.
        kid: String,
    },

    /// The KID is not a valid Curve25519 DH key of the expected tag.
    #[error("invalid per-team-key encryption KID: {kid}")]
    InvalidEncryptionKid {
        /// The offending KID.
        kid: String,
    },
}

/// A tagged key identifier: an algorithm tag byte followed by the raw
/// 32-byte public key, rendered as 66 lowercase hex chars.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Kid([u8; KID_LEN]);

impl Kid {
    /// Builds a KID from a tag byte and raw key bytes.
    #[must_use]
    pub fn new(tag: u8, key: &[u8; 32]) -> Self {
        let mut bytes = [0u8; KID_LEN];
        bytes[0] = tag;
        bytes[1..].copy_from_slice(key);
        Self(bytes)
    }

    /// Parses a KID from its hex form. The algorithm tag is not validated
    /// here; imports check it against the expected algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Malformed`] on non-hex input or the wrong
    /// length.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let malformed = || KeyError::Malformed { kid: s.to_string() };
        let bytes = hex::decode(s).map_err(|_| malformed())?;
        let bytes: [u8; KID_LEN] = bytes.try_into().map_err(|_| malformed())?;
        Ok(Self(bytes))
    }

    /// Returns the algorithm tag byte.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        self.0[0]
    }

    /// Returns the raw 32 key bytes.
    #[must_use]
    pub fn key_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0[1..]);
        out
    }
}

impl fmt::Display for Kid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Kid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kid({self})")
    }
}

impl TryFrom<String> for Kid {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Kid> for String {
    fn from(value: Kid) -> Self {
        value.to_string()
    }
}

/// Imports a KID as an Ed25519 verifying key.
///
/// # Errors
///
/// Returns [`KeyError::InvalidSigningKid`] when the tag is not
/// [`SIG_KID_TAG`] or the bytes are not a valid curve point.
pub fn import_signing_key(kid: &Kid) -> Result<VerifyingKey, KeyError> {
    let invalid = || KeyError::InvalidSigningKid {
        kid: kid.to_string(),
    };
    if kid.tag() != SIG_KID_TAG {
        return Err(invalid());
    }
    VerifyingKey::from_bytes(&kid.key_bytes()).map_err(|_| invalid())
}

/// Imports a KID as a Curve25519 DH public key.
///
/// # Errors
///
/// Returns [`KeyError::InvalidEncryptionKid`] when the tag is not
/// [`ENC_KID_TAG`].
pub fn import_dh_key(kid: &Kid) -> Result<MontgomeryPoint, KeyError> {
    if kid.tag() != ENC_KID_TAG {
        return Err(KeyError::InvalidEncryptionKid {
            kid: kid.to_string(),
        });
    }
    Ok(MontgomeryPoint(kid.key_bytes()))
}
