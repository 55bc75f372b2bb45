//! User identities at a specific account-reset generation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A user's account-reset generation. Incremented when the account is reset.
pub type EldestSeqno = u64;

/// Length of a raw UID in bytes.
pub const UID_LEN: usize = 16;

/// Errors produced when parsing user identities.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserVersionError {
    /// The UID portion is not valid hex of the right length.
    #[error("malformed uid '{value}': expected {UID_LEN} hex-encoded bytes")]
    MalformedUid {
        /// The offending UID text.
        value: String,
    },

    /// The eldest-seqno suffix is not a decimal integer.
    #[error("invalid eldest seqno: '{value}'")]
    MalformedEldestSeqno {
        /// The offending suffix text.
        value: String,
    },

    /// More than one `%` separator appeared.
    #[error("invalid user version: '{value}'")]
    Malformed {
        /// The offending input.
        value: String,
    },
}

/// An opaque 16-byte user identifier, rendered as 32 lowercase hex chars.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uid([u8; UID_LEN]);

impl Uid {
    /// Creates a UID from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; UID_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses a UID from its 32-char hex form.
    ///
    /// # Errors
    ///
    /// Returns [`UserVersionError::MalformedUid`] on non-hex input or a
    /// length other than 16 bytes.
    pub fn from_hex(s: &str) -> Result<Self, UserVersionError> {
        let malformed = || UserVersionError::MalformedUid {
            value: s.to_string(),
        };
        let bytes = hex::decode(s).map_err(|_| malformed())?;
        let bytes: [u8; UID_LEN] = bytes.try_into().map_err(|_| malformed())?;
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; UID_LEN] {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({self})")
    }
}

impl TryFrom<String> for Uid {
    type Error = UserVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Uid> for String {
    fn from(value: Uid) -> Self {
        value.to_string()
    }
}

/// A user identity at a specific account-reset generation.
///
/// The text form is `"<hex-uid>%<eldest-seqno>"`. When the `%`-suffix is
/// missing, the eldest seqno defaults to 1.
///
/// # Example
///
/// ```rust
/// use teamchain_core::identity::UserVersion;
///
/// let uv = UserVersion::parse("743c38cf7ceb947f5632045d8ca5d419%3").unwrap();
/// assert_eq!(uv.eldest_seqno, 3);
///
/// let defaulted = UserVersion::parse("743c38cf7ceb947f5632045d8ca5d419").unwrap();
/// assert_eq!(defaulted.eldest_seqno, 1);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserVersion {
    /// The user's UID.
    pub uid: Uid,
    /// The account-reset generation this identity refers to.
    pub eldest_seqno: EldestSeqno,
}

impl UserVersion {
    /// Creates a new user/version pair.
    #[must_use]
    pub const fn new(uid: Uid, eldest_seqno: EldestSeqno) -> Self {
        Self { uid, eldest_seqno }
    }

    /// Parses the `"<hex-uid>%<eldest-seqno>"` text form.
    ///
    /// # Errors
    ///
    /// Returns a [`UserVersionError`] on a malformed UID, a non-integer
    /// suffix, or more than one `%` separator.
    pub fn parse(s: &str) -> Result<Self, UserVersionError> {
        match s.split_once('%') {
            None => Ok(Self::new(Uid::from_hex(s)?, 1)),
            Some((uid, suffix)) => {
                if suffix.contains('%') {
                    return Err(UserVersionError::Malformed {
                        value: s.to_string(),
                    });
                }
                let eldest_seqno: EldestSeqno =
                    suffix
                        .parse()
                        .map_err(|_| UserVersionError::MalformedEldestSeqno {
                            value: suffix.to_string(),
                        })?;
                Ok(Self::new(Uid::from_hex(uid)?, eldest_seqno))
            }
        }
    }
}

impl fmt::Display for UserVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%{}", self.uid, self.eldest_seqno)
    }
}

impl fmt::Debug for UserVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserVersion({self})")
    }
}

impl TryFrom<String> for UserVersion {
    type Error = UserVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UserVersion> for String {
    fn from(value: UserVersion) -> Self {
        value.to_string()
    }
}
