//! Outer-link signature verification capability.

use std::collections::BTreeMap;

use ed25519_dalek::{Signature, VerifyingKey};
use thiserror::Error;

use crate::identity::UserVersion;

/// Errors produced by outer-link verification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum VerifyError {
    /// The verifier holds no key for the claimed signer.
    #[error("no known signing key for {signer}")]
    UnknownSigner {
        /// The claimed signing user.
        signer: UserVersion,
    },

    /// The signature bytes do not decode as an Ed25519 signature.
    #[error("malformed outer signature")]
    MalformedSignature,

    /// The signature does not verify under the signer's key.
    #[error("outer signature does not verify for {signer}")]
    BadSignature {
        /// The claimed signing user.
        signer: UserVersion,
    },
}

/// Capability that verifies an outer link's signature against the signing
/// user's key as of the link's time.
///
/// A production implementation resolves the key from the signer's user
/// sigchain. Implementations are called under the player's mutex and
/// should stay pure-CPU; any I/O belongs outside the player.
pub trait OuterVerifier: Send + Sync {
    /// Verifies `sig` over `outer` for `signer`.
    ///
    /// # Errors
    ///
    /// Returns a [`VerifyError`] when the signer is unknown or the
    /// signature is malformed or invalid.
    fn verify(&self, signer: &UserVersion, outer: &[u8], sig: &[u8]) -> Result<(), VerifyError>;
}

/// An [`OuterVerifier`] backed by a static directory of signer keys.
///
/// Suitable for tests and for embedders that resolve signer keys up front.
#[derive(Debug, Clone, Default)]
pub struct KeyDirectory {
    keys: BTreeMap<UserVersion, VerifyingKey>,
}

impl KeyDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `key` as `signer`'s signing key, replacing any previous
    /// entry.
    pub fn insert(&mut self, signer: UserVersion, key: VerifyingKey) {
        self.keys.insert(signer, key);
    }

    /// Returns the number of registered signers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` when no signers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl OuterVerifier for KeyDirectory {
    fn verify(&self, signer: &UserVersion, outer: &[u8], sig: &[u8]) -> Result<(), VerifyError> {
        let key = self
            .keys
            .get(signer)
            .ok_or(VerifyError::UnknownSigner { signer: *signer })?;
        let sig = Signature::from_slice(sig).map_err(|_| VerifyError::MalformedSignature)?;
        key.verify_strict(outer, &sig)
            .map_err(|_| VerifyError::BadSignature { signer: *signer })
    }
}
