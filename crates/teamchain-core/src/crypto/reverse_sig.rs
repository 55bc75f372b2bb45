//! Reverse-signature verification for per-team keys.

use ed25519_dalek::{Signature, VerifyingKey};

use crate::codec::reencode_with_null;
use crate::error::ChainError;

/// Path of the reverse-signature field inside an inner payload.
pub const REVERSE_SIG_PATH: [&str; 4] = ["body", "team", "per_team_key", "reverse_sig"];

/// Verifies a per-team key's reverse signature.
///
/// The signed preimage is the canonical reencoding of `payload` with the
/// field at [`REVERSE_SIG_PATH`] replaced by JSON `null` in place.
/// `reverse_sig` is lowercase hex of the 64-byte Ed25519 signature made by
/// the key being introduced.
///
/// # Errors
///
/// Returns [`ChainError::ReverseSignature`] when the payload cannot be
/// canonicalized, the signature does not decode, or verification fails.
pub fn verify_reverse_sig(
    payload: &str,
    sig_key: &VerifyingKey,
    reverse_sig: &str,
) -> Result<(), ChainError> {
    let reject = |reason: String| ChainError::ReverseSignature { reason };

    let preimage = reencode_with_null(payload.as_bytes(), &REVERSE_SIG_PATH)
        .map_err(|e| reject(format!("failed to rebuild preimage: {e}")))?;

    let sig_bytes =
        hex::decode(reverse_sig).map_err(|_| reject("signature is not hex".to_string()))?;
    let sig = Signature::from_slice(&sig_bytes)
        .map_err(|_| reject("signature has wrong length".to_string()))?;

    sig_key
        .verify_strict(&preimage, &sig)
        .map_err(|_| reject("signature does not verify".to_string()))
}
