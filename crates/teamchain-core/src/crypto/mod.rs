//! Cryptographic verification for chain links.
//!
//! Three checks gate every non-stubbed link:
//!
//! - **Outer signature**: the outer link bytes are verified against the
//!   signing user's key as of the link's time. The lookup lives outside
//!   this crate and is injected through the [`OuterVerifier`] trait; a
//!   [`KeyDirectory`] implementation is provided for embedders that already
//!   know the signer keys.
//! - **Signer authorization**: derived from prior chain state by the link
//!   processor, not here.
//! - **Reverse signature**: a link that introduces a per-team key must
//!   prove possession of it. The new signing key signs the inner payload
//!   with its own `reverse_sig` field blanked to JSON `null`; verification
//!   recomputes that preimage canonically.
//!
//! Keys cross the wire as tagged KIDs: one algorithm tag byte followed by
//! the 32 raw key bytes, lowercase hex. Ed25519 signing keys use
//! [`SIG_KID_TAG`] and Curve25519 DH keys use [`ENC_KID_TAG`].

mod keys;
mod reverse_sig;
mod verifier;


pub use keys::{
    import_dh_key, import_signing_key, KeyError, Kid, ENC_KID_TAG, KID_LEN, SIG_KID_TAG,
};
pub use reverse_sig::{verify_reverse_sig, REVERSE_SIG_PATH};
pub use verifier::{KeyDirectory, OuterVerifier, VerifyError};
