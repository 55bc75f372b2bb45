//! Error taxonomy for chain verification.
//!
//! Every rejection reason is a value of [`ChainError`]. Category-local
//! detail lives in nested enums defined beside the code that detects it
//! ([`NameError`], [`IdError`], [`KeyError`], [`MembershipError`],
//! [`StateError`]) and converts via `#[from]`. Nothing is recovered inside
//! the core; any error fails the entire batch and the player's pre-batch
//! state is preserved.

use thiserror::Error;

use crate::crypto::KeyError;
use crate::identity::{IdError, NameError, TeamRole, UserVersion};
use crate::processor::MembershipError;
use crate::state::StateError;
use crate::{Generation, Seqno};

/// Reasons a chain link is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChainError {
    /// The outer envelope failed to decode.
    #[error("malformed outer link: {reason}")]
    MalformedOuter {
        /// What failed to decode.
        reason: String,
    },

    /// The inner payload failed to decode or violated the payload grammar.
    #[error("malformed inner link: {reason}")]
    MalformedInner {
        /// What failed to decode.
        reason: String,
    },

    /// A link-type structural predicate failed (wrong sections present).
    #[error("malformed link: {reason}")]
    MalformedLink {
        /// Which predicate failed.
        reason: String,
    },

    /// The outer envelope and inner payload disagree on a bound field.
    #[error("inner/outer mismatch on {field}")]
    InnerOuterMismatch {
        /// The field that differs between the two layers.
        field: &'static str,
    },

    /// The link's seqno does not continue the chain.
    #[error("expected seqno {expected} but got {got}")]
    WrongSeqno {
        /// The seqno the chain requires next.
        expected: Seqno,
        /// The seqno the link claimed.
        got: Seqno,
    },

    /// The link's prev hash does not match the chain tip.
    #[error("wrong outer prev at seqno {seqno}")]
    WrongPrev {
        /// The seqno of the offending link.
        seqno: Seqno,
    },

    /// A stubbed link appeared as the first link of a chain.
    #[error("first link cannot be stubbed")]
    StubbedFirstLink,

    /// The link format version is not supported.
    #[error("expected link version {expected} but got {got}")]
    VersionMismatch {
        /// The supported version.
        expected: u8,
        /// The version the link claimed.
        got: u8,
    },

    /// The outer signature failed verification.
    #[error("outer signature rejected for {signer}: {reason}")]
    OuterSignature {
        /// The claimed signing user.
        signer: UserVersion,
        /// Why the verifier rejected it.
        reason: String,
    },

    /// A per-team-key reverse signature failed verification.
    #[error("per-team-key reverse sig: {reason}")]
    ReverseSignature {
        /// Why the reverse signature was rejected.
        reason: String,
    },

    /// The signing user lacks the role the link type requires.
    #[error("{user} is a {role} and may not {action}")]
    PermissionDenied {
        /// The signing user.
        user: UserVersion,
        /// The signer's role in the prior state.
        role: TeamRole,
        /// The operation that was refused.
        action: &'static str,
    },

    /// A members section failed the sanity check.
    #[error(transparent)]
    Membership(#[from] MembershipError),

    /// A team name was malformed or violated the hierarchy rules.
    #[error(transparent)]
    Name(#[from] NameError),

    /// A team id was malformed or carried the wrong tag.
    #[error(transparent)]
    Id(#[from] IdError),

    /// A per-team-key KID failed to parse as a key of the right algorithm.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// A state-model log append was rejected.
    #[error(transparent)]
    State(#[from] StateError),

    /// A per-team-key generation did not continue the dense sequence.
    #[error("per-team-key generation must be {expected} but got {got}")]
    WrongKeyGeneration {
        /// The required next generation.
        expected: Generation,
        /// The generation the link claimed.
        got: Generation,
    },

    /// A declared-but-unsupported operation was requested.
    #[error("unsupported operation: {op}")]
    Unsupported {
        /// The operation name.
        op: &'static str,
    },

    /// The inner link type string is unknown or empty.
    #[error("unsupported link type: '{link_type}'")]
    UnsupportedLinkType {
        /// The offending type string.
        link_type: String,
    },

    /// The batch was cancelled between links.
    #[error("cancelled")]
    Cancelled,
}
