//! Thread-safe owner of a chain's current state.
//!
//! The player holds either no state (fresh) or exactly one current
//! [`ChainState`], behind a single mutex that covers whole batch
//! applications and state reads. Links within a batch apply strictly in
//! input order; across concurrent batches the mutex linearizes, so
//! observers only ever see the state of a fully-accepted batch.
//!
//! Verification runs under the mutex. The injected
//! [`OuterVerifier`](crate::crypto::OuterVerifier) is called on that path
//! and should stay pure-CPU; network fetches belong outside the player.

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::ChainLink;
use crate::crypto::OuterVerifier;
use crate::error::ChainError;
use crate::identity::UserVersion;
use crate::processor::{Processor, VerifyMode};
use crate::state::ChainState;
use crate::Seqno;

/// Errors returned by player operations. Link rejections carry the batch
/// position at which they occurred.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlayerError {
    /// `add_links` was called with an empty batch.
    #[error("no links to add")]
    EmptyBatch,

    /// `state` was called before any link was accepted.
    #[error("no links loaded")]
    NoState,

    /// A link was rejected before any state existed.
    #[error("at beginning: {source}")]
    AtStart {
        /// The rejection reason.
        source: ChainError,
    },

    /// A link was rejected while the chain stood at `seqno`.
    #[error("at seqno {seqno}: {source}")]
    AtSeqno {
        /// The last accepted seqno when the rejection occurred.
        seqno: Seqno,
        /// The rejection reason.
        source: ChainError,
    },
}

/// A cloneable cancellation flag checked between links of a batch.
///
/// Cancellation does not interrupt the link currently being verified; if
/// the flag is set between links, the batch fails with
/// [`ChainError::Cancelled`] and the player's state is unchanged.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. All clones observe the flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A local model of one team's signature chain.
///
/// Batches either commit whole or not at all: if any link in a batch is
/// rejected, the stored state is exactly what it was before the call.
pub struct Player {
    processor: Processor,
    state: Mutex<Option<ChainState>>,
}

impl Player {
    /// Creates a player with no loaded state, reading the chain from
    /// `reader`'s perspective. The verifier capability checks outer-link
    /// signatures against user signing keys.
    #[must_use]
    pub fn new(reader: UserVersion, verifier: Arc<dyn OuterVerifier>) -> Self {
        Self {
            processor: Processor::new(reader, verifier),
            state: Mutex::new(None),
        }
    }

    /// Creates a player primed with a previously computed state.
    #[must_use]
    pub fn with_state(
        reader: UserVersion,
        verifier: Arc<dyn OuterVerifier>,
        state: ChainState,
    ) -> Self {
        Self {
            processor: Processor::new(reader, verifier),
            state: Mutex::new(Some(state)),
        }
    }

    /// The user whose perspective this player loads the chain from.
    #[must_use]
    pub const fn reader(&self) -> UserVersion {
        self.processor.reader()
    }

    /// Returns an independent deep copy of the current state.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::NoState`] when no links have been accepted.
    pub fn state(&self) -> Result<ChainState, PlayerError> {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        // callers get a copy so nothing they do can reach our stored state
        guard.clone().ok_or(PlayerError::NoState)
    }

    /// Verifies and applies a batch of links in order.
    ///
    /// # Errors
    ///
    /// Returns a [`PlayerError`] carrying the failing position; the stored
    /// state is unchanged on any failure.
    pub fn add_links(&self, cancel: &CancelToken, links: &[ChainLink]) -> Result<(), PlayerError> {
        self.add_links_common(cancel, links, VerifyMode::Full)
    }

    /// Applies a batch whose signatures an upstream loader already
    /// verified. Structural, continuity, authorization, and key-generation
    /// invariants are still enforced.
    ///
    /// # Errors
    ///
    /// Returns a [`PlayerError`] carrying the failing position; the stored
    /// state is unchanged on any failure.
    pub fn add_links_verified(
        &self,
        cancel: &CancelToken,
        links: &[ChainLink],
    ) -> Result<(), PlayerError> {
        self.add_links_common(cancel, links, VerifyMode::PreVerified)
    }

    fn add_links_common(
        &self,
        cancel: &CancelToken,
        links: &[ChainLink],
        mode: VerifyMode,
    ) -> Result<(), PlayerError> {
        if links.is_empty() {
            return Err(PlayerError::EmptyBatch);
        }

        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        // fold over a working copy; the stored state is only replaced once
        // the whole batch has been accepted
        let mut acc = guard.clone();
        for link in links {
            if cancel.is_cancelled() {
                let err = at_position(acc.as_ref(), ChainError::Cancelled);
                warn!(error = %err, "link batch cancelled");
                return Err(err);
            }
            match self.processor.apply(acc.as_ref(), link, mode) {
                Ok(new_state) => acc = Some(new_state),
                Err(source) => {
                    let err = at_position(acc.as_ref(), source);
                    warn!(error = %err, "link batch rejected");
                    return Err(err);
                }
            }
        }

        if let Some(state) = &acc {
            debug!(
                links = links.len(),
                seqno = state.latest_seqno(),
                team = %state.id(),
                "link batch accepted"
            );
        }
        *guard = acc;
        Ok(())
    }
}

/// Wraps a rejection with the position the chain stood at.
fn at_position(state: Option<&ChainState>, source: ChainError) -> PlayerError {
    match state {
        None => PlayerError::AtStart { source },
        Some(state) => PlayerError::AtSeqno {
            seqno: state.latest_seqno(),
            source,
        },
    }
}
