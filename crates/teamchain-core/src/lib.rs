//! # teamchain-core
//!
//! Core library for teamchain - a deterministic player for hierarchical team
//! signature chains.
//!
//! This crate ingests an ordered sequence of signed links describing the
//! evolution of a team (membership, roles, per-team keys, subteam creation)
//! and produces an authoritative in-memory snapshot of the team's current
//! state. Given a chain prefix and a proposed next link, it decides
//! acceptance or rejection according to structural, authorization,
//! continuity, and cryptographic invariants.
//!
//! ## Features
//!
//! - **Link codec**: decode the hash-chained outer envelope and the typed
//!   inner JSON payload, and bind the two layers together cryptographically
//! - **Crypto verification**: outer Ed25519 signatures (through a pluggable
//!   [`crypto::OuterVerifier`] capability) and per-team-key reverse
//!   signatures over a canonical JSON preimage
//! - **State model**: immutable chain snapshots with append-only user and
//!   subteam logs and a dense per-team-key generation table
//! - **Player**: a mutex-guarded owner of the current state with atomic
//!   batch application - a rejected batch leaves the state untouched
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use teamchain_core::crypto::KeyDirectory;
//! use teamchain_core::identity::UserVersion;
//! use teamchain_core::player::{CancelToken, Player};
//!
//! # fn example(links: &[teamchain_core::codec::ChainLink]) -> Result<(), Box<dyn std::error::Error>> {
//! let reader = UserVersion::parse("743c38cf7ceb947f5632045d8ca5d419")?;
//! let player = Player::new(reader, Arc::new(KeyDirectory::new()));
//!
//! player.add_links(&CancelToken::new(), links)?;
//! let state = player.state()?;
//! println!("team {} is at seqno {}", state.name(), state.latest_seqno());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod player;
pub mod processor;
pub mod state;

#[cfg(test)]
pub(crate) mod testutil;

/// Chain sequence number. 1-based and contiguous within a chain.
pub type Seqno = u64;

/// Per-team-key generation. Dense from 1 with no gaps.
pub type Generation = u32;

pub use codec::{ChainLink, LinkId, LinkType};
pub use error::ChainError;
pub use identity::{TeamId, TeamName, TeamRole, Uid, UserVersion};
pub use player::{CancelToken, Player, PlayerError};
pub use state::ChainState;
