//! Chain state: the authoritative snapshot a chain folds into.
//!
//! A [`ChainState`] is used as if immutable: the link processor clones the
//! prior state, mutates the clone through the narrow `pub(crate)` mutators
//! here, and the player swaps its single stored state at commit time. A
//! failed link therefore never leaves a partially-mutated state behind.
//!
//! The logs are append-only and monotone:
//!
//! - `user_log` maps each user to their role checkpoints; the last entry is
//!   the current role, and absence means the NONE role
//! - `subteam_log` maps each subteam id to its name history; the last entry
//!   is the current name, and sibling names may never collide at a seqno
//! - `per_team_keys` is dense over `1..=latest_generation()`
//!
//! Maps and sets are `BTree`-backed so iteration and serialization are
//! deterministic.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::LinkId;
use crate::crypto::Kid;
use crate::identity::{NameError, TeamId, TeamName, TeamRole, UserVersion};
use crate::{Generation, Seqno};

#[cfg(test)]
mod proptests;
#[cfg(test)]
mod tests;

/// Errors produced by state-model queries and log appends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum StateError {
    /// A subteam log append did not advance that subteam's seqno.
    #[error("cannot add to subteam log out of order: {got} <= {last}")]
    OutOfOrderSubteam {
        /// The seqno of the rejected append.
        got: Seqno,
        /// The last seqno recorded for the subteam.
        last: Seqno,
    },

    /// A subteam name collided with a sibling's name at the same seqno.
    #[error(transparent)]
    Name(#[from] NameError),

    /// No per-team key exists at the requested generation.
    #[error("per-team-key not found for generation {generation}")]
    PerTeamKeyNotFound {
        /// The requested generation.
        generation: Generation,
    },

    /// The state holds no per-team keys at all.
    #[error("no per-team-keys recorded")]
    NoPerTeamKeys,

    /// Users cannot be enumerated by the NONE role.
    #[error("cannot list users with the NONE role")]
    NoneRoleQuery,

    /// The requested subteam is not recorded in this chain.
    #[error("subteam not found: {id}")]
    SubteamNotFound {
        /// The requested subteam id.
        id: TeamId,
    },
}

/// One checkpoint in a user's role history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLogPoint {
    /// The role assigned at this checkpoint.
    pub role: TeamRole,
    /// The seqno of the link that assigned it.
    pub seqno: Seqno,
}

/// One checkpoint in a subteam's name history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubteamLogPoint {
    /// The subteam's name at this checkpoint.
    pub name: TeamName,
    /// The seqno of the link that recorded it.
    pub seqno: Seqno,
}

/// A per-team keypair valid at a given generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerTeamKey {
    /// Key generation, dense from 1.
    pub generation: Generation,
    /// The seqno of the link that introduced this key.
    pub seqno: Seqno,
    /// Tagged Ed25519 signing KID.
    pub sig_kid: Kid,
    /// Tagged Curve25519 encryption KID.
    pub enc_kid: Kid,
}

/// The authoritative snapshot of a team chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    id: TeamId,
    name: TeamName,
    parent_id: Option<TeamId>,
    last_seqno: Seqno,
    last_link_id: LinkId,
    reader: UserVersion,
    user_log: BTreeMap<UserVersion, Vec<UserLogPoint>>,
    subteam_log: BTreeMap<TeamId, Vec<SubteamLogPoint>>,
    per_team_keys: BTreeMap<Generation, PerTeamKey>,
    stubbed_types: BTreeSet<u8>,
}

impl ChainState {
    /// Creates the state a chain-head link (root or subteam head) folds
    /// into, before membership is applied.
    #[must_use]
    pub(crate) fn new(
        reader: UserVersion,
        id: TeamId,
        name: TeamName,
        parent_id: Option<TeamId>,
        link_id: LinkId,
        initial_key: PerTeamKey,
    ) -> Self {
        let mut per_team_keys = BTreeMap::new();
        let first_seqno = initial_key.seqno;
        per_team_keys.insert(initial_key.generation, initial_key);
        Self {
            id,
            name,
            parent_id,
            last_seqno: first_seqno,
            last_link_id: link_id,
            reader,
            user_log: BTreeMap::new(),
            subteam_log: BTreeMap::new(),
            per_team_keys,
            stubbed_types: BTreeSet::new(),
        }
    }

    /// The team this chain describes.
    #[must_use]
    pub const fn id(&self) -> TeamId {
        self.id
    }

    /// The team's name.
    #[must_use]
    pub const fn name(&self) -> &TeamName {
        &self.name
    }

    /// The parent team id; present exactly when this is a subteam.
    #[must_use]
    pub const fn parent_id(&self) -> Option<TeamId> {
        self.parent_id
    }

    /// Returns `true` when this chain describes a subteam.
    #[must_use]
    pub const fn is_subteam(&self) -> bool {
        self.parent_id.is_some()
    }

    /// The seqno of the most recently applied link.
    #[must_use]
    pub const fn latest_seqno(&self) -> Seqno {
        self.last_seqno
    }

    /// The link id of the most recently applied link.
    #[must_use]
    pub const fn latest_link_id(&self) -> LinkId {
        self.last_link_id
    }

    /// The user whose perspective loaded this chain.
    #[must_use]
    pub const fn reader(&self) -> UserVersion {
        self.reader
    }

    /// The highest per-team-key generation. Equals the key count because
    /// generations are dense.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // generations are dense from 1
    pub fn latest_generation(&self) -> Generation {
        self.per_team_keys.len() as Generation
    }

    /// The user's current role; NONE when absent from the user log.
    #[must_use]
    pub fn user_role(&self, user: &UserVersion) -> TeamRole {
        self.user_log_point(user).map_or(TeamRole::None, |p| p.role)
    }

    /// The user's most recent role checkpoint, if any.
    #[must_use]
    pub fn user_log_point(&self, user: &UserVersion) -> Option<&UserLogPoint> {
        self.user_log.get(user).and_then(|points| points.last())
    }

    /// The user's most recent role checkpoint, but only when the current
    /// role is ADMIN or OWNER.
    #[must_use]
    pub fn admin_log_point(&self, user: &UserVersion) -> Option<&UserLogPoint> {
        self.user_log_point(user)
            .filter(|point| point.role.is_admin_or_above())
    }

    /// Enumerates users whose current role is `role`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NoneRoleQuery`] for the NONE role; absence
    /// from the log and an explicit NONE checkpoint are indistinguishable.
    pub fn users_with_role(&self, role: TeamRole) -> Result<Vec<UserVersion>, StateError> {
        if role == TeamRole::None {
            return Err(StateError::NoneRoleQuery);
        }
        Ok(self
            .user_log
            .keys()
            .filter(|uv| self.user_role(uv) == role)
            .copied()
            .collect())
    }

    /// The role history of a user, oldest first.
    #[must_use]
    pub fn user_log(&self, user: &UserVersion) -> &[UserLogPoint] {
        self.user_log.get(user).map_or(&[], Vec::as_slice)
    }

    /// The newest per-team key.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NoPerTeamKeys`] when the state holds no keys;
    /// an accepted chain always holds at least one.
    pub fn latest_per_team_key(&self) -> Result<&PerTeamKey, StateError> {
        self.per_team_keys
            .get(&self.latest_generation())
            .ok_or(StateError::NoPerTeamKeys)
    }

    /// The per-team key at a specific generation.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::PerTeamKeyNotFound`] when no key exists at
    /// `generation`.
    pub fn per_team_key_at_generation(
        &self,
        generation: Generation,
    ) -> Result<&PerTeamKey, StateError> {
        self.per_team_keys
            .get(&generation)
            .ok_or(StateError::PerTeamKeyNotFound { generation })
    }

    /// All per-team keys by generation.
    #[must_use]
    pub const fn per_team_keys(&self) -> &BTreeMap<Generation, PerTeamKey> {
        &self.per_team_keys
    }

    /// Returns `true` when any link in this chain was loaded as a stub.
    #[must_use]
    pub fn has_any_stubbed_links(&self) -> bool {
        !self.stubbed_types.is_empty()
    }

    /// The outer type codes of links loaded as stubs.
    #[must_use]
    pub const fn stubbed_types(&self) -> &BTreeSet<u8> {
        &self.stubbed_types
    }

    /// The current name of a subteam recorded in this chain.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::SubteamNotFound`] when the subteam has no log
    /// entries.
    pub fn subteam_name(&self, id: TeamId) -> Result<&TeamName, StateError> {
        self.last_subteam_point(id)
            .map(|point| &point.name)
            .ok_or(StateError::SubteamNotFound { id })
    }

    /// The name history of a subteam, oldest first.
    #[must_use]
    pub fn subteam_log(&self, id: TeamId) -> &[SubteamLogPoint] {
        self.subteam_log.get(&id).map_or(&[], Vec::as_slice)
    }

    fn last_subteam_point(&self, id: TeamId) -> Option<&SubteamLogPoint> {
        self.subteam_log.get(&id).and_then(|points| points.last())
    }

    /// Records a user's role as of `seqno`.
    ///
    /// Appends a checkpoint iff the role differs from the user's current
    /// role, so repeated calls with the same arguments are idempotent.
    /// Must be called with seqnos in order.
    pub(crate) fn inform(&mut self, user: UserVersion, role: TeamRole, seqno: Seqno) {
        if self.user_role(&user) == role {
            // no change in role, no new checkpoint needed
            return;
        }
        self.user_log
            .entry(user)
            .or_default()
            .push(UserLogPoint { role, seqno });
    }

    /// Records a subteam's name as of `seqno`.
    ///
    /// Appends per subteam in seqno order; entries for different subteams
    /// may interleave.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::OutOfOrderSubteam`] when `seqno` does not
    /// advance the subteam's log, and a [`NameError::SiblingCollision`]
    /// when another subteam carries the same name at `seqno`.
    pub(crate) fn inform_subteam(
        &mut self,
        id: TeamId,
        name: TeamName,
        seqno: Seqno,
    ) -> Result<(), StateError> {
        if let Some(last) = self.last_subteam_point(id) {
            if seqno <= last.seqno {
                return Err(StateError::OutOfOrderSubteam {
                    got: seqno,
                    last: last.seqno,
                });
            }
        }
        self.check_subteam_collision(id, &name, seqno)?;
        self.subteam_log
            .entry(id)
            .or_default()
            .push(SubteamLogPoint { name, seqno });
        Ok(())
    }

    /// Checks that no other subteam carries `name` at `seqno`. The other
    /// subteam's name at `seqno` is its last checkpoint strictly before it.
    fn check_subteam_collision(
        &self,
        id: TeamId,
        name: &TeamName,
        seqno: Seqno,
    ) -> Result<(), StateError> {
        for (other_id, points) in &self.subteam_log {
            if *other_id == id {
                continue;
            }
            let other_name = points
                .iter()
                .take_while(|point| point.seqno < seqno)
                .last()
                .map(|point| &point.name);
            if other_name == Some(name) {
                return Err(StateError::Name(NameError::SiblingCollision {
                    name: name.to_string(),
                    seqno,
                }));
            }
        }
        Ok(())
    }

    /// Adds a rotated per-team key.
    pub(crate) fn insert_per_team_key(&mut self, key: PerTeamKey) {
        self.per_team_keys.insert(key.generation, key);
    }

    /// Advances the chain tip.
    pub(crate) fn set_latest(&mut self, seqno: Seqno, link_id: LinkId) {
        self.last_seqno = seqno;
        self.last_link_id = link_id;
    }

    /// Records that a link of outer type `code` was loaded as a stub.
    pub(crate) fn note_stubbed(&mut self, code: u8) {
        self.stubbed_types.insert(code);
    }
}
