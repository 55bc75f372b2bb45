//! Member sanity checking and membership application.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::codec::MembersSection;
use crate::identity::{TeamRole, UserVersion, UserVersionError};
use crate::state::ChainState;
use crate::Seqno;

/// Errors produced by the member sanity check.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum MembershipError {
    /// The same user appeared in more than one role list.
    #[error("duplicate user in members: {user}")]
    DuplicateMember {
        /// The duplicated user.
        user: UserVersion,
    },

    /// A link that must name owners named none.
    #[error("team has no owners")]
    MissingOwners,

    /// A link that may not remove members carried a non-empty NONE list.
    #[error("team has removals in link")]
    RemovalsNotAllowed,

    /// A member entry failed to parse as a user version.
    #[error(transparent)]
    UserVersion(#[from] UserVersionError),
}

/// A normalized members section: one entry per role that appeared in the
/// input, even when its list is empty (an empty list explicitly clears the
/// role in an update).
pub(crate) type RoleUpdates = BTreeMap<TeamRole, Vec<UserVersion>>;

/// Normalizes and sanity-checks a members section.
///
/// - every entry must parse as a user version
/// - no user may appear in more than one list
/// - `require_owners` demands a non-empty owners list (root links)
/// - `allow_removals` permits a non-empty NONE list (membership changes)
///
/// Removals are not checked against current membership; that is true of
/// well-formed chains but not enforced when reading.
pub(crate) fn sanity_check_members(
    members: &MembersSection,
    require_owners: bool,
    allow_removals: bool,
) -> Result<RoleUpdates, MembershipError> {
    if require_owners && members.owners.as_deref().is_none_or(<[String]>::is_empty) {
        return Err(MembershipError::MissingOwners);
    }
    if !allow_removals && members.none.as_deref().is_some_and(|list| !list.is_empty()) {
        return Err(MembershipError::RemovalsNotAllowed);
    }

    let lists = [
        (TeamRole::Owner, members.owners.as_deref()),
        (TeamRole::Admin, members.admins.as_deref()),
        (TeamRole::Writer, members.writers.as_deref()),
        (TeamRole::Reader, members.readers.as_deref()),
        (TeamRole::None, members.none.as_deref()),
    ];

    let mut updates = RoleUpdates::new();
    let mut seen: BTreeSet<UserVersion> = BTreeSet::new();

    for (role, list) in lists {
        let Some(list) = list else { continue };
        let entry = updates.entry(role).or_default();
        for text in list {
            let user = UserVersion::parse(text)?;
            if !seen.insert(user) {
                return Err(MembershipError::DuplicateMember { user });
            }
            entry.push(user);
        }
    }

    Ok(updates)
}

/// Applies normalized role updates to `state` at `seqno`. The NONE list
/// removes users; the other lists add them. Ordering within a link does not
/// matter because all entries share the same seqno and distinct users.
pub(crate) fn apply_membership(state: &mut ChainState, updates: &RoleUpdates, seqno: Seqno) {
    for (role, users) in updates {
        for user in users {
            state.inform(*user, *role, seqno);
        }
    }
}
