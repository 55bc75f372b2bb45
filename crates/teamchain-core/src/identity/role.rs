//! Team role lattice.

use serde::{Deserialize, Serialize};

/// A user's role within a team.
///
/// Roles are totally ordered: `None < Reader < Writer < Admin < Owner`.
/// Authorization thresholds in the link processor are expressed as ordering
/// comparisons, e.g. `role >= TeamRole::Admin`.
///
/// # Discriminant Stability
///
/// Explicit discriminant values are used to maintain semver compatibility.
/// New variants MUST be assigned new discriminant values; existing variants
/// MUST NOT have their discriminants changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TeamRole {
    /// Not a member. The implicit role of any user absent from the user log.
    None   = 0,
    /// May read team data.
    Reader = 1,
    /// May read and write team data.
    Writer = 2,
    /// May change membership and manage subteams.
    Admin  = 3,
    /// Full control, including ownership transfer.
    Owner  = 4,
}

impl TeamRole {
    /// Parses a role from its lowercase string form.
    ///
    /// Returns `None` when the string names no known role.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "reader" => Some(Self::Reader),
            "writer" => Some(Self::Writer),
            "admin" => Some(Self::Admin),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }

    /// Returns the lowercase string form of this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Reader => "reader",
            Self::Writer => "writer",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    /// Returns `true` for ADMIN and OWNER.
    #[must_use]
    pub const fn is_admin_or_above(self) -> bool {
        matches!(self, Self::Admin | Self::Owner)
    }
}

impl std::fmt::Display for TeamRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
