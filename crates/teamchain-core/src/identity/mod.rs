//! Identifiers and names for teams and users.
//!
//! This module provides the identity vocabulary the rest of the crate is
//! written in:
//!
//! - [`Uid`] and [`UserVersion`]: a user identity at a specific
//!   account-reset generation, parsed from the `"<hex-uid>%<eldest-seqno>"`
//!   text form
//! - [`TeamId`]: a 16-byte tagged identifier distinguishing root teams from
//!   subteams; a root team's id is derived from its name hash
//! - [`TeamName`]: a validated dot-separated path (`acme.eng.infra`) with
//!   case-insensitive equality
//! - [`TeamRole`]: the ordered role lattice used for authorization checks

mod role;
mod team_id;
mod team_name;
mod user_version;


pub use role::TeamRole;
pub use team_id::{IdError, TeamId, ROOT_TEAM_ID_TAG, SUBTEAM_ID_TAG, TEAM_ID_LEN};
pub use team_name::{NameError, TeamName};
pub use user_version::{EldestSeqno, Uid, UserVersion, UserVersionError, UID_LEN};
