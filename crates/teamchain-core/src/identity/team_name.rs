//! Hierarchical team names.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Seqno;

/// Minimum length of a single name part.
const MIN_PART_LEN: usize = 2;

/// Maximum length of a single name part.
const MAX_PART_LEN: usize = 16;

/// Errors produced by team name parsing and hierarchy checks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum NameError {
    /// The name had no parts at all.
    #[error("empty team name")]
    Empty,

    /// A part violated the name charset or length rules.
    #[error("invalid team name part '{part}'")]
    InvalidPart {
        /// The offending part.
        part: String,
    },

    /// A subteam name does not extend its parent's name by one part.
    #[error("subteam name '{name}' does not extend parent name '{parent}'")]
    NotParentExtension {
        /// The claimed subteam name.
        name: String,
        /// The parent team's name.
        parent: String,
    },

    /// A root link carried a dotted (subteam-shaped) name.
    #[error("root team has subteam name: {name}")]
    RootHasSubteamName {
        /// The offending name.
        name: String,
    },

    /// A subteam head carried a single-part (root-shaped) name.
    #[error("subteam has root team name: {name}")]
    SubteamHasRootName {
        /// The offending name.
        name: String,
    },

    /// Two distinct subteams would share a name at the same seqno.
    #[error("multiple subteams named '{name}' at seqno {seqno}")]
    SiblingCollision {
        /// The colliding name.
        name: String,
        /// The seqno at which the collision was detected.
        seqno: Seqno,
    },
}

/// An ordered sequence of validated name parts, e.g. `acme.eng.infra`.
///
/// A root team has exactly one part. Each part matches
/// `[a-zA-Z][a-zA-Z0-9_]{1,15}`. Equality is ASCII case-insensitive on
/// parts; the original casing is preserved for display.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TeamName {
    parts: Vec<String>,
}

impl TeamName {
    /// Parses a dot-separated team name.
    ///
    /// # Errors
    ///
    /// Returns a [`NameError`] when the name is empty or any part violates
    /// the charset rules.
    pub fn parse(s: &str) -> Result<Self, NameError> {
        if s.is_empty() {
            return Err(NameError::Empty);
        }
        let parts: Vec<String> = s.split('.').map(str::to_string).collect();
        for part in &parts {
            validate_part(part)?;
        }
        Ok(Self { parts })
    }

    /// Returns a new name extended by one validated part.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::InvalidPart`] when the part violates the
    /// charset rules.
    pub fn append(&self, part: &str) -> Result<Self, NameError> {
        validate_part(part)?;
        let mut parts = self.parts.clone();
        parts.push(part.to_string());
        Ok(Self { parts })
    }

    /// Returns `true` when this is a root team name (exactly one part).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parts.len() == 1
    }

    /// Returns the final part of the name.
    #[must_use]
    pub fn last_part(&self) -> &str {
        // parts is non-empty by construction
        self.parts.last().map_or("", String::as_str)
    }

    /// Returns the number of parts.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.parts.len()
    }

    /// Returns the lowercase dotted form, used for hashing into a root id.
    #[must_use]
    pub fn to_lowercase_string(&self) -> String {
        self.to_string().to_ascii_lowercase()
    }
}

fn validate_part(part: &str) -> Result<(), NameError> {
    let invalid = || NameError::InvalidPart {
        part: part.to_string(),
    };
    if part.len() < MIN_PART_LEN || part.len() > MAX_PART_LEN {
        return Err(invalid());
    }
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(invalid()),
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(invalid())
    }
}

impl PartialEq for TeamName {
    fn eq(&self, other: &Self) -> bool {
        self.parts.len() == other.parts.len()
            && self
                .parts
                .iter()
                .zip(&other.parts)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for TeamName {}

impl fmt::Display for TeamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("."))
    }
}

impl fmt::Debug for TeamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TeamName({self})")
    }
}

impl TryFrom<String> for TeamName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TeamName> for String {
    fn from(value: TeamName) -> Self {
        value.to_string()
    }
}
