//! Per-link-type validation and state transitions.
//!
//! The processor is the switch that makes the chain a state machine. For
//! each link it:
//!
//! 1. checks outer continuity (seqno, prev, version) and, unless the
//!    upstream loader already did, the outer signature
//! 2. decodes the inner payload and binds it to the outer link
//! 3. enforces the link type's structural predicate - which team-section
//!    fields must be present and which must be absent
//! 4. checks the signer's authorization against the **prior** state (a
//!    membership link must never authorize itself)
//! 5. folds the link into a new state built from a deep copy of the prior
//!    one
//!
//! A stubbed link (no inner payload) skips 2-5: only outer continuity is
//! checked, and the new state is the prior state with the tip advanced and
//! the stub's type code recorded.

mod members;


use std::sync::Arc;

pub use members::MembershipError;
use members::{apply_membership, sanity_check_members};

use crate::codec::{
    ChainLink, InnerLink, LinkId, LinkType, OuterLink, PerTeamKeySection, TeamSection,
    SUPPORTED_LINK_VERSION,
};
use crate::crypto::{import_dh_key, import_signing_key, verify_reverse_sig, Kid, OuterVerifier};
use crate::error::ChainError;
use crate::identity::{IdError, NameError, TeamId, TeamName, TeamRole, UserVersion};
use crate::state::{ChainState, PerTeamKey};
use crate::Generation;

/// How much cryptographic verification a batch still needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMode {
    /// Verify everything, including outer and reverse signatures.
    Full,
    /// Trust signatures already verified by an upstream loader; still
    /// enforce structure, continuity, authorization, and key invariants.
    PreVerified,
}

/// Stateless link validator. Owns the reader identity new states are
/// stamped with and the injected outer-signature capability.
pub(crate) struct Processor {
    reader: UserVersion,
    verifier: Arc<dyn OuterVerifier>,
}

/// What the outer-link check learned about a link.
struct OuterCheck {
    outer: OuterLink,
    signer: UserVersion,
    link_id: LinkId,
    inner: Option<InnerLink>,
}

impl Processor {
    pub(crate) fn new(reader: UserVersion, verifier: Arc<dyn OuterVerifier>) -> Self {
        Self { reader, verifier }
    }

    pub(crate) const fn reader(&self) -> UserVersion {
        self.reader
    }

    /// Verifies one link against `prev` and returns the state it folds
    /// into. Neither `prev` nor the link is modified.
    pub(crate) fn apply(
        &self,
        prev: Option<&ChainState>,
        link: &ChainLink,
        mode: VerifyMode,
    ) -> Result<ChainState, ChainError> {
        let checked = self.check_outer(prev, link, mode)?;

        let mut new_state = match &checked.inner {
            None => {
                let Some(prev) = prev else {
                    return Err(ChainError::StubbedFirstLink);
                };
                prev.clone()
            }
            Some(inner) => self.apply_inner(prev, link, &checked, inner, mode)?,
        };

        new_state.set_latest(checked.outer.seqno, checked.link_id);
        if checked.inner.is_none() {
            new_state.note_stubbed(checked.outer.link_type);
        }
        Ok(new_state)
    }

    /// Outer continuity and signature checks, shared by stubbed and full
    /// links.
    fn check_outer(
        &self,
        prev: Option<&ChainState>,
        link: &ChainLink,
        mode: VerifyMode,
    ) -> Result<OuterCheck, ChainError> {
        let expected_seqno = prev.map_or(1, |state| state.latest_seqno() + 1);
        if link.seqno != expected_seqno {
            return Err(ChainError::WrongSeqno {
                expected: expected_seqno,
                got: link.seqno,
            });
        }
        if link.version != SUPPORTED_LINK_VERSION {
            return Err(ChainError::VersionMismatch {
                expected: SUPPORTED_LINK_VERSION,
                got: link.version,
            });
        }
        if link.sig.is_empty() {
            return Err(ChainError::MalformedOuter {
                reason: "link has empty sig".to_string(),
            });
        }

        let outer = OuterLink::decode(&link.outer)?;
        let signer = link.signer();

        if mode == VerifyMode::Full {
            self.verifier
                .verify(&signer, &link.outer, &link.sig)
                .map_err(|e| ChainError::OuterSignature {
                    signer,
                    reason: e.to_string(),
                })?;
        }

        // the outer link must match what the server envelope claims
        outer.assert_claims(link.version, link.seqno)?;

        match prev {
            None => {
                if outer.prev.is_some() {
                    return Err(ChainError::WrongPrev { seqno: link.seqno });
                }
            }
            Some(state) => {
                let tip = state.latest_link_id();
                if !outer.prev.is_some_and(|p| p.ct_eq(&tip)) {
                    return Err(ChainError::WrongPrev { seqno: link.seqno });
                }
            }
        }

        let inner = link
            .payload
            .as_deref()
            .map(InnerLink::decode)
            .transpose()?;

        Ok(OuterCheck {
            outer,
            signer,
            link_id: link.link_id(),
            inner,
        })
    }

    /// Validates the inner payload and produces the new state.
    fn apply_inner(
        &self,
        prev: Option<&ChainState>,
        link: &ChainLink,
        checked: &OuterCheck,
        inner: &InnerLink,
        mode: VerifyMode,
    ) -> Result<ChainState, ChainError> {
        let link_type = LinkType::parse(&inner.body.link_type)?;
        check_inner_outer_match(link, &checked.outer, inner, link_type)?;

        if inner.tag != crate::codec::SIGNATURE_TAG {
            return Err(ChainError::MalformedInner {
                reason: format!("unrecognized tag: '{}'", inner.tag),
            });
        }

        let team = inner.body.team.as_ref().ok_or_else(|| {
            ChainError::MalformedInner {
                reason: "missing team section".to_string(),
            }
        })?;
        let id_text = team
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ChainError::MalformedInner {
                reason: "missing team id".to_string(),
            })?;
        let team_id = TeamId::from_hex(id_text).map_err(ChainError::Id)?;

        if let Some(state) = prev {
            if state.id() != team_id {
                return Err(ChainError::Id(IdError::WrongTeam {
                    expected: state.id(),
                    got: team_id,
                }));
            }
        }

        match link_type {
            LinkType::Root => {
                require_head_position(prev, link_type)?;
                require_sections(
                    team,
                    link_type,
                    &[
                        (SectionRule::Required, Section::Name),
                        (SectionRule::Required, Section::Members),
                        (SectionRule::Absent, Section::Parent),
                        (SectionRule::Absent, Section::Subteam),
                        (SectionRule::Required, Section::PerTeamKey),
                        (SectionRule::Absent, Section::Admin),
                    ],
                )?;
                self.handle_root(link, checked, team, team_id, mode)
            }
            LinkType::ChangeMembership => {
                let prev = require_prev(prev, link_type)?;
                require_sections(
                    team,
                    link_type,
                    &[
                        (SectionRule::Absent, Section::Name),
                        (SectionRule::Required, Section::Members),
                        (SectionRule::Absent, Section::Parent),
                        (SectionRule::Absent, Section::Subteam),
                    ],
                )?;
                self.handle_change_membership(prev, link, checked, team, mode)
            }
            LinkType::RotateKey => {
                let prev = require_prev(prev, link_type)?;
                require_sections(
                    team,
                    link_type,
                    &[
                        (SectionRule::Absent, Section::Name),
                        (SectionRule::Absent, Section::Members),
                        (SectionRule::Absent, Section::Parent),
                        (SectionRule::Absent, Section::Subteam),
                        (SectionRule::Required, Section::PerTeamKey),
                    ],
                )?;
                self.handle_rotate_key(prev, link, checked, team, mode)
            }
            LinkType::Leave => {
                let prev = require_prev(prev, link_type)?;
                require_sections(
                    team,
                    link_type,
                    &[
                        (SectionRule::Absent, Section::Name),
                        (SectionRule::Absent, Section::Members),
                        (SectionRule::Absent, Section::Parent),
                        (SectionRule::Absent, Section::Subteam),
                        (SectionRule::Absent, Section::PerTeamKey),
                        (SectionRule::Absent, Section::Admin),
                    ],
                )?;
                self.handle_leave(prev, checked)
            }
            LinkType::NewSubteam => {
                let prev = require_prev(prev, link_type)?;
                require_sections(
                    team,
                    link_type,
                    &[
                        (SectionRule::Absent, Section::Name),
                        (SectionRule::Absent, Section::Members),
                        (SectionRule::Absent, Section::Parent),
                        (SectionRule::Required, Section::Subteam),
                        (SectionRule::Absent, Section::PerTeamKey),
                    ],
                )?;
                self.handle_new_subteam(prev, checked, team)
            }
            LinkType::SubteamHead => {
                require_head_position(prev, link_type)?;
                require_sections(
                    team,
                    link_type,
                    &[
                        (SectionRule::Required, Section::Name),
                        (SectionRule::Required, Section::Members),
                        (SectionRule::Required, Section::Parent),
                        (SectionRule::Absent, Section::Subteam),
                        (SectionRule::Required, Section::PerTeamKey),
                    ],
                )?;
                self.handle_subteam_head(link, checked, team, team_id, mode)
            }
            LinkType::SubteamRename => Err(ChainError::Unsupported {
                op: "team.subteam_rename",
            }),
        }
    }

    fn handle_root(
        &self,
        link: &ChainLink,
        checked: &OuterCheck,
        team: &TeamSection,
        team_id: TeamId,
        mode: VerifyMode,
    ) -> Result<ChainState, ChainError> {
        let name = TeamName::parse(required(team.name.as_deref(), "name")?)?;
        if !name.is_root() {
            return Err(ChainError::Name(NameError::RootHasSubteamName {
                name: name.to_string(),
            }));
        }

        // a root team's id is the hash of its name
        if team_id != TeamId::root_from_name(&name) {
            return Err(ChainError::Id(IdError::NameMismatch {
                id: team_id,
                name: name.to_string(),
            }));
        }
        if !team_id.is_root() {
            return Err(ChainError::Id(IdError::NotRoot { id: team_id }));
        }

        let members = required(team.members.as_ref(), "members")?;
        let updates = sanity_check_members(members, true, false)?;

        let key_section = required(team.per_team_key.as_ref(), "per-team-key")?;
        let key = check_per_team_key(link, key_section, 1, mode)?;

        let mut state = ChainState::new(
            self.reader,
            team_id,
            name,
            None,
            checked.link_id,
            key,
        );
        apply_membership(&mut state, &updates, checked.outer.seqno);

        // the signer must end up an owner of the team they created
        let signer_role = state.user_role(&checked.signer);
        if signer_role != TeamRole::Owner {
            return Err(ChainError::PermissionDenied {
                user: checked.signer,
                role: signer_role,
                action: "create a root team",
            });
        }

        Ok(state)
    }

    fn handle_change_membership(
        &self,
        prev: &ChainState,
        link: &ChainLink,
        checked: &OuterCheck,
        team: &TeamSection,
        mode: VerifyMode,
    ) -> Result<ChainState, ChainError> {
        let signer_role = prev.user_role(&checked.signer);
        if signer_role < TeamRole::Admin {
            return Err(ChainError::PermissionDenied {
                user: checked.signer,
                role: signer_role,
                action: "change membership",
            });
        }

        let members = required(team.members.as_ref(), "members")?;
        let updates = sanity_check_members(members, false, true)?;

        let mut state = prev.clone();
        apply_membership(&mut state, &updates, checked.outer.seqno);

        // a removal should rotate the per-team key, but that is the issuing
        // server's policy and not checked when reading
        if let Some(key_section) = &team.per_team_key {
            let expected = prev.latest_per_team_key()?.generation + 1;
            let key = check_per_team_key(link, key_section, expected, mode)?;
            state.insert_per_team_key(key);
        }

        Ok(state)
    }

    fn handle_rotate_key(
        &self,
        prev: &ChainState,
        link: &ChainLink,
        checked: &OuterCheck,
        team: &TeamSection,
        mode: VerifyMode,
    ) -> Result<ChainState, ChainError> {
        let signer_role = prev.user_role(&checked.signer);
        if signer_role < TeamRole::Writer {
            return Err(ChainError::PermissionDenied {
                user: checked.signer,
                role: signer_role,
                action: "rotate the per-team key",
            });
        }

        let key_section = required(team.per_team_key.as_ref(), "per-team-key")?;
        let expected = prev.latest_per_team_key()?.generation + 1;
        let key = check_per_team_key(link, key_section, expected, mode)?;

        let mut state = prev.clone();
        state.insert_per_team_key(key);
        Ok(state)
    }

    fn handle_leave(
        &self,
        prev: &ChainState,
        checked: &OuterCheck,
    ) -> Result<ChainState, ChainError> {
        let signer_role = prev.user_role(&checked.signer);
        if signer_role < TeamRole::Reader {
            return Err(ChainError::PermissionDenied {
                user: checked.signer,
                role: signer_role,
                action: "leave the team",
            });
        }

        // the last owner leaving is between them and the issuing server;
        // this is a record of what happened, not a policy gate
        let mut state = prev.clone();
        state.inform(checked.signer, TeamRole::None, checked.outer.seqno);
        Ok(state)
    }

    fn handle_new_subteam(
        &self,
        prev: &ChainState,
        checked: &OuterCheck,
        team: &TeamSection,
    ) -> Result<ChainState, ChainError> {
        let subteam = required(team.subteam.as_ref(), "subteam")?;

        let subteam_id = TeamId::from_hex(&subteam.id).map_err(ChainError::Id)?;
        if !subteam_id.is_subteam() {
            return Err(ChainError::Id(IdError::NotSubteam { id: subteam_id }));
        }

        let subteam_name = TeamName::parse(&subteam.name)?;
        // the subteam name must be a direct child of this team's name
        let expected = prev.name().append(subteam_name.last_part())?;
        if expected != subteam_name {
            return Err(ChainError::Name(NameError::NotParentExtension {
                name: subteam_name.to_string(),
                parent: prev.name().to_string(),
            }));
        }

        let mut state = prev.clone();
        state.inform_subteam(subteam_id, subteam_name, checked.outer.seqno)?;
        Ok(state)
    }

    fn handle_subteam_head(
        &self,
        link: &ChainLink,
        checked: &OuterCheck,
        team: &TeamSection,
        team_id: TeamId,
        mode: VerifyMode,
    ) -> Result<ChainState, ChainError> {
        if !team_id.is_subteam() {
            return Err(ChainError::Id(IdError::NotSubteam { id: team_id }));
        }

        let parent = required(team.parent.as_ref(), "parent")?;
        let parent_id = TeamId::from_hex(&parent.id).map_err(ChainError::Id)?;

        let name = TeamName::parse(required(team.name.as_deref(), "name")?)?;
        if name.is_root() {
            return Err(ChainError::Name(NameError::SubteamHasRootName {
                name: name.to_string(),
            }));
        }

        let members = required(team.members.as_ref(), "members")?;
        let updates = sanity_check_members(members, false, false)?;

        let key_section = required(team.per_team_key.as_ref(), "per-team-key")?;
        let key = check_per_team_key(link, key_section, 1, mode)?;

        let mut state = ChainState::new(
            self.reader,
            team_id,
            name,
            Some(parent_id),
            checked.link_id,
            key,
        );
        apply_membership(&mut state, &updates, checked.outer.seqno);
        Ok(state)
    }
}

/// Team-section fields a link type constrains.
#[derive(Debug, Clone, Copy)]
enum Section {
    Name,
    Members,
    Parent,
    Subteam,
    PerTeamKey,
    Admin,
}

impl Section {
    const fn attr(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Members => "members",
            Self::Parent => "parent",
            Self::Subteam => "subteam",
            Self::PerTeamKey => "per-team-key",
            Self::Admin => "admin",
        }
    }

    fn present_in(self, team: &TeamSection) -> bool {
        match self {
            Self::Name => team.name.is_some(),
            Self::Members => team.members.is_some(),
            Self::Parent => team.parent.is_some(),
            Self::Subteam => team.subteam.is_some(),
            Self::PerTeamKey => team.per_team_key.is_some(),
            Self::Admin => team.admin.is_some(),
        }
    }
}

/// Whether a section must be present or absent. Sections not listed in a
/// rule set may go either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionRule {
    Required,
    Absent,
}

/// Enforces a link type's structural predicate over the team section.
fn require_sections(
    team: &TeamSection,
    link_type: LinkType,
    rules: &[(SectionRule, Section)],
) -> Result<(), ChainError> {
    for (rule, section) in rules {
        let present = section.present_in(team);
        match rule {
            SectionRule::Required if !present => {
                return Err(ChainError::MalformedLink {
                    reason: format!("{link_type} link is missing {}", section.attr()),
                });
            }
            SectionRule::Absent if present => {
                return Err(ChainError::MalformedLink {
                    reason: format!("{link_type} link contains unexpected {}", section.attr()),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Checks that a chain-head link type (root, subteam head) starts a chain.
fn require_head_position(
    prev: Option<&ChainState>,
    link_type: LinkType,
) -> Result<(), ChainError> {
    match prev {
        None => Ok(()),
        Some(state) => Err(ChainError::MalformedLink {
            reason: format!(
                "link type '{link_type}' unexpected at seqno {}",
                state.latest_seqno() + 1
            ),
        }),
    }
}

/// Checks that a continuation link type extends a chain, and hands back
/// the state it extends.
fn require_prev<'a>(
    prev: Option<&'a ChainState>,
    link_type: LinkType,
) -> Result<&'a ChainState, ChainError> {
    prev.ok_or_else(|| ChainError::MalformedLink {
        reason: format!("link type '{link_type}' unexpected at beginning"),
    })
}

/// Unwraps a section the predicate already proved present.
fn required<T>(value: Option<T>, attr: &'static str) -> Result<T, ChainError> {
    value.ok_or_else(|| ChainError::MalformedLink {
        reason: format!("missing {attr}"),
    })
}

/// Checks that the inner payload's claims match the outer link.
fn check_inner_outer_match(
    link: &ChainLink,
    outer: &OuterLink,
    inner: &InnerLink,
    link_type: LinkType,
) -> Result<(), ChainError> {
    let inner_prev = inner.prev_link_id()?;
    let payload_hash = link
        .payload_hash()
        .ok_or(ChainError::InnerOuterMismatch { field: "curr" })?;
    outer.assert_inner_binding(
        inner.body.version,
        inner.seqno,
        inner_prev,
        payload_hash,
        link_type.code(),
    )
}

/// Validates a per-team-key section and returns the key to store.
///
/// The generation must be exactly `expected`; the signing KID must import
/// as an Ed25519 key and the encryption KID as a Curve25519 key; and in
/// [`VerifyMode::Full`] the reverse signature must verify over the nulled
/// canonical payload.
fn check_per_team_key(
    link: &ChainLink,
    section: &PerTeamKeySection,
    expected: Generation,
    mode: VerifyMode,
) -> Result<PerTeamKey, ChainError> {
    if section.generation != expected {
        return Err(ChainError::WrongKeyGeneration {
            expected,
            got: section.generation,
        });
    }

    let sig_kid = Kid::from_hex(&section.sig_kid).map_err(ChainError::Key)?;
    let sig_key = import_signing_key(&sig_kid).map_err(ChainError::Key)?;

    let enc_kid = Kid::from_hex(&section.enc_kid).map_err(ChainError::Key)?;
    import_dh_key(&enc_kid).map_err(ChainError::Key)?;

    if mode == VerifyMode::Full {
        let reverse_sig =
            section
                .reverse_sig
                .as_deref()
                .ok_or_else(|| ChainError::ReverseSignature {
                    reason: "missing reverse sig".to_string(),
                })?;
        let payload = link
            .payload
            .as_deref()
            .ok_or_else(|| ChainError::ReverseSignature {
                reason: "no payload to verify against".to_string(),
            })?;
        verify_reverse_sig(payload, &sig_key, reverse_sig)?;
    }

    Ok(PerTeamKey {
        generation: section.generation,
        seqno: link.seqno,
        sig_kid,
        enc_kid,
    })
}
