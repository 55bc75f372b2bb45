//! Tests for the chain state model.

use super::*;
use crate::crypto::{ENC_KID_TAG, SIG_KID_TAG};

fn uv(n: u8) -> UserVersion {
    UserVersion::new(crate::identity::Uid::from_bytes([n; 16]), 1)
}

fn key_at(generation: Generation, seqno: Seqno) -> PerTeamKey {
    PerTeamKey {
        generation,
        seqno,
        sig_kid: Kid::new(SIG_KID_TAG, &[generation as u8; 32]),
        enc_kid: Kid::new(ENC_KID_TAG, &[generation as u8; 32]),
    }
}

fn subteam_id(n: u8) -> TeamId {
    let mut bytes = [n; 16];
    bytes[15] = crate::identity::SUBTEAM_ID_TAG;
    TeamId::from_bytes(bytes)
}

fn root_state() -> ChainState {
    let name = TeamName::parse("acme").expect("name parse");
    let id = TeamId::root_from_name(&name);
    ChainState::new(
        uv(0),
        id,
        name,
        None,
        LinkId::hash_of(b"link-1"),
        key_at(1, 1),
    )
}

#[test]
fn test_new_state_shape() {
    let state = root_state();
    assert_eq!(state.latest_seqno(), 1);
    assert!(!state.is_subteam());
    assert_eq!(state.parent_id(), None);
    assert_eq!(state.latest_generation(), 1);
    assert!(!state.has_any_stubbed_links());
    assert_eq!(state.reader(), uv(0));
}

#[test]
fn test_inform_appends_checkpoints() {
    let mut state = root_state();
    state.inform(uv(1), TeamRole::Owner, 1);
    state.inform(uv(2), TeamRole::Writer, 2);
    state.inform(uv(2), TeamRole::Admin, 3);

    assert_eq!(state.user_role(&uv(1)), TeamRole::Owner);
    assert_eq!(state.user_role(&uv(2)), TeamRole::Admin);
    assert_eq!(state.user_role(&uv(3)), TeamRole::None);
    assert_eq!(
        state.user_log(&uv(2)),
        &[
            UserLogPoint {
                role: TeamRole::Writer,
                seqno: 2
            },
            UserLogPoint {
                role: TeamRole::Admin,
                seqno: 3
            },
        ]
    );
}

#[test]
fn test_inform_is_idempotent_per_checkpoint() {
    let mut state = root_state();
    state.inform(uv(1), TeamRole::Owner, 1);
    let snapshot = state.clone();
    state.inform(uv(1), TeamRole::Owner, 1);
    assert_eq!(state, snapshot);
    assert_eq!(state.user_log(&uv(1)).len(), 1);
}

#[test]
fn test_inform_none_then_rejoin() {
    let mut state = root_state();
    state.inform(uv(1), TeamRole::Writer, 1);
    state.inform(uv(1), TeamRole::None, 2);
    assert_eq!(state.user_role(&uv(1)), TeamRole::None);
    state.inform(uv(1), TeamRole::Reader, 3);
    assert_eq!(state.user_role(&uv(1)), TeamRole::Reader);
    assert_eq!(state.user_log(&uv(1)).len(), 3);
}

#[test]
fn test_users_with_role() {
    let mut state = root_state();
    state.inform(uv(1), TeamRole::Owner, 1);
    state.inform(uv(2), TeamRole::Writer, 2);
    state.inform(uv(3), TeamRole::Writer, 2);

    let mut writers = state.users_with_role(TeamRole::Writer).expect("query");
    writers.sort();
    assert_eq!(writers, vec![uv(2), uv(3)]);
    assert_eq!(
        state.users_with_role(TeamRole::Admin).expect("query"),
        vec![]
    );
    assert!(matches!(
        state.users_with_role(TeamRole::None),
        Err(StateError::NoneRoleQuery)
    ));
}

#[test]
fn test_admin_log_point() {
    let mut state = root_state();
    state.inform(uv(1), TeamRole::Admin, 1);
    state.inform(uv(2), TeamRole::Writer, 1);
    assert!(state.admin_log_point(&uv(1)).is_some());
    assert!(state.admin_log_point(&uv(2)).is_none());
    assert!(state.admin_log_point(&uv(3)).is_none());
}

#[test]
fn test_per_team_key_lookups() {
    let mut state = root_state();
    state.insert_per_team_key(key_at(2, 5));

    assert_eq!(state.latest_generation(), 2);
    assert_eq!(
        state.latest_per_team_key().expect("latest").generation,
        2
    );
    assert_eq!(
        state
            .per_team_key_at_generation(1)
            .expect("gen 1")
            .seqno,
        1
    );
    assert!(matches!(
        state.per_team_key_at_generation(3),
        Err(StateError::PerTeamKeyNotFound { generation: 3 })
    ));
}

#[test]
fn test_inform_subteam_appends_in_order() {
    let mut state = root_state();
    let eng = TeamName::parse("acme.eng").expect("name parse");
    let ops = TeamName::parse("acme.ops").expect("name parse");

    state
        .inform_subteam(subteam_id(1), eng.clone(), 2)
        .expect("first append");
    state
        .inform_subteam(subteam_id(2), ops, 3)
        .expect("sibling append");

    assert_eq!(state.subteam_name(subteam_id(1)).expect("name"), &eng);
    assert!(matches!(
        state.subteam_name(subteam_id(9)),
        Err(StateError::SubteamNotFound { .. })
    ));
}

#[test]
fn test_inform_subteam_rejects_out_of_order() {
    let mut state = root_state();
    let eng = TeamName::parse("acme.eng").expect("name parse");

    state
        .inform_subteam(subteam_id(1), eng.clone(), 3)
        .expect("first append");
    // same seqno is a re-entry
    assert!(matches!(
        state.inform_subteam(subteam_id(1), eng.clone(), 3),
        Err(StateError::OutOfOrderSubteam { got: 3, last: 3 })
    ));
    assert!(matches!(
        state.inform_subteam(subteam_id(1), eng, 2),
        Err(StateError::OutOfOrderSubteam { got: 2, last: 3 })
    ));
}

#[test]
fn test_sibling_name_collision_is_rejected() {
    let mut state = root_state();
    let eng = TeamName::parse("acme.eng").expect("name parse");

    state
        .inform_subteam(subteam_id(1), eng.clone(), 2)
        .expect("first append");
    let err = state
        .inform_subteam(subteam_id(2), eng, 3)
        .unwrap_err();
    assert!(matches!(
        err,
        StateError::Name(NameError::SiblingCollision { seqno: 3, .. })
    ));
}

#[test]
fn test_sibling_collision_is_case_insensitive() {
    let mut state = root_state();
    let eng = TeamName::parse("acme.eng").expect("name parse");
    let eng_upper = TeamName::parse("Acme.ENG").expect("name parse");

    state
        .inform_subteam(subteam_id(1), eng, 2)
        .expect("first append");
    assert!(state.inform_subteam(subteam_id(2), eng_upper, 3).is_err());
}

#[test]
fn test_renamed_sibling_frees_its_old_name() {
    let mut state = root_state();
    let eng = TeamName::parse("acme.eng").expect("name parse");
    let infra = TeamName::parse("acme.infra").expect("name parse");

    state
        .inform_subteam(subteam_id(1), eng.clone(), 2)
        .expect("first append");
    // subteam 1 moves away from the name at seqno 4
    state
        .inform_subteam(subteam_id(1), infra, 4)
        .expect("rename");
    // at seqno 5, subteam 2 may take the freed name
    state
        .inform_subteam(subteam_id(2), eng, 5)
        .expect("name reuse after rename");
}

#[test]
fn test_clone_is_independent() {
    let mut state = root_state();
    state.inform(uv(1), TeamRole::Owner, 1);

    let copy = state.clone();
    state.inform(uv(2), TeamRole::Writer, 2);
    state.note_stubbed(36);
    state.set_latest(2, LinkId::hash_of(b"link-2"));

    assert_eq!(copy.user_role(&uv(2)), TeamRole::None);
    assert!(!copy.has_any_stubbed_links());
    assert_eq!(copy.latest_seqno(), 1);
}

#[test]
fn test_stubbed_types_tracking() {
    let mut state = root_state();
    state.note_stubbed(36);
    state.note_stubbed(36);
    assert!(state.has_any_stubbed_links());
    assert_eq!(state.stubbed_types().len(), 1);
    assert!(state.stubbed_types().contains(&36));
}
