//! Property-based tests for state-model invariants.

use proptest::prelude::*;

use super::*;
use crate::crypto::{ENC_KID_TAG, SIG_KID_TAG};

fn uv(n: u8) -> UserVersion {
    UserVersion::new(crate::identity::Uid::from_bytes([n; 16]), 1)
}

fn base_state() -> ChainState {
    let name = TeamName::parse("acme").expect("name parse");
    let id = TeamId::root_from_name(&name);
    let key = PerTeamKey {
        generation: 1,
        seqno: 1,
        sig_kid: Kid::new(SIG_KID_TAG, &[1u8; 32]),
        enc_kid: Kid::new(ENC_KID_TAG, &[1u8; 32]),
    };
    ChainState::new(uv(0), id, name, None, LinkId::hash_of(b"link-1"), key)
}

/// Strategy for a role drawn from the full lattice.
fn role() -> impl Strategy<Value = TeamRole> {
    prop_oneof![
        Just(TeamRole::None),
        Just(TeamRole::Reader),
        Just(TeamRole::Writer),
        Just(TeamRole::Admin),
        Just(TeamRole::Owner),
    ]
}

proptest! {
    /// Property: user-log seqnos are strictly increasing no matter what
    /// role assignments arrive, as long as seqnos arrive in order.
    #[test]
    fn prop_user_log_seqnos_strictly_increase(
        assignments in prop::collection::vec((0u8..4, role()), 0..40),
    ) {
        let mut state = base_state();
        for (seqno_offset, (user, new_role)) in assignments.into_iter().enumerate() {
            let seqno = 2 + seqno_offset as Seqno;
            state.inform(uv(user), new_role, seqno);
        }
        for user in 0u8..4 {
            let log = state.user_log(&uv(user));
            for pair in log.windows(2) {
                prop_assert!(pair[0].seqno < pair[1].seqno);
            }
            // consecutive checkpoints always change the role
            for pair in log.windows(2) {
                prop_assert_ne!(pair[0].role, pair[1].role);
            }
        }
    }

    /// Property: informing the same (user, role, seqno) twice equals
    /// informing once.
    #[test]
    fn prop_inform_is_idempotent(user in 0u8..8, new_role in role(), seqno in 2u64..100) {
        let mut once = base_state();
        once.inform(uv(user), new_role, seqno);
        let mut twice = once.clone();
        twice.inform(uv(user), new_role, seqno);
        prop_assert_eq!(once, twice);
    }

    /// Property: after inserting generations 2..=n in order, the key table
    /// is dense over 1..=n and the latest generation equals the count.
    #[test]
    fn prop_per_team_keys_stay_dense(extra in 0u32..20) {
        let mut state = base_state();
        for generation in 2..=(1 + extra) {
            state.insert_per_team_key(PerTeamKey {
                generation,
                seqno: Seqno::from(generation),
                sig_kid: Kid::new(SIG_KID_TAG, &[2u8; 32]),
                enc_kid: Kid::new(ENC_KID_TAG, &[2u8; 32]),
            });
        }
        let max = state.latest_generation();
        prop_assert_eq!(max, 1 + extra);
        let generations: Vec<Generation> = state.per_team_keys().keys().copied().collect();
        let expected: Vec<Generation> = (1..=max).collect();
        prop_assert_eq!(generations, expected);
    }

    /// Property: subteam logs accept strictly increasing seqnos and reject
    /// anything else.
    #[test]
    fn prop_subteam_log_is_monotone(seqnos in prop::collection::vec(2u64..50, 1..10)) {
        let mut state = base_state();
        let name = TeamName::parse("acme.eng").expect("name parse");
        let mut id_bytes = [7u8; 16];
        id_bytes[15] = crate::identity::SUBTEAM_ID_TAG;
        let id = TeamId::from_bytes(id_bytes);

        let mut last: Option<Seqno> = None;
        for seqno in seqnos {
            let result = state.inform_subteam(id, name.clone(), seqno);
            if last.is_some_and(|l| seqno <= l) {
                prop_assert!(result.is_err());
            } else {
                prop_assert!(result.is_ok());
                last = Some(seqno);
            }
        }
        let log = state.subteam_log(id);
        for pair in log.windows(2) {
            prop_assert!(pair[0].seqno < pair[1].seqno);
        }
    }
}
