//! Tests for the player: batch semantics, atomicity, cancellation.

use serde_json::json;

use super::*;
use crate::codec::LinkType;
use crate::identity::TeamRole;
use crate::testutil::{after, LinkFactory};

/// Builds a three-link chain: root, add b as admin, rotate to gen 2.
fn three_link_chain(factory: &mut LinkFactory) -> (UserVersion, Vec<ChainLink>) {
    let a = factory.user(1);
    let b = factory.user(2);

    let root = factory.root_link("acme", &[a], a);
    let team_id = {
        let name = crate::identity::TeamName::parse("acme").expect("name parse");
        crate::identity::TeamId::root_from_name(&name)
    };

    let (seqno, prev) = after(&root);
    let team = json!({
        "id": team_id.to_string(),
        "members": LinkFactory::members(&[("admins", &[b][..])]),
    });
    let add_admin = factory.make_link(seqno, prev, a, LinkType::ChangeMembership, team);

    let (seqno, prev) = after(&add_admin);
    let team = json!({
        "id": team_id.to_string(),
        "per_team_key": LinkFactory::ptk_section(2),
    });
    let rotate = factory.make_link(seqno, prev, a, LinkType::RotateKey, team);

    (a, vec![root, add_admin, rotate])
}

#[test]
fn test_add_links_folds_a_batch() {
    let mut factory = LinkFactory::new();
    let (a, links) = three_link_chain(&mut factory);
    let player = Player::new(a, factory.verifier());

    player
        .add_links(&CancelToken::new(), &links)
        .expect("batch should be accepted");

    let state = player.state().expect("state should exist");
    assert_eq!(state.latest_seqno(), 3);
    assert_eq!(state.latest_generation(), 2);
    assert_eq!(state.user_role(&a), TeamRole::Owner);
    assert_eq!(state.reader(), a);
}

#[test]
fn test_incremental_application_matches_batch() {
    let mut factory = LinkFactory::new();
    let (a, links) = three_link_chain(&mut factory);

    let batch_player = Player::new(a, factory.verifier());
    batch_player
        .add_links(&CancelToken::new(), &links)
        .expect("batch should be accepted");

    let incremental_player = Player::new(a, factory.verifier());
    for link in &links {
        incremental_player
            .add_links(&CancelToken::new(), std::slice::from_ref(link))
            .expect("link should be accepted");
    }

    assert_eq!(
        batch_player.state().expect("state"),
        incremental_player.state().expect("state")
    );
}

/// Replaying the same chain from empty is deterministic.
#[test]
fn test_replay_is_deterministic() {
    let mut factory = LinkFactory::new();
    let (a, links) = three_link_chain(&mut factory);

    let first = Player::new(a, factory.verifier());
    first
        .add_links(&CancelToken::new(), &links)
        .expect("batch should be accepted");
    let second = Player::new(a, factory.verifier());
    second
        .add_links(&CancelToken::new(), &links)
        .expect("batch should be accepted");

    assert_eq!(first.state().expect("state"), second.state().expect("state"));
}

#[test]
fn test_empty_batch_is_rejected() {
    let mut factory = LinkFactory::new();
    let a = factory.user(1);
    let player = Player::new(a, factory.verifier());
    assert_eq!(
        player.add_links(&CancelToken::new(), &[]),
        Err(PlayerError::EmptyBatch)
    );
}

#[test]
fn test_state_before_any_link_fails() {
    let mut factory = LinkFactory::new();
    let a = factory.user(1);
    let player = Player::new(a, factory.verifier());
    assert_eq!(player.state(), Err(PlayerError::NoState));
}

/// A batch failing at link k leaves the player exactly as it was.
#[test]
fn test_failed_batch_is_atomic() {
    let mut factory = LinkFactory::new();
    let (a, links) = three_link_chain(&mut factory);
    let player = Player::new(a, factory.verifier());

    player
        .add_links(&CancelToken::new(), &links[..1])
        .expect("root should be accepted");
    let before = player.state().expect("state");

    // corrupt the last link of the remainder
    let mut rest = links[1..].to_vec();
    rest[1].sig[0] ^= 0xff;

    let err = player
        .add_links(&CancelToken::new(), &rest)
        .unwrap_err();
    assert!(matches!(
        err,
        PlayerError::AtSeqno {
            seqno: 2,
            source: ChainError::OuterSignature { .. }
        }
    ));

    // the accepted prefix of the failed batch was rolled back too
    assert_eq!(player.state().expect("state"), before);
    assert_eq!(before.latest_seqno(), 1);
}

/// A failure before any state exists reports "at beginning".
#[test]
fn test_failure_at_beginning() {
    let mut factory = LinkFactory::new();
    let (a, mut links) = three_link_chain(&mut factory);
    let player = Player::new(a, factory.verifier());

    links[0].sig[0] ^= 0xff;
    let err = player
        .add_links(&CancelToken::new(), &links)
        .unwrap_err();
    assert!(matches!(err, PlayerError::AtStart { .. }));
    assert_eq!(player.state(), Err(PlayerError::NoState));
}

/// Returned states are deep copies: mutating one never changes the next.
#[test]
fn test_state_copies_are_independent() {
    let mut factory = LinkFactory::new();
    let (a, links) = three_link_chain(&mut factory);
    let player = Player::new(a, factory.verifier());
    player
        .add_links(&CancelToken::new(), &links)
        .expect("batch should be accepted");

    let mut copy = player.state().expect("state");
    copy.inform(crate::testutil::uv(9), TeamRole::Owner, 4);
    copy.note_stubbed(99);
    copy.set_latest(9, crate::codec::LinkId::hash_of(b"elsewhere"));

    let fresh = player.state().expect("state");
    assert_eq!(fresh.latest_seqno(), 3);
    assert_eq!(fresh.user_role(&crate::testutil::uv(9)), TeamRole::None);
    assert!(!fresh.has_any_stubbed_links());
}

/// Pre-verified batches skip signature checks but not continuity.
#[test]
fn test_add_links_verified() {
    let mut factory = LinkFactory::new();
    let (a, mut links) = three_link_chain(&mut factory);
    let player = Player::new(a, factory.verifier());

    // signatures are corrupt, but the loader vouched for them
    for link in &mut links {
        link.sig[0] ^= 0xff;
    }
    player
        .add_links_verified(&CancelToken::new(), &links)
        .expect("pre-verified batch should be accepted");
    assert_eq!(player.state().expect("state").latest_seqno(), 3);

    // continuity still applies: replaying the same links cannot extend
    let err = player
        .add_links_verified(&CancelToken::new(), &links)
        .unwrap_err();
    assert!(matches!(
        err,
        PlayerError::AtSeqno {
            seqno: 3,
            source: ChainError::WrongSeqno { .. }
        }
    ));
}

/// A stubbed link advances the chain; a stubbed first link is rejected.
#[test]
fn test_stubbed_link_continuity() {
    let mut factory = LinkFactory::new();
    let a = factory.user(1);
    let player = Player::new(a, factory.verifier());

    let root = factory.root_link("acme", &[a], a);
    player
        .add_links(&CancelToken::new(), std::slice::from_ref(&root))
        .expect("root should be accepted");
    let before = player.state().expect("state");

    let (seqno, prev) = after(&root);
    let stub = factory.make_stub(seqno, prev, a, LinkType::ChangeMembership);
    player
        .add_links(&CancelToken::new(), std::slice::from_ref(&stub))
        .expect("stub should be accepted");

    let state = player.state().expect("state");
    assert_eq!(state.latest_seqno(), 2);
    assert_eq!(state.name(), before.name());
    assert_eq!(state.user_role(&a), TeamRole::Owner);
    assert!(state
        .stubbed_types()
        .contains(&LinkType::ChangeMembership.code()));

    // a fresh player may not start from a stub
    let fresh = Player::new(a, factory.verifier());
    let stub = factory.make_stub(1, None, a, LinkType::Root);
    let err = fresh
        .add_links(&CancelToken::new(), std::slice::from_ref(&stub))
        .unwrap_err();
    assert_eq!(
        err,
        PlayerError::AtStart {
            source: ChainError::StubbedFirstLink
        }
    );
}

/// A pre-cancelled token fails the batch before any link applies.
#[test]
fn test_cancellation_between_links() {
    let mut factory = LinkFactory::new();
    let (a, links) = three_link_chain(&mut factory);
    let player = Player::new(a, factory.verifier());

    let cancel = CancelToken::new();
    let observer = cancel.clone();
    cancel.cancel();
    assert!(observer.is_cancelled());

    let err = player.add_links(&cancel, &links).unwrap_err();
    assert_eq!(
        err,
        PlayerError::AtStart {
            source: ChainError::Cancelled
        }
    );
    assert_eq!(player.state(), Err(PlayerError::NoState));

    // a fresh token lets the same batch through
    player
        .add_links(&CancelToken::new(), &links)
        .expect("batch should be accepted");
}

/// A player primed with a state continues from it.
#[test]
fn test_with_state_resumes() {
    let mut factory = LinkFactory::new();
    let (a, links) = three_link_chain(&mut factory);

    let bootstrap = Player::new(a, factory.verifier());
    bootstrap
        .add_links(&CancelToken::new(), &links[..2])
        .expect("prefix should be accepted");
    let snapshot = bootstrap.state().expect("state");

    let resumed = Player::with_state(a, factory.verifier(), snapshot);
    resumed
        .add_links(&CancelToken::new(), &links[2..])
        .expect("suffix should be accepted");
    assert_eq!(resumed.state().expect("state").latest_seqno(), 3);
    assert_eq!(resumed.reader(), a);
}

/// The player is shareable across threads.
#[test]
fn test_concurrent_readers() {
    let mut factory = LinkFactory::new();
    let (a, links) = three_link_chain(&mut factory);
    let player = Arc::new(Player::new(a, factory.verifier()));
    player
        .add_links(&CancelToken::new(), &links)
        .expect("batch should be accepted");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let player = Arc::clone(&player);
            std::thread::spawn(move || player.state().expect("state").latest_seqno())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().expect("join"), 3);
    }
}
