//! Test support: a link factory that builds fully signed chains.
//!
//! Keys are derived from fixed seeds so every test is deterministic. The
//! factory signs real outer links with per-user device keys (registered in
//! a [`KeyDirectory`]) and real reverse signatures with per-generation
//! team keys, so the full verification path runs in tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};

use crate::codec::{to_canon_json_bytes, ChainLink, LinkId, LinkType, OuterLink};
use crate::crypto::{KeyDirectory, Kid, OuterVerifier, ENC_KID_TAG, SIG_KID_TAG};
use crate::identity::{TeamId, TeamName, Uid, UserVersion};
use crate::{Generation, Seqno};

const TEST_CTIME: u64 = 1_500_000_000;
const TEST_EXPIRE_IN: u64 = 157_680_000;
const TEST_SEQ_TYPE: u8 = 3;

/// Returns the test user with uid bytes `[n; 16]` and eldest seqno 1.
pub(crate) fn uv(n: u8) -> UserVersion {
    UserVersion::new(Uid::from_bytes([n; 16]), 1)
}

/// Returns a subteam-tagged id filled with `n`.
pub(crate) fn subteam_id(n: u8) -> TeamId {
    let mut bytes = [n; 16];
    bytes[15] = crate::identity::SUBTEAM_ID_TAG;
    TeamId::from_bytes(bytes)
}

/// Deterministic key material and link construction for tests.
pub(crate) struct LinkFactory {
    directory: KeyDirectory,
    device_keys: BTreeMap<UserVersion, SigningKey>,
}

impl LinkFactory {
    pub(crate) fn new() -> Self {
        Self {
            directory: KeyDirectory::new(),
            device_keys: BTreeMap::new(),
        }
    }

    /// Registers (or returns) the test user derived from `seed`, with a
    /// device key the factory will sign outer links with.
    pub(crate) fn user(&mut self, seed: u8) -> UserVersion {
        let user = uv(seed);
        if !self.device_keys.contains_key(&user) {
            let key = SigningKey::from_bytes(&[seed; 32]);
            self.directory.insert(user, key.verifying_key());
            self.device_keys.insert(user, key);
        }
        user
    }

    /// The verifier that knows every registered device key.
    pub(crate) fn verifier(&self) -> Arc<dyn OuterVerifier> {
        Arc::new(self.directory.clone())
    }

    /// The per-team signing key at `generation`.
    fn team_signing_key(generation: Generation) -> SigningKey {
        let mut seed = [0xA0u8; 32];
        seed[0] = generation.to_le_bytes()[0];
        SigningKey::from_bytes(&seed)
    }

    /// The signing KID of the per-team key at `generation`.
    pub(crate) fn team_sig_kid(generation: Generation) -> Kid {
        Kid::new(
            SIG_KID_TAG,
            Self::team_signing_key(generation).verifying_key().as_bytes(),
        )
    }

    /// The encryption KID of the per-team key at `generation`.
    pub(crate) fn team_enc_kid(generation: Generation) -> Kid {
        let mut bytes = [0xB0u8; 32];
        bytes[0] = generation.to_le_bytes()[0];
        Kid::new(ENC_KID_TAG, &bytes)
    }

    /// A per-team-key section for `generation` with the reverse signature
    /// still null; [`Self::make_link`] signs it in place.
    pub(crate) fn ptk_section(generation: Generation) -> Value {
        json!({
            "generation": generation,
            "sig_kid": Self::team_sig_kid(generation).to_string(),
            "enc_kid": Self::team_enc_kid(generation).to_string(),
            "reverse_sig": null,
        })
    }

    /// A members section from role-name to user lists.
    pub(crate) fn members(entries: &[(&str, &[UserVersion])]) -> Value {
        let mut section = serde_json::Map::new();
        for (role, users) in entries {
            let list: Vec<String> = users.iter().map(ToString::to_string).collect();
            section.insert((*role).to_string(), json!(list));
        }
        Value::Object(section)
    }

    /// Builds a fully signed link. When the team section carries a
    /// per-team key with a null `reverse_sig`, the matching generation's
    /// team key signs the canonical payload in place.
    pub(crate) fn make_link(
        &self,
        seqno: Seqno,
        prev: Option<LinkId>,
        signer: UserVersion,
        link_type: LinkType,
        team: Value,
    ) -> ChainLink {
        self.make_raw_link(
            seqno,
            prev,
            signer,
            link_type.as_type_str(),
            link_type.code(),
            team,
        )
    }

    /// Like [`Self::make_link`] but with a caller-chosen type string and
    /// outer type code, for exercising malformed and unknown payloads.
    pub(crate) fn make_raw_link(
        &self,
        seqno: Seqno,
        prev: Option<LinkId>,
        signer: UserVersion,
        type_str: &str,
        outer_code: u8,
        team: Value,
    ) -> ChainLink {
        let mut payload = json!({
            "tag": "signature",
            "seqno": seqno,
            "ctime": TEST_CTIME,
            "expire_in": TEST_EXPIRE_IN,
            "seq_type": TEST_SEQ_TYPE,
            "body": {
                "version": 2,
                "type": type_str,
                "team": team,
            },
        });
        if let Some(prev) = prev {
            payload["prev"] = json!(prev.to_string());
        }

        // reverse-sign the per-team key if the section asks for it
        let ptk = payload["body"]["team"].get("per_team_key").cloned();
        if let Some(ptk) = ptk {
            if ptk.get("reverse_sig") == Some(&Value::Null) {
                let generation = ptk["generation"].as_u64().expect("ptk generation");
                #[allow(clippy::cast_possible_truncation)]
                let team_key = Self::team_signing_key(generation as Generation);
                let preimage = to_canon_json_bytes(&payload).expect("canon payload");
                let sig = team_key.sign(&preimage);
                payload["body"]["team"]["per_team_key"]["reverse_sig"] =
                    json!(hex::encode(sig.to_bytes()));
            }
        }

        let payload_bytes = to_canon_json_bytes(&payload).expect("canon payload");
        let payload_text = String::from_utf8(payload_bytes).expect("canon utf8");

        let outer = OuterLink {
            version: 2,
            seqno,
            prev,
            curr: LinkId::hash_of(payload_text.as_bytes()),
            link_type: outer_code,
        };
        let outer_bytes = outer.encode().expect("outer encode");
        let sig = self
            .device_keys
            .get(&signer)
            .expect("signer registered")
            .sign(&outer_bytes);

        ChainLink {
            seqno,
            version: 2,
            uid: signer.uid,
            outer: outer_bytes,
            sig: sig.to_bytes().to_vec(),
            payload: Some(payload_text),
        }
    }

    /// Builds a stubbed link: a signed outer over a withheld payload.
    pub(crate) fn make_stub(
        &self,
        seqno: Seqno,
        prev: Option<LinkId>,
        signer: UserVersion,
        link_type: LinkType,
    ) -> ChainLink {
        let outer = OuterLink {
            version: 2,
            seqno,
            prev,
            curr: LinkId::hash_of(b"withheld payload"),
            link_type: link_type.code(),
        };
        let outer_bytes = outer.encode().expect("outer encode");
        let sig = self
            .device_keys
            .get(&signer)
            .expect("signer registered")
            .sign(&outer_bytes);

        ChainLink {
            seqno,
            version: 2,
            uid: signer.uid,
            outer: outer_bytes,
            sig: sig.to_bytes().to_vec(),
            payload: None,
        }
    }

    /// A `team.root` link creating `name` with `owners`, signed by
    /// `signer`.
    pub(crate) fn root_link(
        &self,
        name: &str,
        owners: &[UserVersion],
        signer: UserVersion,
    ) -> ChainLink {
        let team_name = TeamName::parse(name).expect("team name");
        let id = TeamId::root_from_name(&team_name);
        let team = json!({
            "id": id.to_string(),
            "name": name,
            "members": Self::members(&[("owners", owners)]),
            "per_team_key": Self::ptk_section(1),
        });
        self.make_link(1, None, signer, LinkType::Root, team)
    }

    /// A `team.subteam_head` link creating subteam `name` under
    /// `parent_id`.
    pub(crate) fn subteam_head_link(
        &self,
        id: TeamId,
        parent_id: TeamId,
        name: &str,
        members: Value,
        signer: UserVersion,
    ) -> ChainLink {
        let team = json!({
            "id": id.to_string(),
            "name": name,
            "members": members,
            "parent": { "id": parent_id.to_string(), "seqno": 2 },
            "per_team_key": Self::ptk_section(1),
        });
        self.make_link(1, None, signer, LinkType::SubteamHead, team)
    }
}

/// Position helpers: the seqno and prev hash the next link needs.
pub(crate) fn after(link: &ChainLink) -> (Seqno, Option<LinkId>) {
    (link.seqno + 1, Some(link.link_id()))
}
