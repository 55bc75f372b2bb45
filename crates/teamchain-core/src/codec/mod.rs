//! Link codec: outer envelope, inner payload, canonical serialization.
//!
//! A chain link has two layers:
//!
//! - the **outer link**, a small hash-chained envelope (`version`, `seqno`,
//!   `prev`, `curr`, `link_type`) whose canonical serialization is what gets
//!   signed and hashed into a [`LinkId`]
//! - the **inner link**, a typed JSON payload carrying the team section;
//!   absent entirely on a stubbed link
//!
//! Both layers hash and sign **canonical JSON**: object keys sorted by
//! UTF-8 byte order recursively, no insignificant whitespace. Canonical
//! encoding is what makes signatures verifiable - the signer and the
//! verifier must serialize the same logical value to the same bytes.

mod canon;
mod inner;
mod link;
mod outer;


pub use canon::{reencode_with_null, to_canon_json_bytes, CanonError};
pub use inner::{
    InnerLink, LinkBody, MembersSection, ParentSection, PerTeamKeySection, SubteamSection,
    TeamSection, SIGNATURE_TAG,
};
pub use link::{ChainLink, LinkType, SUPPORTED_LINK_VERSION};
pub use outer::{LinkId, LinkIdError, OuterLink, LINK_ID_LEN};
